//! Interactive display seam: click events, click handlers and viewers.
//!
//! This crate does not open windows itself. An embedding application
//! implements [`Viewer`] to present a rendered [`Figure`] and forwards mouse
//! clicks through [`Figure::dispatch_click`].

use anyhow::Result;
use tracing::info;

use crate::figure::Figure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// A click in plot-area pixel coordinates (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEvent {
    pub x: f64,
    pub y: f64,
    pub button: MouseButton,
}

pub trait ClickHandler {
    fn on_click(&mut self, figure: &Figure, event: &ClickEvent);
}

/// Builds the click handler for a freshly drawn figure.
pub type HandlerFactory = Box<dyn FnOnce(&Figure) -> Box<dyn ClickHandler>>;

/// Presents a figure to the user.
pub trait Viewer {
    /// Show the figure; with `block` the call returns once the display is closed.
    fn show(&mut self, figure: &Figure, block: bool) -> Result<()>;
}

/// Default handler: logs the figure title and the sky position of each
/// middle-button click.
#[derive(Debug, Default)]
pub struct ReportClick {
    last: Option<(f64, f64)>,
}

impl ReportClick {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sky position of the most recent middle click.
    pub fn last(&self) -> Option<(f64, f64)> {
        self.last
    }
}

impl ClickHandler for ReportClick {
    fn on_click(&mut self, figure: &Figure, event: &ClickEvent) {
        if event.button != MouseButton::Middle {
            return;
        }
        let (ra, dec) = figure.plot_to_world(event.x, event.y);
        info!(
            "{} {:.6} {:.6}",
            figure.title().unwrap_or("(untitled)"),
            ra,
            dec
        );
        self.last = Some((ra, dec));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_report_click_only_middle_button() {
        let figure = Figure::new((150.0, 2.0), 0.1, 100).unwrap();
        let mut handler = ReportClick::new();

        handler.on_click(
            &figure,
            &ClickEvent {
                x: 10.0,
                y: 10.0,
                button: MouseButton::Left,
            },
        );
        assert_eq!(handler.last(), None);

        let centre = (figure.plot_size() as f64 - 1.0) / 2.0;
        handler.on_click(
            &figure,
            &ClickEvent {
                x: centre,
                y: centre,
                button: MouseButton::Middle,
            },
        );
        let (ra, dec) = handler.last().unwrap();
        assert_relative_eq!(ra, 150.0, epsilon = 1e-9);
        assert_relative_eq!(dec, 2.0, epsilon = 1e-9);

        // Only the latest click is kept
        handler.on_click(
            &figure,
            &ClickEvent {
                x: 0.0,
                y: centre,
                button: MouseButton::Middle,
            },
        );
        let (ra, dec) = handler.last().unwrap();
        assert!(ra > 150.0);
        assert_relative_eq!(dec, 2.0, epsilon = 1e-3);
    }
}
