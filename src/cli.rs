use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::OverlayConfig;
use crate::fits::Beam;

#[derive(Parser)]
#[command(name = "sky-overlay")]
#[command(about = "Draw radio contours and catalogue annotations over optical sky cutouts", long_about = None)]
pub struct Cli {
    /// Log debug detail (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render an overlay image
    Render {
        /// Optical base image (2-D, or a 3-channel RGB cube)
        optical: PathBuf,

        /// Right ascension of the field centre in degrees
        #[arg(long)]
        ra: f64,

        /// Declination of the field centre in degrees
        #[arg(long, allow_negative_numbers = true)]
        dec: f64,

        /// Field width in degrees
        #[arg(long)]
        size: f64,

        /// Primary radio map drawn as contours
        #[arg(long)]
        lofar: Option<PathBuf>,

        /// FIRST map for auxiliary contours
        #[arg(long)]
        first: Option<PathBuf>,

        /// VLASS map for auxiliary contours
        #[arg(long)]
        vlass: Option<PathBuf>,

        /// Catalogue table (CSV or JSON with RA, DEC, Maj, Min, PA) drawn as ellipses
        #[arg(long)]
        catalogue: Option<PathBuf>,

        /// Marker positions as FILE[:MARKER[:COLOR]]; repeatable. A color
        /// draws outlined markers, otherwise they are filled white
        #[arg(long = "positions")]
        positions: Vec<String>,

        /// ds9 region file
        #[arg(long)]
        region: Option<PathBuf>,

        /// JSON overlay configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output image (PNG unless the extension says otherwise)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Attempts when opening input files
        #[arg(long, default_value = "5")]
        retries: u32,

        #[command(flatten)]
        style: StyleOptions,
    },

    /// Print background statistics of a sky box in a FITS image
    Noise {
        /// FITS image
        file: PathBuf,

        /// Right ascension of the box centre in degrees
        #[arg(long)]
        ra: f64,

        /// Declination of the box centre in degrees
        #[arg(long, allow_negative_numbers = true)]
        dec: f64,

        /// Half-size of the box in degrees
        #[arg(long)]
        size: f64,

        /// Cube channel to measure
        #[arg(long, default_value = "0")]
        channel: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Read and display FITS header metadata
    ReadFits {
        /// FITS file or directory to scan
        path: PathBuf,

        /// Show every header keyword
        #[arg(short, long)]
        all_keywords: bool,

        /// Output format (text, json, csv)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Parser, Debug, Clone, Default)]
pub struct StyleOptions {
    /// Title at the top of the plot
    #[arg(long)]
    pub title: Option<String>,

    /// Side of the square plot area in pixels
    #[arg(long)]
    pub canvas_size: Option<u32>,

    /// Radio map rms; estimated around the target when omitted
    #[arg(long)]
    pub rms: Option<f64>,

    /// Radio peak flux density; the map maximum when omitted
    #[arg(long)]
    pub peak: Option<f64>,

    /// Lowest contour in units of the rms
    #[arg(long)]
    pub lofar_level: Option<f64>,

    /// Dynamic range limit for the lowest contour
    #[arg(long)]
    pub dr_limit: Option<f64>,

    /// Contour line width
    #[arg(long)]
    pub lw: Option<f64>,

    /// Optical lower cutoff at mean + noise_thresh * rms
    #[arg(long)]
    pub noise_thresh: Option<f64>,

    /// Beam major axis in degrees (with --bmin and --bpa)
    #[arg(long, requires = "bmin", requires = "bpa")]
    pub bmaj: Option<f64>,

    /// Beam minor axis in degrees
    #[arg(long, requires = "bmaj")]
    pub bmin: Option<f64>,

    /// Beam position angle in degrees
    #[arg(long, requires = "bmaj", allow_negative_numbers = true)]
    pub bpa: Option<f64>,

    /// Circle of this radius in degrees around the target
    #[arg(long)]
    pub circle_radius: Option<f64>,

    /// Catalogue Maj/Min are divided by this to give degrees
    #[arg(long)]
    pub overlay_scale: Option<f64>,

    /// Hide the primary contours
    #[arg(long)]
    pub no_lofar: bool,

    /// Hide axis and tick labels
    #[arg(long)]
    pub no_labels: bool,

    /// Hide the coordinate grid
    #[arg(long)]
    pub no_grid: bool,

    /// Hide the cross at the target
    #[arg(long)]
    pub no_coords: bool,
}

impl StyleOptions {
    /// Override configuration values with the flags that were given.
    pub fn apply_to(&self, config: &mut OverlayConfig) {
        if let Some(title) = &self.title {
            config.title = Some(title.clone());
        }
        if let Some(canvas_size) = self.canvas_size {
            config.canvas_size = canvas_size;
        }
        config.rms = self.rms.or(config.rms);
        config.peak = self.peak.or(config.peak);
        if let Some(level) = self.lofar_level {
            config.lofar_level = level;
        }
        if let Some(dr_limit) = self.dr_limit {
            config.dr_limit = dr_limit;
        }
        if let Some(lw) = self.lw {
            config.lw = lw;
        }
        if let Some(noise_thresh) = self.noise_thresh {
            config.noise_thresh = noise_thresh;
        }
        if let (Some(major), Some(minor), Some(angle)) = (self.bmaj, self.bmin, self.bpa) {
            config.beam = Some(Beam {
                major,
                minor,
                angle,
            });
        }
        config.circle_radius = self.circle_radius.or(config.circle_radius);
        if let Some(scale) = self.overlay_scale {
            config.overlay_scale = scale;
        }
        config.show_lofar &= !self.no_lofar;
        config.no_labels |= self.no_labels;
        config.show_grid &= !self.no_grid;
        config.plot_coords &= !self.no_coords;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_arguments() {
        let cli = Cli::try_parse_from([
            "sky-overlay",
            "-v",
            "render",
            "optical.fits",
            "--ra",
            "150.0",
            "--dec",
            "-2.5",
            "--size",
            "0.05",
            "--positions",
            "a.csv:o:cyan",
            "--positions",
            "b.csv",
            "--bmaj",
            "0.0017",
            "--bmin",
            "0.0015",
            "--bpa",
            "-30",
            "--no-grid",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Render {
            dec,
            positions,
            style,
            ..
        } = cli.command
        else {
            panic!("expected render");
        };
        assert_eq!(dec, -2.5);
        assert_eq!(positions, vec!["a.csv:o:cyan", "b.csv"]);

        let mut config = OverlayConfig::default();
        style.apply_to(&mut config);
        assert!(!config.show_grid);
        assert!(config.plot_coords);
        assert_eq!(config.beam.map(|b| b.angle), Some(-30.0));
    }

    #[test]
    fn test_beam_needs_all_parts() {
        let result = Cli::try_parse_from([
            "sky-overlay",
            "render",
            "optical.fits",
            "--ra",
            "1",
            "--dec",
            "2",
            "--size",
            "0.1",
            "--bmaj",
            "0.001",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_keep_config_values() {
        let mut config = OverlayConfig {
            rms: Some(1e-4),
            show_grid: false,
            ..OverlayConfig::default()
        };
        StyleOptions::default().apply_to(&mut config);
        assert_eq!(config.rms, Some(1e-4));
        assert!(!config.show_grid);
        assert!(config.show_lofar);
    }
}
