pub mod catalogue;
pub mod cli;
pub mod commands;
pub mod config;
pub mod contour;
pub mod draw;
pub mod figure;
pub mod fits;
pub mod interact;
pub mod levels;
pub mod noise;
pub mod overlay;
pub mod region;
pub mod retry;
pub mod stretch;
pub mod text_render;
pub mod wcs;

// Re-export commonly used items
pub use config::OverlayConfig;
pub use figure::Figure;
pub use fits::{Beam, SkyImage};
pub use noise::{find_noise, find_noise_area, NoiseStats};
pub use overlay::{show_overlay, OverlayInputs};
