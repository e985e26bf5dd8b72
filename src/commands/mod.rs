pub mod read_fits;
pub mod region_stats;
pub mod render_overlay;

pub use read_fits::read_fits;
pub use region_stats::region_stats;
pub use render_overlay::{render_overlay, RenderRequest};
