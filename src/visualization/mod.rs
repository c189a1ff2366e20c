pub mod charts;
pub mod raster;

pub use charts::{ChartRenderer, ComparisonChart};
pub use raster::rasterize;
