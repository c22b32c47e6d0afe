pub mod layer;
pub mod manager;
pub mod popup;
pub mod raster;
pub mod symbology;
pub mod vector;

pub use layer::*;
pub use manager::*;
pub use popup::*;
pub use raster::*;
pub use symbology::*;
pub use vector::*;
