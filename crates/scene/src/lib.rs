pub mod selection;
pub mod shapes;
pub mod spatial;

pub use selection::*;
pub use shapes::*;
pub use spatial::*;
