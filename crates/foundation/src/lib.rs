pub mod bounds;
pub mod ids;
pub mod time;

// Dates, ids and bounds shared by every other crate.
pub use bounds::*;
pub use ids::*;
pub use time::*;
