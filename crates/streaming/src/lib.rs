pub mod cache;
pub mod request;
pub mod residency;
pub mod source;
pub mod telemetry;

pub use cache::*;
pub use request::*;
pub use residency::*;
pub use source::*;
pub use telemetry::*;
