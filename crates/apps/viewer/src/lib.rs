//! Headless engine behind the telemetry map page.
//!
//! A [`MapSession`] owns the selected time window, the telemetry cache and
//! the layer manager. The host drives it with window changes, refreshes,
//! draw events and export requests, and listens on its event bus.

pub mod config;
pub mod export;
pub mod session;
pub mod sidebar;
pub mod window_store;

pub use config::*;
pub use export::*;
pub use session::*;
pub use sidebar::*;
pub use window_store::*;
