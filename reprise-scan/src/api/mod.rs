//! HTTP API handlers for reprise-scan
//!
//! REST job control plus an SSE progress stream.

pub mod health;
pub mod scan;
pub mod sse;
pub mod uploads;

pub use health::health_routes;
pub use scan::scan_routes;
pub use sse::{event_routes, scan_event_stream};
pub use uploads::upload_routes;
