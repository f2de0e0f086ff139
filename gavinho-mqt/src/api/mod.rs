//! HTTP API handlers for gavinho-mqt
//!
//! JSON REST under `/api` plus an SSE notification stream.

pub mod health;
pub mod imports;
pub mod items;
pub mod preview;
pub mod rules;
pub mod sse;

pub use health::health_routes;
pub use imports::import_routes;
pub use items::item_routes;
pub use preview::preview_routes;
pub use rules::rule_routes;
pub use sse::event_routes;
