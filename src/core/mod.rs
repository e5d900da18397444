// LogPump - core/mod.rs
//
// Core logic layer: record framing and parsing, the entry model, category
// tracking, and sequence reordering.
// Dependencies: util only; no filesystem access.
// Must NOT depend on: platform, app.

pub mod model;
pub mod record;
pub mod reorder;
pub mod timestamp;
pub mod tracker;
pub mod utf16;
