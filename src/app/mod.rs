// LogPump - app/mod.rs
//
// Application layer: file tailing, source groups, and the background pump.
// Dependencies: core, platform, util.

pub mod group;
pub mod handoff;
pub mod pump;
pub mod segment;
