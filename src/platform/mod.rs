// LogPump - platform/mod.rs
//
// Platform abstraction layer: configuration files, platform directories,
// and the filesystem calls made by the segment reader and source groups.
// Dependencies: util, directories, glob, toml.
// Must NOT depend on: core, app.

pub mod config;
pub mod fs;
