// LogPump - lib.rs
//
// Library entry point. The `logpump` binary in `main.rs` is a thin console
// consumer over this API; other programs embed the pump directly:
//
//   let (mut pump, mut rx) = Pump::with_channel(roots, PumpConfig::default());
//   pump.start();
//   for entry in rx.drain(100) { ... }

pub mod app;
pub mod core;
pub mod platform;
pub mod util;

pub use app::handoff::EntryReceiver;
pub use app::pump::{Pump, PumpConfig};
pub use core::model::Entry;
