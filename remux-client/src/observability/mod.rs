//! Structured logging vocabulary: canonical event names and field keys.
//!
//! The library emits `tracing` events and never installs a global
//! subscriber; binaries and tests own one-time subscriber initialization.

pub mod events;
pub mod fields;
