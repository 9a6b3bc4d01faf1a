//! Workspace umbrella crate.
//!
//! Exposes feature flags that map onto the individual workspace crates
//! (`core-service`, `core-playback`, `core-sync`). Host applications can
//! depend on `video-platform-core` and enable the documented features without
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{bootstrap_desktop, CoreError, CoreService};

#[cfg(feature = "cache")]
pub use core_playback as playback;

#[cfg(feature = "offline-sync")]
pub use core_sync as sync;
