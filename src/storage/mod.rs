//! Temp file subsystem.
//!
//! # Data Flow
//! ```text
//! Request accepted
//!     → workspace.rs (allocate input_<id>.<ext> / output_<id>.glb, track both)
//!     → handler writes input, pipeline writes output
//!     → RequestFiles dropped (after the response body, or on error)
//!     → janitor.rs (delete in the background, untrack)
//!
//! Startup:     sweep_leftovers removes files from a previous run
//! Periodic:    untracked files older than stale_after are removed
//! Shutdown:    everything still tracked is deleted
//! ```

pub mod janitor;
pub mod workspace;

pub use janitor::{sweep_leftovers, Janitor, JanitorWorker};
pub use workspace::{RequestFiles, TempWorkspace};
