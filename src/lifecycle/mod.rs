//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open temp dir → Sweep leftovers → Start janitor → Probe GPUs
//!     → Build pipeline manager → Optional preload → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections
//!     → Janitor deletes remaining temp files → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: storage first, then pipeline, then listeners
//! - The janitor stops only after the server has stopped

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Gateway, StartupError};
