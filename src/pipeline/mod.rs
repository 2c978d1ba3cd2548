//! Generation pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! POST /generate-3d
//!     → manager.rs (lazy load, concurrency slots)
//!     → generator.rs (MeshGenerator trait)
//!         → command.rs (external program writes the GLB)
//!     → glb.rs (container check of the output)
//!     → back to the HTTP layer for streaming
//!
//! Startup:
//!     devices.rs (GPU probe, reported by /health)
//! ```
//!
//! # Design Decisions
//! - The model is a black box reached through a trait
//! - The default backend is a child process per job
//! - Outputs are checked before they are served

pub mod command;
pub mod devices;
pub mod generator;
pub mod glb;
pub mod manager;

pub use command::CommandGenerator;
pub use devices::DeviceReport;
pub use generator::{GenerationJob, MeshGenerator, PipelineError};
pub use manager::PipelineManager;
