//! Shared owner of the generation backend.
//!
//! # Responsibilities
//! - Load the backend once, lazily or at startup
//! - Bound the number of concurrent generations
//! - Validate what the backend produced before it is served

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OnceCell, Semaphore};

use crate::config::PipelineConfig;
use crate::observability::metrics;
use crate::pipeline::generator::{GenerationJob, MeshGenerator, PipelineError};
use crate::pipeline::glb::{self, GlbInfo};

pub struct PipelineManager {
    generator: Arc<dyn MeshGenerator>,
    loaded: OnceCell<()>,
    slots: Arc<Semaphore>,
    queue_timeout: Duration,
    in_flight: AtomicUsize,
}

impl PipelineManager {
    pub fn new(generator: Arc<dyn MeshGenerator>, config: &PipelineConfig) -> Self {
        Self {
            generator,
            loaded: OnceCell::new(),
            slots: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            queue_timeout: config.queue_timeout(),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Whether the backend has been loaded successfully.
    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Generations currently running.
    pub fn jobs_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Load the backend if it is not loaded yet.
    ///
    /// Concurrent callers wait for the same attempt. A failed attempt is not
    /// remembered, so the next caller tries again. Every failure surfaces as
    /// `PipelineError::LoadFailed`.
    pub async fn ensure_loaded(&self) -> Result<(), PipelineError> {
        self.loaded
            .get_or_try_init(|| async {
                tracing::info!(generator = %self.generator.name(), "Loading generation pipeline");
                let start = Instant::now();
                match self.generator.load().await {
                    Ok(()) => {
                        tracing::info!(
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Pipeline loaded successfully"
                        );
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to load pipeline");
                        Err(match e {
                            e @ PipelineError::LoadFailed(_) => e,
                            other => PipelineError::LoadFailed(other.to_string()),
                        })
                    }
                }
            })
            .await
            .map(|_| ())
    }

    /// Run one job and validate its output.
    pub async fn generate(&self, job: &GenerationJob) -> Result<GlbInfo, PipelineError> {
        self.ensure_loaded().await?;

        let _slot = tokio::time::timeout(self.queue_timeout, self.slots.clone().acquire_owned())
            .await
            .map_err(|_| {
                tracing::warn!(request_id = %job.request_id, "No free generation slot");
                metrics::record_generation("busy", Instant::now());
                PipelineError::Busy
            })?
            .map_err(|_| PipelineError::Busy)?;

        let _running = InFlight::enter(&self.in_flight);
        let start = Instant::now();
        tracing::info!(request_id = %job.request_id, "Generating 3D model");

        let result = match self.generator.generate(job).await {
            Ok(()) => glb::inspect_file(&job.output).await.map_err(PipelineError::from),
            Err(e) => Err(e),
        };

        match &result {
            Ok(info) => {
                tracing::info!(
                    request_id = %job.request_id,
                    bytes = info.length,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Model generated"
                );
                metrics::record_generation("success", start);
            }
            Err(e) => {
                tracing::error!(request_id = %job.request_id, error = %e, "Generation failed");
                metrics::record_generation("failure", start);
            }
        }
        result
    }
}

/// Keeps the in-flight count and gauge accurate even if the job future is dropped.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_jobs_in_flight(now);
        Self { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let now = self.counter.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::set_jobs_in_flight(now);
    }
}
