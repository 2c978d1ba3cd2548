//! Generator backed by an external program.
//!
//! The program is expected to read the image at `{input}` and write a GLB to
//! `{output}`. Anything it prints on stdout is ignored; stderr is kept for
//! error reports.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::PipelineConfig;
use crate::pipeline::generator::{GenerationJob, MeshGenerator, PipelineError};

/// Bytes of stderr kept in error messages.
const STDERR_TAIL: usize = 2048;

#[derive(Debug, Clone)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
    probe_args: Vec<String>,
    model: String,
    working_dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    generation_timeout: Duration,
    load_timeout: Duration,
}

impl CommandGenerator {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            probe_args: config.probe_args.clone(),
            model: config.model.clone(),
            working_dir: config.working_dir.clone(),
            env: config.env.clone(),
            generation_timeout: config.generation_timeout(),
            load_timeout: config.load_timeout(),
        }
    }

    /// Substitute job values into the argument template.
    pub fn render_args(&self, job: &GenerationJob) -> Vec<String> {
        let input = job.input.to_string_lossy();
        let output = job.output.to_string_lossy();
        let request_id = job.request_id.to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{model}", &self.model)
                    .replace("{request_id}", &request_id)
            })
            .collect()
    }

    async fn execute(&self, args: &[String], timeout: Duration) -> Result<Output, PipelineError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(
            program = %self.program,
            args = ?args,
            timeout_secs = timeout.as_secs(),
            "Executing pipeline command"
        );

        let child = cmd.spawn().map_err(|source| PipelineError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Dropping the output future on timeout kills the child.
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| PipelineError::Timeout(timeout))??;

        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            tracing::error!(
                program = %self.program,
                status = %output.status,
                stderr = %stderr,
                "Pipeline command failed"
            );
            return Err(PipelineError::Exited {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(output)
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}

#[async_trait]
impl MeshGenerator for CommandGenerator {
    fn name(&self) -> &str {
        &self.program
    }

    async fn load(&self) -> Result<(), PipelineError> {
        if self.probe_args.is_empty() {
            return Ok(());
        }
        self.execute(&self.probe_args, self.load_timeout)
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::LoadFailed(e.to_string()))
    }

    async fn generate(&self, job: &GenerationJob) -> Result<(), PipelineError> {
        let args = self.render_args(job);
        self.execute(&args, self.generation_timeout).await?;

        match tokio::fs::metadata(&job.output).await {
            Ok(meta) if meta.len() == 0 => Err(PipelineError::EmptyOutput),
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PipelineError::MissingOutput(job.output.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
