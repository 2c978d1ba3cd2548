//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::borrow::Cow;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gltf::binary::Header;
use gltf::Glb;
use gltf_json as json;
use mesh_gateway::config::GatewayConfig;
use mesh_gateway::lifecycle::{Gateway, Shutdown, StartupError};
use mesh_gateway::pipeline::{GenerationJob, MeshGenerator, PipelineError};
use reqwest::multipart::{Form, Part};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A valid GLB with a minimal document and a BIN chunk of `payload` bytes.
pub fn glb_with_payload(payload: usize) -> Vec<u8> {
    let root = json::Root {
        asset: json::Asset {
            generator: Some("mesh-gateway tests".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    Glb {
        header: Header {
            magic: *b"glTF",
            version: 2,
            length: 0,
        },
        json: Cow::Owned(json::serialize::to_vec(&root).unwrap()),
        bin: Some(Cow::Owned(vec![0u8; payload])),
    }
    .to_vec()
    .unwrap()
}

pub fn glb_bytes() -> Vec<u8> {
    glb_with_payload(8)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Behavior {
    Succeed,
    FailGenerate,
    FailLoad,
    WriteGarbage,
    Slow(Duration),
    Large(usize),
}

/// In-process generator whose behavior is picked per test.
pub struct FakeGenerator {
    behavior: Behavior,
    pub loads: AtomicUsize,
    pub runs: AtomicUsize,
}

impl FakeGenerator {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            loads: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl MeshGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn load(&self) -> Result<(), PipelineError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::FailLoad {
            return Err(PipelineError::LoadFailed("weights not found".into()));
        }
        Ok(())
    }

    async fn generate(&self, job: &GenerationJob) -> Result<(), PipelineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        assert!(job.input.exists(), "input must be written before generation");
        match self.behavior {
            Behavior::FailGenerate => Err(PipelineError::Exited {
                code: Some(1),
                stderr: "CUDA out of memory".into(),
            }),
            Behavior::WriteGarbage => {
                tokio::fs::write(&job.output, b"definitely not a model").await?;
                Ok(())
            }
            Behavior::Large(payload) => {
                tokio::fs::write(&job.output, glb_with_payload(payload)).await?;
                Ok(())
            }
            Behavior::Slow(delay) => {
                tokio::time::sleep(delay).await;
                tokio::fs::write(&job.output, glb_bytes()).await?;
                Ok(())
            }
            Behavior::Succeed | Behavior::FailLoad => {
                tokio::fs::write(&job.output, glb_bytes()).await?;
                Ok(())
            }
        }
    }
}

/// A gateway serving on an ephemeral port with its own temp directory.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub temp: TempDir,
    pub shutdown: Shutdown,
    pub server: JoinHandle<Result<(), StartupError>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }
}

pub fn test_config(temp: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.storage.temp_dir = temp.to_path_buf();
    config.devices.probe_program = String::new();
    config
}

pub async fn spawn_gateway(generator: Arc<dyn MeshGenerator>) -> TestGateway {
    spawn_gateway_with(generator, |_| {}).await
}

pub async fn spawn_gateway_with(
    generator: Arc<dyn MeshGenerator>,
    tweak: impl FnOnce(&mut GatewayConfig),
) -> TestGateway {
    let temp = tempfile::tempdir().unwrap();
    let mut config = test_config(temp.path());
    tweak(&mut config);

    let gateway = Gateway::with_generator(config, generator).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let server = tokio::spawn(gateway.run(listener, rx));

    TestGateway {
        addr,
        temp,
        shutdown,
        server,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

pub fn image_form(field: &str, file_name: &str, data: Vec<u8>) -> Form {
    let part = Part::bytes(data)
        .file_name(file_name.to_string())
        .mime_str("image/png")
        .unwrap();
    Form::new().part(field.to_string(), part)
}

/// Managed files currently in the temp directory.
pub fn managed_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("input_") || n.starts_with("output_"))
        })
        .collect()
}

/// Poll until the temp directory has no managed files left.
pub async fn wait_for_cleanup(dir: &Path) -> Vec<PathBuf> {
    for _ in 0..50 {
        let left = managed_files(dir);
        if left.is_empty() {
            return left;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    managed_files(dir)
}
