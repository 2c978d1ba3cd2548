use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "mesh-cli")]
#[command(about = "Client for the image-to-3D gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show service info and supported formats
    Status,
    /// Show pipeline, device and cleanup health
    Health,
    /// Upload an image and save the generated GLB
    Generate {
        /// Image to convert
        image: PathBuf,
        /// Where to write the model (defaults to <image stem>.glb)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Generate { image, output } => {
            generate(&client, &cli.url, &image, output).await?;
        }
    }

    Ok(())
}

async fn generate(
    client: &reqwest::Client,
    url: &str,
    image: &Path,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = tokio::fs::read(image).await?;
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let part = Part::bytes(data)
        .file_name(file_name)
        .mime_str(mime_for(image))?;
    let form = Form::new().part("image", part);

    let res = client
        .post(format!("{url}/generate-3d"))
        .multipart(form)
        .send()
        .await?;

    if !res.status().is_success() {
        return print_response(res).await;
    }

    let output = output.unwrap_or_else(|| image.with_extension("glb"));
    let body = res.bytes().await?;
    tokio::fs::write(&output, &body).await?;
    println!("Saved {} bytes to {}", body.len(), output.display());
    Ok(())
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
