//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

/// Load the PEM certificate chain and private key named by `config`.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, std::io::Error> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    for (what, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{what} file not found: {}", path.display()),
            ));
        }
    }

    let tls = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    tracing::info!(cert = %cert_path.display(), "TLS certificates loaded");
    Ok(tls)
}
