//! Listener TLS.
use std::{fs::File, io::BufReader, sync::Arc};

use tokio_rustls::{TlsAcceptor, rustls::ServerConfig};

use crate::{Result, ResultExt, config::ConfigError};

/// Build an acceptor from a PEM certificate chain and private key.
pub fn acceptor(cert_path: &str, key_path: &str) -> Result<TlsAcceptor> {
    let mut cert_file = BufReader::new(File::open(cert_path).context(|| format!("open {cert_path}"))?);
    let mut key_file = BufReader::new(File::open(key_path).context(|| format!("open {key_path}"))?);

    let certs = rustls_pemfile::certs(&mut cert_file)
        .collect::<Result<Vec<_>, _>>()
        .context(|| format!("read certificates from {cert_path}"))?;
    if certs.is_empty() {
        return Err(ConfigError::new(format!("no certificate found in {cert_path}")).into());
    }

    let key = rustls_pemfile::private_key(&mut key_file)
        .context(|| format!("read private key from {key_path}"))?
        .ok_or_else(|| ConfigError::new(format!("no private key found in {key_path}")))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|err| ConfigError::new(format!("invalid certificate: {err}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn missing_files() {
        let Err(err) = acceptor("/nonexistent/cert.pem", "/nonexistent/key.pem") else {
            panic!("expected missing file error");
        };
        assert!(err.to_string().starts_with("open /nonexistent/cert.pem"));
    }

    #[test]
    fn empty_certificate() {
        let dir = std::env::temp_dir();
        let cert = dir.join(format!("docwire-empty-{}.pem", std::process::id()));
        std::fs::write(&cert, "").unwrap();
        let cert = cert.to_str().unwrap();

        let Err(err) = acceptor(cert, cert) else {
            panic!("expected empty certificate error");
        };
        assert!(matches!(err.kind(), crate::ErrorKind::Config(_)));
        std::fs::remove_file(cert).ok();
    }
}
