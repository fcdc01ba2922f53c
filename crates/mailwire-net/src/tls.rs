//! TLS configuration for mail protocol connections.
//!
//! A [`TlsOptions`] value selects the trust store and the verification
//! mode, and builds the `rustls` connector shared by every connection of a
//! client. The built configuration is reference counted and never mutated
//! once a connection has started.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::{Error, Result};

/// How a connection negotiates TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Plaintext only. **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade in-band (STARTTLS/STLS).
    StartTls,
    /// TLS from the start (ports 465/995/993). **Recommended.**
    #[default]
    Implicit,
}

/// Server certificate verification mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Verify the peer certificate against the trust store.
    #[default]
    Peer,
    /// Accept any certificate. **Testing only.**
    None,
}

/// TLS trust store and verification options.
#[derive(Debug, Clone)]
pub struct TlsOptions {
    /// Load the bundled webpki root certificates.
    pub use_default_verify_paths: bool,
    /// Additional PEM certificate files to trust.
    pub ca_files: Vec<PathBuf>,
    /// Directories scanned for `.pem`/`.crt` files to trust.
    pub ca_paths: Vec<PathBuf>,
    /// Certificate verification mode.
    pub verify: VerifyMode,
    /// Verify that the certificate matches the requested host name.
    pub verify_host: bool,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            use_default_verify_paths: true,
            ca_files: Vec::new(),
            ca_paths: Vec::new(),
            verify: VerifyMode::Peer,
            verify_host: true,
        }
    }
}

impl TlsOptions {
    /// Builds a TLS connector from these options.
    ///
    /// The resulting connector wraps an `Arc<ClientConfig>` and may be
    /// shared by any number of connections.
    ///
    /// # Errors
    ///
    /// Returns an error if a CA file or directory cannot be read or
    /// contains no parsable certificate.
    pub fn connector(&self) -> Result<TlsConnector> {
        let mut roots = RootCertStore::empty();
        if self.use_default_verify_paths {
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        for file in &self.ca_files {
            add_pem_file(&mut roots, file)?;
        }
        for dir in &self.ca_paths {
            add_pem_dir(&mut roots, dir)?;
        }

        let config = match self.verify {
            VerifyMode::None => ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerification::new()))
                .with_no_client_auth(),
            VerifyMode::Peer if self.verify_host => ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
            VerifyMode::Peer => {
                let inner = WebPkiServerVerifier::builder(Arc::new(roots))
                    .build()
                    .map_err(|err| Error::InvalidState(err.to_string()))?;
                ClientConfig::builder()
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(AcceptAnyName { inner }))
                    .with_no_client_auth()
            }
        };

        Ok(TlsConnector::from(Arc::new(config)))
    }
}

fn add_pem_file(roots: &mut RootCertStore, path: &Path) -> Result<()> {
    let data = fs::read(path)?;
    let mut reader = io::Cursor::new(data);
    for cert in rustls_pemfile::certs(&mut reader) {
        roots.add(cert?)?;
    }
    Ok(())
}

fn add_pem_dir(roots: &mut RootCertStore, dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let ext = path.extension().and_then(|ext| ext.to_str());
        if matches!(ext, Some("pem" | "crt")) {
            add_pem_file(roots, &path)?;
        }
    }
    Ok(())
}

fn default_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default().map_or_else(
        || Arc::new(rustls::crypto::aws_lc_rs::default_provider()),
        Arc::clone,
    )
}

/// Verifier that accepts any server certificate.
#[derive(Debug)]
struct NoVerification {
    provider: Arc<CryptoProvider>,
}

impl NoVerification {
    fn new() -> Self {
        Self {
            provider: default_provider(),
        }
    }
}

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Verifier that checks the chain but ignores host name mismatches.
#[derive(Debug)]
struct AcceptAnyName {
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for AcceptAnyName {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
            )) => Ok(ServerCertVerified::assertion()),
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
