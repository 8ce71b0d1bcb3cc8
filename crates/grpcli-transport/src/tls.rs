//! Transport security: turns certificate paths and flags into credentials.
//!
//! Nothing here touches the network. The only side effects are reads of the
//! CA certificate, client certificate, and client key files.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::TransportError;

/// Transport credentials for a connection attempt.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Plaintext HTTP/2. Explicitly insecure.
    Insecure,
    Tls(TlsCredentials),
}

impl Credentials {
    pub fn is_insecure(&self) -> bool {
        matches!(self, Self::Insecure)
    }
}

/// A ready-to-use TLS client context plus the name to verify against.
#[derive(Debug, Clone)]
pub struct TlsCredentials {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) server_name: ServerName<'static>,
    insecure_skip_verify: bool,
}

impl TlsCredentials {
    pub fn server_name(&self) -> &ServerName<'static> {
        &self.server_name
    }

    pub fn insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify
    }

    /// Whether a client certificate is presented during the handshake.
    pub fn has_client_cert(&self) -> bool {
        self.config.client_auth_cert_resolver.has_certs()
    }

    pub fn client_config(&self) -> &Arc<ClientConfig> {
        &self.config
    }
}

/// TLS-related settings, materialized from the client configuration at dial
/// time and never kept afterwards.
#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    pub enabled: bool,
    pub insecure_skip_verify: bool,
    /// Overrides the host part of the target address for verification.
    pub server_name: Option<String>,
    pub ca_cert_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
}

impl TlsSettings {
    /// Produces the credentials for dialing `target` (`host:port`).
    ///
    /// When TLS is disabled the result is always [`Credentials::Insecure`];
    /// no other field is looked at.
    ///
    /// # Errors
    /// - `CaCert` if the CA file cannot be read
    /// - `KeyFileNotSpecified` if a client certificate has no key
    /// - `CertKey` if the certificate/key pair cannot be loaded
    /// - `InvalidServerName` if no usable verification name results
    pub fn resolve(&self, target: &str) -> Result<Credentials, TransportError> {
        if !self.enabled {
            return Ok(Credentials::Insecure);
        }

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()?;

        let roots = self.ca_cert_file.as_deref().map(load_ca_roots).transpose()?;
        let builder = if self.insecure_skip_verify {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
        } else {
            builder.with_root_certificates(roots.unwrap_or_else(system_roots))
        };

        let mut config = match &self.cert_file {
            Some(cert) => {
                let key = self
                    .key_file
                    .as_ref()
                    .ok_or(TransportError::KeyFileNotSpecified)?;
                let (chain, private_key) = load_key_pair(cert, key).map_err(|source| {
                    TransportError::CertKey {
                        cert: cert.clone(),
                        key: key.clone(),
                        source,
                    }
                })?;
                builder.with_client_auth_cert(chain, private_key).map_err(|e| {
                    TransportError::CertKey {
                        cert: cert.clone(),
                        key: key.clone(),
                        source: Box::new(e),
                    }
                })?
            }
            None => builder.with_no_client_auth(),
        };
        config.alpn_protocols = vec![b"h2".to_vec()];

        let name = match &self.server_name {
            Some(name) => name.clone(),
            None => host_of(target).to_owned(),
        };
        let server_name =
            ServerName::try_from(name.clone()).map_err(|_| TransportError::InvalidServerName(name))?;

        tracing::debug!(
            ?server_name,
            insecure_skip_verify = self.insecure_skip_verify,
            "resolved TLS credentials"
        );

        Ok(Credentials::Tls(TlsCredentials {
            config: Arc::new(config),
            server_name,
            insecure_skip_verify: self.insecure_skip_verify,
        }))
    }
}

fn load_ca_roots(path: &Path) -> Result<RootCertStore, TransportError> {
    let pem = std::fs::read(path).map_err(|source| TransportError::CaCert {
        path: path.to_owned(),
        source,
    })?;
    // Unparsable PEM blocks and certificates are skipped, the same way a
    // system trust pool treats them.
    let mut reader = pem.as_slice();
    let certs: Vec<_> = rustls_pemfile::certs(&mut reader).filter_map(Result::ok).collect();
    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    tracing::debug!(path = %path.display(), added, ignored, "loaded CA certificates");
    Ok(roots)
}

/// The operating system's trust store, or the bundled Mozilla roots when
/// the system store yields nothing usable.
pub(crate) fn system_roots() -> RootCertStore {
    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        tracing::debug!(%error, "skipping unreadable system certificate");
    }
    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "loaded system CA certificates");
    if roots.is_empty() {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    roots
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn load_key_pair(
    cert: &Path,
    key: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), BoxError> {
    let mut reader = BufReader::new(File::open(cert)?);
    let chain = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if chain.is_empty() {
        return Err("no certificates found in certificate file".into());
    }

    let mut reader = BufReader::new(File::open(key)?);
    let private_key =
        rustls_pemfile::private_key(&mut reader)?.ok_or("no private key found in key file")?;
    Ok((chain, private_key))
}

/// The host portion of `host:port`, with IPv6 brackets removed.
///
/// Returns the input unchanged when there is no port to split off.
pub(crate) fn host_of(target: &str) -> &str {
    if let Some(rest) = target.strip_prefix('[') {
        return rest.split_once(']').map_or(rest, |(host, _)| host);
    }
    match target.rsplit_once(':') {
        Some((host, _)) if !host.contains(':') => host,
        _ => target,
    }
}

/// Accepts any server certificate. Handshake signatures are still checked
/// so the peer must hold the key for the certificate it sent.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn pem_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    /// Self-signed certificate and key for `localhost`, as PEM files.
    fn self_signed() -> (NamedTempFile, NamedTempFile) {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (
            pem_file(&certified.cert.pem()),
            pem_file(&certified.key_pair.serialize_pem()),
        )
    }

    #[test]
    fn test_disabled_is_insecure_regardless_of_other_fields() {
        let settings = TlsSettings {
            enabled: false,
            insecure_skip_verify: true,
            server_name: Some("not a valid name!".into()),
            ca_cert_file: Some("/does/not/exist/ca.pem".into()),
            cert_file: Some("/does/not/exist/cert.pem".into()),
            key_file: None,
        };
        let creds = settings.resolve("example.com:443").unwrap();
        assert!(creds.is_insecure());
    }

    #[test]
    fn test_server_name_defaults_to_target_host() {
        let settings = TlsSettings {
            enabled: true,
            ..TlsSettings::default()
        };
        let Credentials::Tls(tls) = settings.resolve("api.example.com:8443").unwrap() else {
            panic!("expected TLS credentials");
        };
        assert_eq!(tls.server_name().to_str(), "api.example.com");
        assert!(!tls.insecure_skip_verify());
        assert!(!tls.has_client_cert());
        assert_eq!(tls.client_config().alpn_protocols, vec![b"h2".to_vec()]);
    }

    #[test]
    fn test_server_name_override() {
        let settings = TlsSettings {
            enabled: true,
            server_name: Some("internal.example.com".into()),
            ..TlsSettings::default()
        };
        let Credentials::Tls(tls) = settings.resolve("10.0.0.5:443").unwrap() else {
            panic!("expected TLS credentials");
        };
        assert_eq!(tls.server_name().to_str(), "internal.example.com");
    }

    #[test]
    fn test_missing_key_file_fails_before_reading_anything() {
        // Neither file exists: the missing key must be reported, not the
        // unreadable certificate.
        let settings = TlsSettings {
            enabled: true,
            cert_file: Some("/does/not/exist/cert.pem".into()),
            ..TlsSettings::default()
        };
        let err = settings.resolve("localhost:50051").unwrap_err();
        assert!(matches!(err, TransportError::KeyFileNotSpecified));
        assert_eq!(err.to_string(), "key file not specified");
    }

    #[test]
    fn test_unreadable_ca_file() {
        let settings = TlsSettings {
            enabled: true,
            ca_cert_file: Some("/does/not/exist/ca.pem".into()),
            ..TlsSettings::default()
        };
        let err = settings.resolve("localhost:50051").unwrap_err();
        assert!(matches!(err, TransportError::CaCert { .. }));
        assert!(err.to_string().contains("/does/not/exist/ca.pem"));
    }

    #[test]
    fn test_unreadable_ca_file_fails_even_when_skipping_verification() {
        let settings = TlsSettings {
            enabled: true,
            insecure_skip_verify: true,
            ca_cert_file: Some("/does/not/exist/ca.pem".into()),
            ..TlsSettings::default()
        };
        assert!(matches!(
            settings.resolve("localhost:50051"),
            Err(TransportError::CaCert { .. })
        ));
    }

    #[test]
    fn test_malformed_ca_pem_is_ignored() {
        let ca = pem_file("-----BEGIN CERTIFICATE-----\nnot base64!\n-----END CERTIFICATE-----\n");
        let settings = TlsSettings {
            enabled: true,
            ca_cert_file: Some(ca.path().to_owned()),
            ..TlsSettings::default()
        };
        assert!(!settings.resolve("localhost:50051").unwrap().is_insecure());
    }

    #[test]
    fn test_ca_file_with_certificate() {
        let (cert, _key) = self_signed();
        let settings = TlsSettings {
            enabled: true,
            ca_cert_file: Some(cert.path().to_owned()),
            ..TlsSettings::default()
        };
        assert!(!settings.resolve("localhost:50051").unwrap().is_insecure());
    }

    #[test]
    fn test_client_certificate_is_installed() {
        let (cert, key) = self_signed();
        let settings = TlsSettings {
            enabled: true,
            cert_file: Some(cert.path().to_owned()),
            key_file: Some(key.path().to_owned()),
            ..TlsSettings::default()
        };
        let Credentials::Tls(tls) = settings.resolve("localhost:50051").unwrap() else {
            panic!("expected TLS credentials");
        };
        assert!(tls.has_client_cert());
    }

    #[test]
    fn test_garbage_key_file() {
        let (cert, _key) = self_signed();
        let key = pem_file("this is not a key");
        let settings = TlsSettings {
            enabled: true,
            cert_file: Some(cert.path().to_owned()),
            key_file: Some(key.path().to_owned()),
            ..TlsSettings::default()
        };
        let err = settings.resolve("localhost:50051").unwrap_err();
        assert!(matches!(err, TransportError::CertKey { .. }));
    }

    #[test]
    fn test_skip_verify() {
        let settings = TlsSettings {
            enabled: true,
            insecure_skip_verify: true,
            ..TlsSettings::default()
        };
        let Credentials::Tls(tls) = settings.resolve("127.0.0.1:50051").unwrap() else {
            panic!("expected TLS credentials");
        };
        assert!(tls.insecure_skip_verify());
        assert_eq!(tls.server_name().to_str(), "127.0.0.1");
    }

    #[test]
    fn test_system_roots_never_empty() {
        assert!(!system_roots().is_empty());
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("localhost:9000"), "localhost");
        assert_eq!(host_of("[::1]:9000"), "::1");
        assert_eq!(host_of("example.com"), "example.com");
        assert_eq!(host_of("::1"), "::1");
    }
}
