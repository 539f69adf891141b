use std::{
    fmt::{self, Debug},
    sync::Arc,
};

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms},
    pki_types::{pem::PemObject, CertificateDer, ServerName, UnixTime},
    server::ParsedCertificate,
    ClientConfig, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme,
};

#[cfg(feature = "aws-lc-rs")]
use rustls::crypto::aws_lc_rs::default_provider as crypto_provider;
#[cfg(all(feature = "ring", not(feature = "aws-lc-rs")))]
use rustls::crypto::ring::default_provider as crypto_provider;

use crate::error::{self, Error};

/// TLS protocol versions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsVersion {
    /// TLS 1.2
    ///
    /// A good option for most SMTP servers.
    Tlsv12,
    /// TLS 1.3
    ///
    /// The most secure option, although not supported by all SMTP servers.
    Tlsv13,
}

/// Source for the base set of root certificates to trust.
#[allow(missing_copy_implementations)]
#[derive(Clone, Debug, Default)]
pub enum CertificateStore {
    /// Use the system store if the `rustls-native-certs` feature is
    /// enabled, or fall back to `webpki-roots`.
    #[default]
    Default,
    /// Use a hardcoded set of Mozilla roots via the `webpki-roots` crate.
    #[cfg(feature = "webpki-roots")]
    #[cfg_attr(docsrs, doc(cfg(feature = "webpki-roots")))]
    WebpkiRoots,
    /// Don't use any system certificates.
    ///
    /// Only the certificates added with
    /// [`TlsParametersBuilder::add_root_certificate`] are trusted.
    None,
}

/// Parameters to use for secure clients
///
/// Certificates are verified against the configured roots and the domain by
/// default.
#[derive(Clone)]
pub struct TlsParameters {
    pub(crate) config: Arc<ClientConfig>,
    /// The domain name which is expected in the TLS certificate from the server
    pub(crate) domain: String,
}

impl Debug for TlsParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsParameters")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

/// Builder for `TlsParameters`
#[derive(Debug, Clone)]
pub struct TlsParametersBuilder {
    domain: String,
    cert_store: CertificateStore,
    root_certs: Vec<Certificate>,
    accept_invalid_hostnames: bool,
    accept_invalid_certs: bool,
    min_tls_version: TlsVersion,
}

impl TlsParametersBuilder {
    /// Creates a new builder for `TlsParameters`
    pub fn new(domain: String) -> Self {
        Self {
            domain,
            cert_store: CertificateStore::Default,
            root_certs: Vec::new(),
            accept_invalid_hostnames: false,
            accept_invalid_certs: false,
            min_tls_version: TlsVersion::Tlsv12,
        }
    }

    /// Set the source for the base set of root certificates to trust.
    pub fn certificate_store(mut self, cert_store: CertificateStore) -> Self {
        self.cert_store = cert_store;
        self
    }

    /// Add a custom root certificate
    ///
    /// Can be used to safely connect to a server using a self-signed certificate, for example.
    pub fn add_root_certificate(mut self, cert: Certificate) -> Self {
        self.root_certs.push(cert);
        self
    }

    /// Controls whether certificates with an invalid hostname are accepted
    ///
    /// Defaults to `false`.
    ///
    /// # Warning
    ///
    /// You should think very carefully before using this method.
    /// If hostname verification is disabled *any* valid certificate,
    /// including those from other sites, are trusted.
    ///
    /// This method introduces significant vulnerabilities to man-in-the-middle attacks.
    pub fn dangerous_accept_invalid_hostnames(mut self, accept_invalid_hostnames: bool) -> Self {
        self.accept_invalid_hostnames = accept_invalid_hostnames;
        self
    }

    /// Controls which minimum TLS version is allowed
    ///
    /// Defaults to [`Tlsv12`][TlsVersion::Tlsv12].
    pub fn set_min_tls_version(mut self, min_tls_version: TlsVersion) -> Self {
        self.min_tls_version = min_tls_version;
        self
    }

    /// Controls whether invalid certificates are accepted
    ///
    /// Defaults to `false`.
    ///
    /// # Warning
    ///
    /// If certificate verification is disabled, *any* certificate
    /// is trusted for use, including:
    ///
    /// * Self signed certificates
    /// * Certificates from different hostnames
    /// * Expired certificates
    ///
    /// This method should only be used as a last resort, as it introduces
    /// significant vulnerabilities to man-in-the-middle attacks.
    pub fn dangerous_accept_invalid_certs(mut self, accept_invalid_certs: bool) -> Self {
        self.accept_invalid_certs = accept_invalid_certs;
        self
    }

    /// Creates a new `TlsParameters` with the provided configuration
    pub fn build(self) -> Result<TlsParameters, Error> {
        let just_version3 = &[&rustls::version::TLS13];
        let supported_versions = match self.min_tls_version {
            TlsVersion::Tlsv12 => rustls::ALL_VERSIONS,
            TlsVersion::Tlsv13 => just_version3,
        };

        let provider = Arc::new(crypto_provider());
        let signature_algorithms = provider.signature_verification_algorithms;
        let tls = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(supported_versions)
            .map_err(error::tls)?;

        let mut root_cert_store = RootCertStore::empty();

        match self.cert_store {
            CertificateStore::Default => load_default_roots(&mut root_cert_store)?,
            #[cfg(feature = "webpki-roots")]
            CertificateStore::WebpkiRoots => load_webpki_roots(&mut root_cert_store),
            CertificateStore::None => {}
        }
        for cert in self.root_certs {
            for rustls_cert in cert.rustls {
                root_cert_store.add(rustls_cert).map_err(error::tls)?;
            }
        }

        let tls = if self.accept_invalid_certs || self.accept_invalid_hostnames {
            let verifier = InvalidCertsVerifier {
                ignore_invalid_hostnames: self.accept_invalid_hostnames,
                ignore_invalid_certs: self.accept_invalid_certs,
                roots: root_cert_store,
                signature_algorithms,
            };
            tls.dangerous()
                .with_custom_certificate_verifier(Arc::new(verifier))
        } else {
            tls.with_root_certificates(root_cert_store)
        };

        Ok(TlsParameters {
            config: Arc::new(tls.with_no_client_auth()),
            domain: self.domain,
        })
    }
}

#[cfg(feature = "rustls-native-certs")]
fn load_default_roots(store: &mut RootCertStore) -> Result<(), Error> {
    let rustls_native_certs::CertificateResult { certs, errors, .. } =
        rustls_native_certs::load_native_certs();
    let errors_len = errors.len();

    let (added, ignored) = store.add_parsable_certificates(certs);
    #[cfg(feature = "tracing")]
    tracing::debug!(
        "loaded platform certs with {errors_len} failing to load, {added} valid and {ignored} ignored (invalid) certs"
    );
    if added == 0 {
        return Err(error::tls("no usable platform certificate"));
    }
    #[cfg(not(feature = "tracing"))]
    let _ = (errors_len, ignored);
    Ok(())
}

#[cfg(all(not(feature = "rustls-native-certs"), feature = "webpki-roots"))]
fn load_default_roots(store: &mut RootCertStore) -> Result<(), Error> {
    load_webpki_roots(store);
    Ok(())
}

#[cfg(not(any(feature = "rustls-native-certs", feature = "webpki-roots")))]
fn load_default_roots(_store: &mut RootCertStore) -> Result<(), Error> {
    Err(error::tls(
        "no default root certificates, enable `webpki-roots` or `rustls-native-certs`",
    ))
}

#[cfg(feature = "webpki-roots")]
fn load_webpki_roots(store: &mut RootCertStore) {
    store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
}

impl TlsParameters {
    /// Creates a new `TlsParameters` with certificate and hostname verification
    pub fn new(domain: String) -> Result<Self, Error> {
        TlsParametersBuilder::new(domain).build()
    }

    /// Creates a new `TlsParameters` builder
    pub fn builder(domain: String) -> TlsParametersBuilder {
        TlsParametersBuilder::new(domain)
    }

    /// The domain expected in the server certificate
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub(crate) fn server_name(&self) -> Result<ServerName<'static>, Error> {
        ServerName::try_from(self.domain.clone()).map_err(error::tls)
    }
}

/// A certificate that can be used with [`TlsParametersBuilder::add_root_certificate`]
#[derive(Clone)]
pub struct Certificate {
    rustls: Vec<CertificateDer<'static>>,
}

impl Certificate {
    /// Create a `Certificate` from a DER encoded certificate
    pub fn from_der(der: Vec<u8>) -> Result<Self, Error> {
        Ok(Self {
            rustls: vec![der.into()],
        })
    }

    /// Create a `Certificate` from a PEM encoded certificate
    pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        let rustls = CertificateDer::pem_slice_iter(pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| error::tls("invalid certificates"))?;
        if rustls.is_empty() {
            return Err(error::tls("no certificate found"));
        }
        Ok(Self { rustls })
    }
}

impl Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate").finish()
    }
}

#[derive(Debug)]
struct InvalidCertsVerifier {
    ignore_invalid_hostnames: bool,
    ignore_invalid_certs: bool,
    roots: RootCertStore,
    signature_algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for InvalidCertsVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let cert = ParsedCertificate::try_from(end_entity)?;

        if !self.ignore_invalid_certs {
            rustls::client::verify_server_cert_signed_by_trust_anchor(
                &cert,
                &self.roots,
                intermediates,
                now,
                self.signature_algorithms.all,
            )?;
        }

        if !self.ignore_invalid_hostnames {
            rustls::client::verify_server_name(&cert, server_name)?;
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(message, cert, dss, &self.signature_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(message, cert, dss, &self.signature_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.signature_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verification_is_on_by_default() {
        let builder = TlsParametersBuilder::new("smtp.gmail.com".to_owned());

        assert!(!builder.accept_invalid_certs);
        assert!(!builder.accept_invalid_hostnames);
        assert_eq!(builder.min_tls_version, TlsVersion::Tlsv12);
    }

    #[test]
    fn build_without_system_roots() {
        let parameters = TlsParameters::builder("smtp.gmail.com".to_owned())
            .certificate_store(CertificateStore::None)
            .set_min_tls_version(TlsVersion::Tlsv13)
            .build()
            .unwrap();

        assert_eq!(parameters.domain(), "smtp.gmail.com");
        assert!(parameters.server_name().is_ok());
    }

    #[test]
    fn invalid_server_name() {
        let parameters = TlsParameters::builder("not a hostname".to_owned())
            .certificate_store(CertificateStore::None)
            .dangerous_accept_invalid_certs(true)
            .build()
            .unwrap();

        assert!(parameters.server_name().unwrap_err().is_tls());
    }

    #[test]
    fn pem_without_certificate() {
        assert!(Certificate::from_pem(b"not a certificate").unwrap_err().is_tls());
    }
}
