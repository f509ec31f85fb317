//! TLS detection by handshake
//!
//! The prober is a reconnaissance client: it accepts any certificate chain
//! for any name, so services with self-signed, expired or mismatched
//! certificates are still fingerprinted. Handshake signatures are checked
//! against whatever certificate the server presented.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{self, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{self, ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument};

use synprobe_common::{ByteStream, Endpoint, ProbeError, ProbeResult};

pub use tokio_rustls::client::TlsStream;

/// Why a port was judged not to speak TLS. Never fatal.
#[derive(Error, Debug)]
pub enum NotTls {
    #[error("handshake failed: {0}")]
    Handshake(#[from] io::Error),

    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),
}

/// Certificate verifier that trusts every chain and every host name.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
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
        crypto::verify_tls12_signature(
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
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Single-attempt TLS client handshake over an already open stream.
#[derive(Clone)]
pub struct TlsProber {
    connector: TlsConnector,
    handshake_timeout: Duration,
}

impl TlsProber {
    pub fn new(handshake_timeout: Duration) -> ProbeResult<Self> {
        if handshake_timeout.is_zero() {
            return Err(ProbeError::Config("handshake timeout must be positive".into()));
        }

        let provider = Arc::new(crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| ProbeError::Tls(format!("Failed to select TLS versions: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            handshake_timeout,
        })
    }

    #[inline]
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Wrap `stream` in a TLS client session for `endpoint`.
    ///
    /// The handshake is always attempted, whatever the host string. On any
    /// failure the stream has been consumed and dropped, closing it.
    #[instrument(skip(self, stream), fields(host = endpoint.host(), port = endpoint.port()))]
    pub async fn negotiate<S>(&self, stream: S, endpoint: &Endpoint) -> Result<TlsStream<S>, NotTls>
    where
        S: ByteStream,
    {
        let name = server_name(endpoint);

        match timeout(self.handshake_timeout, self.connector.connect(name, stream)).await {
            Ok(Ok(tls)) => {
                let (_, session) = tls.get_ref();
                debug!(
                    version = ?session.protocol_version(),
                    cipher = ?session.negotiated_cipher_suite().map(|s| s.suite()),
                    "TLS handshake complete"
                );
                Ok(tls)
            }
            Ok(Err(e)) => {
                debug!("TLS handshake failed: {}", e);
                Err(NotTls::Handshake(e))
            }
            Err(_) => {
                debug!("TLS handshake timed out");
                Err(NotTls::Timeout(self.handshake_timeout))
            }
        }
    }
}

/// Name presented for `endpoint`: its host, or its address when the host is
/// not a valid DNS name. IP addresses are sent without SNI.
fn server_name(endpoint: &Endpoint) -> ServerName<'static> {
    ServerName::try_from(endpoint.host().to_string())
        .unwrap_or_else(|_| ServerName::IpAddress(endpoint.ip().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn endpoint(host: &str, ip: IpAddr) -> Endpoint {
        Endpoint::new(host, ip, 443).unwrap()
    }

    #[test]
    fn zero_handshake_timeout_is_rejected() {
        assert!(TlsProber::new(Duration::ZERO).is_err());
        let prober = TlsProber::new(Duration::from_secs(3)).unwrap();
        assert_eq!(prober.handshake_timeout(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn plaintext_reply_is_not_tls() {
        let (client, mut server) = duplex(4096);
        let peer = tokio::spawn(async move {
            let mut hello = [0u8; 512];
            let _ = server.read(&mut hello).await;
            let _ = server.write_all(b"SSH-2.0-OpenSSH_8.9\r\n").await;
        });

        let prober = TlsProber::new(Duration::from_secs(2)).unwrap();
        let err = prober.negotiate(client, &endpoint("localhost", LOCALHOST)).await.unwrap_err();
        assert!(matches!(err, NotTls::Handshake(_)));
        peer.await.unwrap();
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let (client, _server) = duplex(4096);
        let prober = TlsProber::new(Duration::from_millis(200)).unwrap();
        let err = prober.negotiate(client, &endpoint("127.0.0.1", LOCALHOST)).await.unwrap_err();
        assert!(matches!(err, NotTls::Timeout(_)));
    }

    #[test]
    fn server_name_prefers_host() {
        assert!(matches!(
            server_name(&endpoint("localhost", LOCALHOST)),
            ServerName::DnsName(_)
        ));
        assert!(matches!(
            server_name(&endpoint("[::1]", IpAddr::V6(Ipv6Addr::LOCALHOST))),
            ServerName::IpAddress(_)
        ));
    }

    #[test]
    fn unusable_host_falls_back_to_address() {
        let name = server_name(&endpoint("bad name!", LOCALHOST));
        assert_eq!(name, ServerName::IpAddress(LOCALHOST.into()));
    }

    #[tokio::test]
    async fn unusable_host_still_attempts_handshake() {
        let (client, mut server) = duplex(4096);
        let peer = tokio::spawn(async move {
            let mut hello = [0u8; 512];
            server.read(&mut hello).await.unwrap_or(0)
        });

        let prober = TlsProber::new(Duration::from_millis(300)).unwrap();
        let err = prober
            .negotiate(client, &endpoint("bad name!", LOCALHOST))
            .await
            .unwrap_err();
        assert!(matches!(err, NotTls::Timeout(_) | NotTls::Handshake(_)));
        // A ClientHello record was sent.
        let n = peer.await.unwrap();
        assert!(n > 0);
    }
}
