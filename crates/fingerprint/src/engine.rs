//! Per-port fingerprinting: TLS first, plain TCP as the fallback

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::classifier::ConversationClassifier;
use crate::tls::TlsProber;
use synprobe_common::{
    close, Connector, Endpoint, FingerprintResult, Fingerprinter, ProbeResult, ScanOptions,
    Transport,
};

/// Fingerprints one port at a time over connections from `C`.
pub struct ServiceFingerprinter<C> {
    connector: C,
    tls: TlsProber,
    classifier: ConversationClassifier,
    connect_timeout: Duration,
    close_timeout: Duration,
}

impl<C: Connector> ServiceFingerprinter<C> {
    pub fn new(connector: C, options: &ScanOptions) -> ProbeResult<Self> {
        options.validate()?;
        Ok(Self {
            connector,
            tls: TlsProber::new(options.handshake_timeout)?,
            classifier: ConversationClassifier::from_options(options),
            connect_timeout: options.connect_timeout,
            close_timeout: options.write_timeout,
        })
    }

    /// Classify over `endpoint`, preferring TLS.
    ///
    /// A failed handshake leaves its connection in an unknown state, so the
    /// plain-TCP attempt always opens a fresh one.
    #[instrument(skip(self), fields(port = endpoint.port()))]
    pub async fn probe(&self, endpoint: &Endpoint) -> FingerprintResult {
        let port = endpoint.port();

        let stream = match self.connector.connect(endpoint, self.connect_timeout).await {
            Ok(s) => s,
            Err(e) => {
                debug!("unreachable for TLS probe: {}", e);
                return FingerprintResult::unreachable(port);
            }
        };

        match self.tls.negotiate(stream, endpoint).await {
            Ok(mut tls) => {
                let outcome = self.classifier.classify(&mut tls).await;
                close(tls, self.close_timeout).await;
                return FingerprintResult::new(port, Transport::Tls, outcome);
            }
            Err(not_tls) => debug!("not TLS: {}", not_tls),
        }

        let mut plain = match self.connector.connect(endpoint, self.connect_timeout).await {
            Ok(s) => s,
            Err(e) => {
                debug!("unreachable for plain probe: {}", e);
                return FingerprintResult::unreachable(port);
            }
        };
        let outcome = self.classifier.classify(&mut plain).await;
        close(plain, self.close_timeout).await;
        FingerprintResult::new(port, Transport::PlainTcp, outcome)
    }
}

#[async_trait]
impl<C: Connector> Fingerprinter for ServiceFingerprinter<C> {
    async fn fingerprint(&self, endpoint: &Endpoint) -> FingerprintResult {
        self.probe(endpoint).await
    }
}
