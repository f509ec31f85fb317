//! Conversation classification
//!
//! Services are probed politely, in order:
//! 1. wait for the server to speak first (SSH, FTP and SMTP banners)
//! 2. send an HTTP/1.0 request line and wait for a reply
//! 3. send blank lines as a generic stimulus and wait for a reply
//!
//! The first step that yields bytes decides the label. A port that stays
//! silent throughout is still reported as a generic server with no data.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, instrument};

use synprobe_common::{ByteStream, Conversation, ProbeOutcome, Sample, ScanOptions};

pub const HTTP_PROBE: &[u8] = b"GET / HTTP/1.0\r\n\r\n";
pub const GENERIC_PROBE: &[u8] = b"\r\n\r\n\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    AwaitServerInit,
    AwaitClientResponse,
    AwaitGenericResponse,
    Done,
}

impl Step {
    /// Bytes written before this step's read, if any.
    fn stimulus(self) -> Option<&'static [u8]> {
        match self {
            Step::AwaitServerInit | Step::Done => None,
            Step::AwaitClientResponse => Some(HTTP_PROBE),
            Step::AwaitGenericResponse => Some(GENERIC_PROBE),
        }
    }

    fn label(self) -> Conversation {
        match self {
            Step::AwaitServerInit => Conversation::ServerInitiated,
            Step::AwaitClientResponse => Conversation::ClientInitiated,
            Step::AwaitGenericResponse | Step::Done => Conversation::GenericServer,
        }
    }

    fn next(self) -> Step {
        match self {
            Step::AwaitServerInit => Step::AwaitClientResponse,
            Step::AwaitClientResponse => Step::AwaitGenericResponse,
            Step::AwaitGenericResponse | Step::Done => Step::Done,
        }
    }
}

/// Runs the three-step probe over a plain or TLS stream.
#[derive(Debug, Clone)]
pub struct ConversationClassifier {
    read_timeout: Duration,
    write_timeout: Duration,
    capture_limit: usize,
}

impl ConversationClassifier {
    pub fn new(read_timeout: Duration, write_timeout: Duration, capture_limit: usize) -> Self {
        Self {
            read_timeout,
            write_timeout,
            capture_limit: capture_limit.max(1),
        }
    }

    pub fn from_options(options: &ScanOptions) -> Self {
        Self::new(options.read_timeout, options.write_timeout, options.capture_limit)
    }

    #[instrument(skip_all)]
    pub async fn classify<S: ByteStream>(&self, stream: &mut S) -> ProbeOutcome {
        let mut buf = vec![0u8; self.capture_limit];
        let mut step = Step::AwaitServerInit;

        while step != Step::Done {
            if let Some(n) = self.attempt(stream, step, &mut buf).await {
                debug!(?step, bytes = n, "probe answered");
                return ProbeOutcome::new(step.label(), Sample::capture(&buf[..n], self.capture_limit));
            }
            step = step.next();
        }

        debug!("no probe answered, assuming generic service");
        ProbeOutcome::new(Step::Done.label(), Sample::empty())
    }

    /// Write the step's stimulus, then perform one bounded read.
    ///
    /// `None` means "no data from this step": a failed or timed-out write,
    /// EOF, a read error or a read timeout.
    async fn attempt<S: ByteStream>(&self, stream: &mut S, step: Step, buf: &mut [u8]) -> Option<usize> {
        if let Some(stimulus) = step.stimulus() {
            let write = async {
                stream.write_all(stimulus).await?;
                stream.flush().await
            };
            match timeout(self.write_timeout, write).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(?step, "probe write failed: {}", e);
                    return None;
                }
                Err(_) => {
                    debug!(?step, "probe write timed out");
                    return None;
                }
            }
        }

        match timeout(self.read_timeout, stream.read(buf)).await {
            Ok(Ok(n)) if n > 0 => Some(n),
            Ok(Ok(_)) => {
                debug!(?step, "peer closed the stream");
                None
            }
            Ok(Err(e)) => {
                debug!(?step, "probe read failed: {}", e);
                None
            }
            Err(_) => {
                debug!(?step, "probe read timed out");
                None
            }
        }
    }
}

impl Default for ConversationClassifier {
    fn default() -> Self {
        Self::from_options(&ScanOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn quick() -> ConversationClassifier {
        ConversationClassifier::new(Duration::from_millis(150), Duration::from_millis(150), 1024)
    }

    #[test]
    fn steps_run_in_order() {
        let mut step = Step::AwaitServerInit;
        let mut order = vec![step];
        while step != Step::Done {
            step = step.next();
            order.push(step);
        }
        assert_eq!(
            order,
            vec![
                Step::AwaitServerInit,
                Step::AwaitClientResponse,
                Step::AwaitGenericResponse,
                Step::Done
            ]
        );
        assert_eq!(Step::AwaitServerInit.stimulus(), None);
        assert_eq!(Step::Done.label(), Conversation::GenericServer);
    }

    #[tokio::test]
    async fn banner_is_server_initiated() {
        let (mut client, mut server) = duplex(4096);
        server.write_all(b"220 mail.example.com ESMTP\r\n").await.unwrap();

        let outcome = quick().classify(&mut client).await;
        assert_eq!(outcome.label(), Conversation::ServerInitiated);
        assert_eq!(outcome.sample().as_bytes(), b"220 mail.example.com ESMTP\r\n");
    }

    #[tokio::test]
    async fn http_reply_is_client_initiated() {
        let (mut client, mut server) = duplex(4096);
        let peer = tokio::spawn(async move {
            let mut request = vec![0u8; HTTP_PROBE.len()];
            server.read_exact(&mut request).await.unwrap();
            server.write_all(b"HTTP/1.0 200 OK\r\n\r\n").await.unwrap();
            request
        });

        let outcome = quick().classify(&mut client).await;
        assert_eq!(outcome.label(), Conversation::ClientInitiated);
        assert!(outcome.sample().as_bytes().starts_with(b"HTTP/1.0 200"));
        assert_eq!(peer.await.unwrap(), HTTP_PROBE);
    }

    #[tokio::test]
    async fn blank_line_reply_is_generic() {
        let (mut client, mut server) = duplex(4096);
        tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut chunk = [0u8; 64];
            // Ignore the HTTP request; answer only once the blank lines arrive.
            while !seen.ends_with(GENERIC_PROBE) || seen.len() <= HTTP_PROBE.len() {
                let n = server.read(&mut chunk).await.unwrap();
                if n == 0 {
                    return;
                }
                seen.extend_from_slice(&chunk[..n]);
            }
            server.write_all(b"?\r\n").await.unwrap();
            // Keep the stream open until the classifier is done.
            let _ = server.read(&mut chunk).await;
        });

        let outcome = quick().classify(&mut client).await;
        assert_eq!(outcome.label(), Conversation::GenericServer);
        assert_eq!(outcome.sample().as_bytes(), b"?\r\n");
    }

    #[tokio::test]
    async fn silent_peer_is_generic_without_sample() {
        let (mut client, _server) = duplex(4096);
        let classifier = quick();

        let start = Instant::now();
        let outcome = classifier.classify(&mut client).await;
        assert_eq!(outcome.label(), Conversation::GenericServer);
        assert!(outcome.sample().is_empty());
        // Three reads at most, plus scheduling slack.
        assert!(start.elapsed() < Duration::from_millis(150 * 3 + 500));
    }

    #[tokio::test]
    async fn closed_peer_falls_back_to_generic() {
        let (mut client, server) = duplex(4096);
        drop(server);

        let outcome = quick().classify(&mut client).await;
        assert_eq!(outcome, ProbeOutcome::new(Conversation::GenericServer, Sample::empty()));
    }

    #[tokio::test]
    async fn sample_respects_capture_limit() {
        let (mut client, mut server) = duplex(8192);
        server.write_all(&[b'x'; 4096]).await.unwrap();

        let classifier = ConversationClassifier::new(Duration::from_millis(150), Duration::from_millis(150), 16);
        let outcome = classifier.classify(&mut client).await;
        assert_eq!(outcome.label(), Conversation::ServerInitiated);
        assert_eq!(outcome.sample().len(), 16);
    }
}
