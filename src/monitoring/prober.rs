//! Single HTTP liveness probe against a listing URL, classified into a
//! closed set of outcomes. Probing never fails: network-level errors are
//! outcomes too.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, redirect};
use std::error::Error as StdError;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    Dns,
    Connect,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 2xx or 3xx response.
    Success,
    /// 404 or 410: the resource was removed.
    NotFoundLike(u16),
    /// 5xx response.
    ServerError(u16),
    /// Any other status (403, 429, ...), typically bot blocking or throttling.
    UnexpectedStatus(u16),
    Timeout,
    NetworkError(NetworkErrorKind),
}

/// How much a failing outcome says about the listing itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStrength {
    Strong,
    Weak,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success)
    }

    /// `None` for `Success`.
    pub fn signal_strength(&self) -> Option<SignalStrength> {
        match self {
            ProbeOutcome::Success => None,
            ProbeOutcome::NotFoundLike(_) => Some(SignalStrength::Strong),
            ProbeOutcome::ServerError(_)
            | ProbeOutcome::UnexpectedStatus(_)
            | ProbeOutcome::Timeout
            | ProbeOutcome::NetworkError(_) => Some(SignalStrength::Weak),
        }
    }

    pub fn from_status(status: StatusCode) -> Self {
        let code = status.as_u16();
        match code {
            200..=399 => ProbeOutcome::Success,
            404 | 410 => ProbeOutcome::NotFoundLike(code),
            500..=599 => ProbeOutcome::ServerError(code),
            _ => ProbeOutcome::UnexpectedStatus(code),
        }
    }

    pub fn from_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return ProbeOutcome::Timeout;
        }
        if is_dns_failure(err) {
            return ProbeOutcome::NetworkError(NetworkErrorKind::Dns);
        }
        if err.is_connect() {
            return ProbeOutcome::NetworkError(NetworkErrorKind::Connect);
        }
        ProbeOutcome::NetworkError(NetworkErrorKind::Other)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Success => write!(f, "success"),
            ProbeOutcome::NotFoundLike(code)
            | ProbeOutcome::ServerError(code)
            | ProbeOutcome::UnexpectedStatus(code) => write!(f, "http_{code}"),
            ProbeOutcome::Timeout => write!(f, "timeout"),
            ProbeOutcome::NetworkError(NetworkErrorKind::Dns) => write!(f, "dns_error"),
            ProbeOutcome::NetworkError(NetworkErrorKind::Connect) => write!(f, "connection_error"),
            ProbeOutcome::NetworkError(NetworkErrorKind::Other) => write!(f, "network_error"),
        }
    }
}

// hyper-util reports resolver failures as a connect error whose source chain
// mentions "dns error".
fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(inner) = source {
        let text = inner.to_string().to_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        source = inner.source();
    }
    false
}

#[async_trait]
pub trait Prober: Send + Sync {
    /// Probes `url`, returning within `timeout`.
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}

/// Probes over HTTP GET with a shared connection pool.
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        let start_time = Instant::now();
        let request = self.client.get(url).timeout(timeout).send();

        let outcome = match tokio::time::timeout(timeout, request).await {
            Ok(Ok(response)) => ProbeOutcome::from_status(response.status()),
            Ok(Err(e)) => {
                debug!(url = %url, error = %e, "Probe request failed.");
                ProbeOutcome::from_error(&e)
            }
            Err(_) => ProbeOutcome::Timeout,
        };

        debug!(
            url = %url,
            outcome = %outcome,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Probe finished."
        );
        outcome
    }
}
