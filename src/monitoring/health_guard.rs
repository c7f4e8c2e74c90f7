//! Pre-flight checks run before any listing is probed: first our own
//! connectivity, then the listing platform. One answering endpoint is enough
//! for either check to pass.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::prober::Prober;

/// Result of the pre-flight checks that run before any listing is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Own network and the platform are reachable.
    Healthy,
    /// The platform is unreachable; listings are probed but notifications are suppressed.
    PlatformDown,
    /// No connectivity endpoint answered; the cycle must not run.
    NoConnectivity,
}

pub struct HealthGuard {
    prober: Arc<dyn Prober>,
    connectivity_endpoints: Vec<String>,
    platform_endpoints: Vec<String>,
    timeout: Duration,
}

impl HealthGuard {
    pub fn new(
        prober: Arc<dyn Prober>,
        connectivity_endpoints: Vec<String>,
        platform_endpoints: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            prober,
            connectivity_endpoints,
            platform_endpoints,
            timeout,
        }
    }

    pub async fn check(&self) -> GuardVerdict {
        if !self.any_reachable(&self.connectivity_endpoints).await {
            error!(
                endpoints = ?self.connectivity_endpoints,
                "No connectivity endpoint reachable. Server appears to be offline."
            );
            return GuardVerdict::NoConnectivity;
        }
        info!("Connectivity check passed.");

        if !self.any_reachable(&self.platform_endpoints).await {
            warn!(
                endpoints = ?self.platform_endpoints,
                "No platform endpoint reachable. Platform appears to be down."
            );
            return GuardVerdict::PlatformDown;
        }
        info!("Platform health check passed.");

        GuardVerdict::Healthy
    }

    /// Probes all endpoints concurrently and returns as soon as one succeeds.
    async fn any_reachable(&self, endpoints: &[String]) -> bool {
        let mut pending: FuturesUnordered<_> = endpoints
            .iter()
            .map(|url| async move { (url, self.prober.probe(url, self.timeout).await) })
            .collect();

        while let Some((url, outcome)) = pending.next().await {
            if outcome.is_success() {
                return true;
            }
            warn!(url = %url, outcome = %outcome, "Guard endpoint check failed.");
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::prober::{NetworkErrorKind, ProbeOutcome};
    use crate::monitoring::testing::ScriptedProber;

    fn guard(prober: ScriptedProber) -> HealthGuard {
        HealthGuard::new(
            Arc::new(prober),
            vec!["https://net-a.test".into(), "https://net-b.test".into()],
            vec!["https://platform-a.test".into(), "https://platform-b.test".into()],
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn healthy_when_any_endpoint_of_each_group_answers() {
        let prober = ScriptedProber::new()
            .with("https://net-a.test", ProbeOutcome::Timeout)
            .with("https://net-b.test", ProbeOutcome::Success)
            .with("https://platform-a.test", ProbeOutcome::ServerError(503))
            .with("https://platform-b.test", ProbeOutcome::Success);

        assert_eq!(guard(prober).check().await, GuardVerdict::Healthy);
    }

    #[tokio::test]
    async fn all_connectivity_endpoints_failing_aborts() {
        let dns = ProbeOutcome::NetworkError(NetworkErrorKind::Dns);
        let prober = ScriptedProber::new()
            .with("https://net-a.test", dns)
            .with("https://net-b.test", ProbeOutcome::Timeout)
            .with("https://platform-a.test", ProbeOutcome::Success)
            .with("https://platform-b.test", ProbeOutcome::Success);

        assert_eq!(guard(prober).check().await, GuardVerdict::NoConnectivity);
    }

    #[tokio::test]
    async fn all_platform_endpoints_failing_reports_platform_down() {
        let prober = ScriptedProber::new()
            .with("https://net-a.test", ProbeOutcome::Success)
            .with("https://net-b.test", ProbeOutcome::Success)
            .with("https://platform-a.test", ProbeOutcome::ServerError(502))
            .with("https://platform-b.test", ProbeOutcome::Timeout);

        assert_eq!(guard(prober).check().await, GuardVerdict::PlatformDown);
    }
}
