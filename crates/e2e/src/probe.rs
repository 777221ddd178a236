//! Reachability check for the translator before launching browsers

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub url: String,
    pub attempts: usize,
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl ProbeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempts: 3,
            interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Successful probe
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub status: u16,
    pub attempts: usize,
    pub elapsed: Duration,
}

/// GET the target until it answers 2xx or the attempts run out
pub async fn probe_target(config: &ProbeConfig) -> E2eResult<ProbeReport> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()?;

    let start = std::time::Instant::now();
    let mut attempts = 0;

    while attempts < config.attempts.max(1) {
        attempts += 1;

        match client.get(&config.url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("{} answered {} after {} attempt(s)", config.url, resp.status(), attempts);
                return Ok(ProbeReport {
                    status: resp.status().as_u16(),
                    attempts,
                    elapsed: start.elapsed(),
                });
            }
            Ok(resp) => {
                warn!("Probe of {} returned {}", config.url, resp.status());
            }
            Err(e) => {
                warn!("Probe of {} failed: {}", config.url, e);
            }
        }

        if attempts < config.attempts {
            sleep(config.interval).await;
        }
    }

    Err(E2eError::TargetUnreachable(attempts))
}
