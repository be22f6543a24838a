//! Running deployment statistics.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DeploymentResult, DeploymentStatus};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Approved and fully processed.
    Processed,
    /// Valid, but not an approval.
    Ignored,
    /// Could not be decoded.
    Malformed,
    /// Processing aborted; handed back to the bus.
    Nacked,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Ignored => "ignored",
            Self::Malformed => "malformed",
            Self::Nacked => "nacked",
        }
    }
}

#[derive(Debug, Default, Clone)]
struct Counts {
    total: u64,
    successful: u64,
    failed: u64,
    cancelled: u64,
    total_duration_ms: u64,
}

impl Counts {
    fn record(&mut self, result: &DeploymentResult) {
        self.total += 1;
        self.total_duration_ms += result.metrics.duration_ms;
        match result.status {
            DeploymentStatus::Success => self.successful += 1,
            DeploymentStatus::Failed => self.failed += 1,
            DeploymentStatus::Cancelled => self.cancelled += 1,
            DeploymentStatus::Pending | DeploymentStatus::Running => {}
        }
    }

    fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }

    fn average_duration_ms(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    overall: Counts,
    by_platform: BTreeMap<String, Counts>,
    events_processed: u64,
    events_ignored: u64,
    events_malformed: u64,
    events_nacked: u64,
    publish_failures: u64,
    last_deployment_at: Option<DateTime<Utc>>,
}

/// Statistics for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub success_rate: f64,
    pub average_duration_ms: f64,
}

impl From<&Counts> for PlatformStats {
    fn from(counts: &Counts) -> Self {
        Self {
            total: counts.total,
            successful: counts.successful,
            failed: counts.failed,
            cancelled: counts.cancelled,
            success_rate: counts.success_rate(),
            average_duration_ms: counts.average_duration_ms(),
        }
    }
}

/// Point-in-time copy of [`DeploymentStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatsSnapshot {
    pub total_deployments: u64,
    pub successful_deployments: u64,
    pub failed_deployments: u64,
    pub cancelled_deployments: u64,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub by_platform: BTreeMap<String, PlatformStats>,
    pub events_processed: u64,
    pub events_ignored: u64,
    pub events_malformed: u64,
    pub events_nacked: u64,
    pub publish_failures: u64,
    pub last_deployment_at: Option<DateTime<Utc>>,
}

/// Counters shared by every in-flight event of one orchestrator.
#[derive(Debug, Default)]
pub struct DeploymentStats {
    inner: Mutex<Inner>,
}

impl DeploymentStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_result(&self, result: &DeploymentResult) {
        let mut inner = self.lock();
        inner.overall.record(result);
        inner
            .by_platform
            .entry(result.platform.to_string())
            .or_default()
            .record(result);
        inner.last_deployment_at = Some(result.deployed_at);
    }

    pub fn record_event(&self, outcome: EventOutcome) {
        let mut inner = self.lock();
        match outcome {
            EventOutcome::Processed => inner.events_processed += 1,
            EventOutcome::Ignored => inner.events_ignored += 1,
            EventOutcome::Malformed => inner.events_malformed += 1,
            EventOutcome::Nacked => inner.events_nacked += 1,
        }
    }

    pub fn record_publish_failure(&self) {
        self.lock().publish_failures += 1;
    }

    pub fn snapshot(&self) -> DeploymentStatsSnapshot {
        let inner = self.lock();
        DeploymentStatsSnapshot {
            total_deployments: inner.overall.total,
            successful_deployments: inner.overall.successful,
            failed_deployments: inner.overall.failed,
            cancelled_deployments: inner.overall.cancelled,
            success_rate: inner.overall.success_rate(),
            average_duration_ms: inner.overall.average_duration_ms(),
            by_platform: inner
                .by_platform
                .iter()
                .map(|(platform, counts)| (platform.clone(), PlatformStats::from(counts)))
                .collect(),
            events_processed: inner.events_processed,
            events_ignored: inner.events_ignored,
            events_malformed: inner.events_malformed,
            events_nacked: inner.events_nacked,
            publish_failures: inner.publish_failures,
            last_deployment_at: inner.last_deployment_at,
        }
    }
}
