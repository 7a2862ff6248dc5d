//! Health check types for diagnostics.
//!
//! A report is assembled purely from in-memory state (circuit breaker, cache entry and
//! section counts); building one never touches the network.

use serde::Serialize;

use crate::SectionCounts;
use crate::cache::CacheStatus;
use crate::circuit::{CircuitSnapshot, CircuitState};

/// Overall health report for the knowledge base.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Overall status derived from all checks.
    pub overall_status: HealthStatus,
    /// Individual check results.
    pub checks: Vec<HealthCheck>,
    /// Suggested remediation steps.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    pub circuit: CircuitSnapshot,
    pub cache: CacheStatus,
    pub sections: SectionCounts,
}

/// Individual health check result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    /// Human-friendly check name.
    pub name: String,
    /// Status of the check.
    pub status: HealthStatus,
    /// Message describing the result.
    pub message: String,
}

/// Health status for checks, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Check passed with no issues.
    Healthy,
    /// Check passed with warnings.
    Warning,
    /// Check failed with an error.
    Error,
}

impl HealthStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl HealthReport {
    /// Derive checks and recommendations from component snapshots.
    pub fn assemble(circuit: CircuitSnapshot, cache: CacheStatus, sections: SectionCounts) -> Self {
        let mut checks = Vec::with_capacity(3);
        let mut recommendations = Vec::new();

        let circuit_check = match circuit.state {
            CircuitState::Closed => check(
                "circuit breaker",
                HealthStatus::Healthy,
                format!(
                    "closed ({}/{} consecutive failures)",
                    circuit.consecutive_failures, circuit.failure_threshold
                ),
            ),
            CircuitState::HalfOpen => check(
                "circuit breaker",
                HealthStatus::Warning,
                "half-open, probe request in flight".to_string(),
            ),
            CircuitState::Open => {
                recommendations.push(format!(
                    "Remote fetches are suspended; retry after {}s",
                    circuit.retry_after_secs.unwrap_or_default()
                ));
                check(
                    "circuit breaker",
                    HealthStatus::Error,
                    format!(
                        "open after {} consecutive failures",
                        circuit.consecutive_failures
                    ),
                )
            },
        };
        checks.push(circuit_check);

        let cache_check = if !cache.has_content {
            recommendations.push(format!(
                "No content loaded yet; run a refresh to fetch {}",
                cache.source_url
            ));
            check("cache", HealthStatus::Error, "no content loaded".to_string())
        } else if cache.is_stale {
            check(
                "cache",
                HealthStatus::Warning,
                format!(
                    "stale (age {}s, ttl {}s); refreshed on next query",
                    cache.age_secs.unwrap_or_default(),
                    cache.ttl_secs
                ),
            )
        } else {
            check(
                "cache",
                HealthStatus::Healthy,
                format!(
                    "fresh (age {}s, ttl {}s)",
                    cache.age_secs.unwrap_or_default(),
                    cache.ttl_secs
                ),
            )
        };
        checks.push(cache_check);

        if cache.has_content {
            let status = if sections.total == 0 {
                recommendations.push(
                    "The source document parsed into zero sections; check its headings".into(),
                );
                HealthStatus::Warning
            } else {
                HealthStatus::Healthy
            };
            checks.push(check(
                "sections",
                status,
                format!(
                    "{} total ({} documentation, {} experience)",
                    sections.total, sections.documentation, sections.experience
                ),
            ));
        }

        let overall_status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        Self {
            overall_status,
            checks,
            recommendations,
            circuit,
            cache,
            sections,
        }
    }
}

fn check(name: &str, status: HealthStatus, message: String) -> HealthCheck {
    HealthCheck {
        name: name.to_string(),
        status,
        message,
    }
}
