//! Namespace CI minute quotas
//!
//! Quotas are soft: crossing a limit changes the reported status and emits
//! an event, it never blocks pipeline creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Consumed minutes for one namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRecord {
    pub namespace_id: Uuid,
    /// Never decreases
    pub consumed_minutes: u64,
    /// `None` or `Some(0)` means unlimited
    pub limit_minutes: Option<u64>,
    pub period_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaStatus {
    Ok,
    NearLimit,
    Exceeded,
}

impl QuotaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuotaStatus::Ok => "ok",
            QuotaStatus::NearLimit => "near_limit",
            QuotaStatus::Exceeded => "exceeded",
        }
    }
}

impl std::fmt::Display for QuotaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds used to classify a quota record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaPolicy {
    /// Fraction of the limit at which `near_limit` starts
    pub near_limit_ratio: f64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            near_limit_ratio: 0.8,
        }
    }
}

impl QuotaRecord {
    pub fn new(namespace_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            namespace_id,
            consumed_minutes: 0,
            limit_minutes: None,
            period_start: now,
        }
    }

    /// The limit, with zero treated as unset
    pub fn effective_limit(&self) -> Option<u64> {
        self.limit_minutes.filter(|limit| *limit > 0)
    }

    pub fn remaining_minutes(&self) -> Option<u64> {
        self.effective_limit()
            .map(|limit| limit.saturating_sub(self.consumed_minutes))
    }
}

impl QuotaPolicy {
    pub fn status(&self, record: &QuotaRecord) -> QuotaStatus {
        let Some(limit) = record.effective_limit() else {
            return QuotaStatus::Ok;
        };

        let consumed = record.consumed_minutes;
        if consumed >= limit {
            QuotaStatus::Exceeded
        } else if consumed as f64 >= self.near_limit_ratio * limit as f64 {
            QuotaStatus::NearLimit
        } else {
            QuotaStatus::Ok
        }
    }

    /// Human-readable warning for a non-ok status
    pub fn warning(&self, record: &QuotaRecord) -> Option<String> {
        let limit = record.effective_limit()?;
        match self.status(record) {
            QuotaStatus::Ok => None,
            QuotaStatus::NearLimit => Some(format!(
                "Namespace has used {} of {} CI minutes",
                record.consumed_minutes, limit
            )),
            QuotaStatus::Exceeded => Some(format!(
                "Namespace has exceeded its CI minute quota ({} of {} minutes used)",
                record.consumed_minutes, limit
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(consumed: u64, limit: Option<u64>) -> QuotaRecord {
        QuotaRecord {
            consumed_minutes: consumed,
            limit_minutes: limit,
            ..QuotaRecord::new(Uuid::new_v4(), Utc::now())
        }
    }

    #[test]
    fn test_unset_limit_never_warns() {
        let policy = QuotaPolicy::default();
        assert_eq!(policy.status(&record(1_000_000, None)), QuotaStatus::Ok);
        assert_eq!(policy.status(&record(1_000_000, Some(0))), QuotaStatus::Ok);
        assert_eq!(policy.warning(&record(5, Some(0))), None);
    }

    #[test]
    fn test_thresholds() {
        let policy = QuotaPolicy::default();
        assert_eq!(policy.status(&record(79, Some(100))), QuotaStatus::Ok);
        assert_eq!(policy.status(&record(80, Some(100))), QuotaStatus::NearLimit);
        assert_eq!(policy.status(&record(99, Some(100))), QuotaStatus::NearLimit);
        assert_eq!(policy.status(&record(100, Some(100))), QuotaStatus::Exceeded);
        assert_eq!(policy.status(&record(150, Some(100))), QuotaStatus::Exceeded);
    }

    #[test]
    fn test_custom_ratio() {
        let policy = QuotaPolicy {
            near_limit_ratio: 0.5,
        };
        assert_eq!(policy.status(&record(50, Some(100))), QuotaStatus::NearLimit);
        assert!(policy.warning(&record(50, Some(100))).is_some());
    }

    #[test]
    fn test_remaining_saturates() {
        assert_eq!(record(150, Some(100)).remaining_minutes(), Some(0));
        assert_eq!(record(10, None).remaining_minutes(), None);
    }
}
