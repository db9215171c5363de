//! Quota DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::quota::{QuotaPolicy, QuotaRecord, QuotaStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaView {
    pub namespace_id: Uuid,
    pub consumed_minutes: u64,
    pub limit_minutes: Option<u64>,
    pub remaining_minutes: Option<u64>,
    pub status: QuotaStatus,
    pub warning: Option<String>,
}

impl QuotaView {
    pub fn new(record: &QuotaRecord, policy: &QuotaPolicy) -> Self {
        QuotaView {
            namespace_id: record.namespace_id,
            consumed_minutes: record.consumed_minutes,
            limit_minutes: record.effective_limit(),
            remaining_minutes: record.remaining_minutes(),
            status: policy.status(record),
            warning: policy.warning(record),
        }
    }
}

/// `None` or `0` removes the limit
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetQuotaLimit {
    pub limit_minutes: Option<u64>,
}
