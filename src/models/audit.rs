//! Audit log models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub subject_id: Option<String>,
    pub subject_role: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub reason: Option<String>,
    pub trace_id: Option<String>,
    pub result: String,
    pub occurred_at: DateTime<Utc>,
}
