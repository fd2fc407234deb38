//! Classroom observation domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::geography::LocationStamp;
use crate::error::AppError;

/// Observation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ObservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationStatus::Draft => "draft",
            ObservationStatus::Submitted => "submitted",
            ObservationStatus::Approved => "approved",
            ObservationStatus::Rejected => "rejected",
        }
    }

    /// 允许的状态流转
    pub fn can_transition_to(&self, next: ObservationStatus) -> bool {
        matches!(
            (self, next),
            (ObservationStatus::Draft, ObservationStatus::Submitted)
                | (ObservationStatus::Submitted, ObservationStatus::Approved)
                | (ObservationStatus::Submitted, ObservationStatus::Rejected)
                | (ObservationStatus::Rejected, ObservationStatus::Submitted)
        )
    }
}

impl std::str::FromStr for ObservationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ObservationStatus::Draft),
            "submitted" => Ok(ObservationStatus::Submitted),
            "approved" => Ok(ObservationStatus::Approved),
            "rejected" => Ok(ObservationStatus::Rejected),
            other => Err(AppError::Internal(format!("unknown observation status '{}'", other))),
        }
    }
}

/// Observation
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Observation {
    pub id: Uuid,
    pub title: String,
    pub form_id: Option<String>,
    pub observer_id: String,
    pub teacher_id: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub zone_id: Option<String>,
    pub province_id: Option<String>,
    pub department_id: Option<String>,
    pub cluster_id: Option<String>,
    pub school_id: Option<String>,
    pub reviewed_by: Option<String>,
    pub review_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Observation {
    pub fn status(&self) -> Result<ObservationStatus, AppError> {
        self.status.parse()
    }

    pub fn stamp(&self) -> LocationStamp {
        LocationStamp {
            zone_id: self.zone_id.clone(),
            province_id: self.province_id.clone(),
            department_id: self.department_id.clone(),
            cluster_id: self.cluster_id.clone(),
            school_id: self.school_id.clone(),
        }
    }
}

/// Create observation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateObservationRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 64))]
    pub form_id: Option<String>,
    pub teacher_id: Option<String>,
    #[validate(length(min = 1))]
    pub school_id: String,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

/// Stamped record ready for insertion
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub title: String,
    pub form_id: Option<String>,
    pub observer_id: String,
    pub teacher_id: Option<String>,
    pub notes: Option<String>,
    pub location: LocationStamp,
}

/// Review decision body
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// Paged observation list
#[derive(Debug, Serialize)]
pub struct ObservationPage {
    pub items: Vec<Observation>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Observation list filters
#[derive(Debug, Default, Deserialize)]
pub struct ObservationListFilters {
    pub status: Option<ObservationStatus>,
    pub search: Option<String>,
    pub teacher_id: Option<String>,
    pub zone_id: Option<String>,
    pub province_id: Option<String>,
    pub department_id: Option<String>,
    pub cluster_id: Option<String>,
    pub school_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
