//! Authenticated actor model

use serde::{Deserialize, Serialize};

use super::geography::GeoLevel;
use super::role::Role;
use crate::error::AppError;

/// Authenticated user as seen by the access-control core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    pub zone_id: Option<String>,
    pub province_id: Option<String>,
    pub department_id: Option<String>,
    pub cluster_id: Option<String>,
    pub school_id: Option<String>,
}

impl Actor {
    pub fn new(id: &str, role: Role) -> Self {
        Self {
            id: id.to_string(),
            role,
            zone_id: None,
            province_id: None,
            department_id: None,
            cluster_id: None,
            school_id: None,
        }
    }

    pub fn with_location(mut self, level: GeoLevel, id: &str) -> Self {
        let value = Some(id.to_string());
        match level {
            GeoLevel::Zone => self.zone_id = value,
            GeoLevel::Province => self.province_id = value,
            GeoLevel::Department => self.department_id = value,
            GeoLevel::Cluster => self.cluster_id = value,
            GeoLevel::School => self.school_id = value,
        }
        self
    }

    /// 指定层级上分配的 ID
    pub fn assigned_id(&self, level: GeoLevel) -> Option<&str> {
        match level {
            GeoLevel::Zone => self.zone_id.as_deref(),
            GeoLevel::Province => self.province_id.as_deref(),
            GeoLevel::Department => self.department_id.as_deref(),
            GeoLevel::Cluster => self.cluster_id.as_deref(),
            GeoLevel::School => self.school_id.as_deref(),
        }
    }

    /// 作用域锚点：角色所在层级上的 ID
    ///
    /// 角色层级的 ID 缺失时返回 None（分配不完整的账户）。
    pub fn scope_anchor(&self) -> Option<(GeoLevel, &str)> {
        let level = self.role.anchor_level()?;
        self.assigned_id(level).map(|id| (level, id))
    }

    /// Levels at or above the role's anchor that are not populated.
    pub fn missing_assignments(&self) -> Vec<GeoLevel> {
        let Some(anchor) = self.role.anchor_level() else {
            return Vec::new();
        };
        GeoLevel::ALL
            .iter()
            .filter(|level| level.depth() <= anchor.depth())
            .filter(|level| self.assigned_id(**level).is_none())
            .copied()
            .collect()
    }

    pub fn is_administrator(&self) -> bool {
        self.role.is_administrator()
    }
}

/// Users table row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub display_name: String,
    pub role: String,
    pub zone_id: Option<String>,
    pub province_id: Option<String>,
    pub department_id: Option<String>,
    pub cluster_id: Option<String>,
    pub school_id: Option<String>,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<&UserRow> for Actor {
    type Error = AppError;

    fn try_from(row: &UserRow) -> Result<Self, Self::Error> {
        Ok(Actor {
            id: row.id.clone(),
            role: row.role.parse()?,
            zone_id: row.zone_id.clone(),
            province_id: row.province_id.clone(),
            department_id: row.department_id.clone(),
            cluster_id: row.cluster_id.clone(),
            school_id: row.school_id.clone(),
        })
    }
}

/// User response
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub display_name: String,
    pub role: Role,
    pub zone_id: Option<String>,
    pub province_id: Option<String>,
    pub department_id: Option<String>,
    pub cluster_id: Option<String>,
    pub school_id: Option<String>,
    pub status: String,
}

impl TryFrom<UserRow> for UserResponse {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: row.role.parse()?,
            id: row.id,
            display_name: row.display_name,
            zone_id: row.zone_id,
            province_id: row.province_id,
            department_id: row.department_id,
            cluster_id: row.cluster_id,
            school_id: row.school_id,
            status: row.status,
        })
    }
}

/// User list filters
#[derive(Debug, Default, Deserialize)]
pub struct UserListFilters {
    pub role: Option<Role>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub school_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
