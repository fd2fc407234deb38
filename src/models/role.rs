//! Role and role policy domain models

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::geography::GeoLevel;
use crate::error::AppError;

/// Fixed management roles, highest authority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Zone,
    Provincial,
    Department,
    Cluster,
    Director,
    Teacher,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Administrator,
        Role::Zone,
        Role::Provincial,
        Role::Department,
        Role::Cluster,
        Role::Director,
        Role::Teacher,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Zone => "zone",
            Role::Provincial => "provincial",
            Role::Department => "department",
            Role::Cluster => "cluster",
            Role::Director => "director",
            Role::Teacher => "teacher",
        }
    }

    /// 角色对应的地理层级（锚点层级）
    ///
    /// Administrator 不绑定任何层级；Director 和 Teacher 都锚定在学校。
    pub fn anchor_level(&self) -> Option<GeoLevel> {
        match self {
            Role::Administrator => None,
            Role::Zone => Some(GeoLevel::Zone),
            Role::Provincial => Some(GeoLevel::Province),
            Role::Department => Some(GeoLevel::Department),
            Role::Cluster => Some(GeoLevel::Cluster),
            Role::Director | Role::Teacher => Some(GeoLevel::School),
        }
    }

    pub fn is_administrator(&self) -> bool {
        matches!(self, Role::Administrator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "administrator" | "admin" => Ok(Role::Administrator),
            "zone" => Ok(Role::Zone),
            "provincial" => Ok(Role::Provincial),
            "department" => Ok(Role::Department),
            "cluster" => Ok(Role::Cluster),
            "director" => Ok(Role::Director),
            "teacher" => Ok(Role::Teacher),
            _ => Err(AppError::UnknownRole(s.to_string())),
        }
    }
}

/// Static per-role policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePolicy {
    pub role: Role,
    pub managed_roles: BTreeSet<Role>,
    pub view_scope_label: String,
    pub can_approve_escalated_actions: bool,
    pub notes: Option<String>,
}

impl RolePolicy {
    pub fn new(role: Role, managed: &[Role], view_scope_label: &str, can_approve: bool) -> Self {
        Self {
            role,
            managed_roles: managed.iter().copied().collect(),
            view_scope_label: view_scope_label.to_string(),
            can_approve_escalated_actions: can_approve,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
}

/// role_policies 表的行（角色以文本存储）
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RolePolicyRow {
    pub role: String,
    pub managed_roles: Vec<String>,
    pub view_scope_label: String,
    pub can_approve: bool,
    pub notes: Option<String>,
}

impl TryFrom<RolePolicyRow> for RolePolicy {
    type Error = AppError;

    fn try_from(row: RolePolicyRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: row.role.parse()?,
            managed_roles: row
                .managed_roles
                .iter()
                .map(|r| r.parse())
                .collect::<Result<BTreeSet<Role>, _>>()?,
            view_scope_label: row.view_scope_label,
            can_approve_escalated_actions: row.can_approve,
            notes: row.notes,
        })
    }
}

/// Role policy summary returned to clients
#[derive(Debug, Serialize)]
pub struct RolePolicySummary {
    pub role: Role,
    pub managed_roles: Vec<Role>,
    pub view_scope: String,
    pub can_approve: bool,
}

impl From<&RolePolicy> for RolePolicySummary {
    fn from(policy: &RolePolicy) -> Self {
        Self {
            role: policy.role,
            managed_roles: policy.managed_roles.iter().copied().collect(),
            view_scope: policy.view_scope_label.clone(),
            can_approve: policy.can_approve_escalated_actions,
        }
    }
}
