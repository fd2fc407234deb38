//! Access policy, request context and decision models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::geography::GeoLevel;
use crate::error::AppError;

/// Declarative policy attached to an operation.
///
/// Pure configuration data: which request parameters name the owner of the
/// target resource, and where the target's geographic level and id come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    #[serde(default)]
    pub allow_self: bool,
    #[serde(default)]
    pub owner_params: Vec<String>,
    #[serde(default)]
    pub location: Option<LocationCheck>,
}

/// Location scope check declared on a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCheck {
    /// Fixed level; takes precedence over `level_param`
    pub level: Option<GeoLevel>,
    /// Request parameter holding the level name
    pub level_param: Option<String>,
    /// Request parameter holding the target entity id
    pub id_param: String,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 允许资源所有者访问自己的资源
    pub fn allow_self(mut self, owner_params: &[&str]) -> Self {
        self.allow_self = true;
        self.owner_params = owner_params.iter().map(|p| p.to_string()).collect();
        self
    }

    /// 在固定层级上检查位置范围
    pub fn scoped_to(mut self, level: GeoLevel, id_param: &str) -> Self {
        self.location = Some(LocationCheck {
            level: Some(level),
            level_param: None,
            id_param: id_param.to_string(),
        });
        self
    }

    /// 层级也从请求参数中读取
    pub fn scoped_by_params(mut self, level_param: &str, id_param: &str) -> Self {
        self.location = Some(LocationCheck {
            level: None,
            level_param: Some(level_param.to_string()),
            id_param: id_param.to_string(),
        });
        self
    }

    pub fn checks_location(&self) -> bool {
        self.location.is_some()
    }
}

/// Per-request parameters gathered from path, query and resolved resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.params.insert(name.to_string(), value.into());
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// Owning-user ids named by the policy's owner parameters
    pub fn owner_ids<'a>(&'a self, policy: &'a AccessPolicy) -> impl Iterator<Item = &'a str> + 'a {
        policy.owner_params.iter().filter_map(|name| self.param(name))
    }

    /// 解析目标位置；无法确定时返回 None
    pub fn target(&self, check: &LocationCheck) -> Option<(GeoLevel, &str)> {
        let level = match (check.level, check.level_param.as_deref()) {
            (Some(level), _) => level,
            (None, Some(param)) => self.param(param)?.parse::<GeoLevel>().ok()?,
            (None, None) => return None,
        };
        let id = self.param(&check.id_param)?;
        Some((level, id))
    }
}

/// What to do when a location check is declared but the request carries no
/// resolvable target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTargetPolicy {
    #[default]
    Deny,
    Allow,
}

impl std::str::FromStr for MissingTargetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deny" => Ok(MissingTargetPolicy::Deny),
            "allow" => Ok(MissingTargetPolicy::Allow),
            other => Err(format!("Invalid missing_target policy: {}. Must be one of: deny, allow", other)),
        }
    }
}

/// Which rule settled a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    PublicOperation,
    NotAuthenticated,
    SelfAccess,
    Administrator,
    WithinScope,
    OutsideScope,
    MissingTarget,
    NoScopeCheck,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::PublicOperation => "public_operation",
            DecisionReason::NotAuthenticated => "not_authenticated",
            DecisionReason::SelfAccess => "self_access",
            DecisionReason::Administrator => "administrator",
            DecisionReason::WithinScope => "within_scope",
            DecisionReason::OutsideScope => "outside_scope",
            DecisionReason::MissingTarget => "missing_target",
            DecisionReason::NoScopeCheck => "no_scope_check",
        }
    }
}

/// Outcome of a single access decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
}

impl AccessDecision {
    pub fn allow(reason: DecisionReason) -> Self {
        Self { allowed: true, reason }
    }

    pub fn deny(reason: DecisionReason) -> Self {
        Self { allowed: false, reason }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn outcome(&self) -> &'static str {
        if self.allowed {
            "allowed"
        } else {
            "denied"
        }
    }

    /// 在边界处把拒绝转换为 401 / 403
    pub fn into_result(self) -> Result<(), AppError> {
        match (self.allowed, self.reason) {
            (true, _) => Ok(()),
            (false, DecisionReason::NotAuthenticated) => Err(AppError::Unauthorized),
            (false, _) => Err(AppError::Forbidden),
        }
    }
}

/// Body of `POST /api/v1/access/check`
#[derive(Debug, Deserialize)]
pub struct AccessCheckRequest {
    pub policy: Option<AccessPolicy>,
    #[serde(default)]
    pub context: RequestContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_with_fixed_level() {
        let policy = AccessPolicy::new().scoped_to(GeoLevel::School, "school_id");
        let ctx = RequestContext::new().with_param("school_id", "school-001");
        let check = policy.location.as_ref().unwrap();
        assert_eq!(ctx.target(check), Some((GeoLevel::School, "school-001")));
    }

    #[test]
    fn test_target_with_level_param() {
        let policy = AccessPolicy::new().scoped_by_params("level", "id");
        let check = policy.location.as_ref().unwrap();

        let ctx = RequestContext::new()
            .with_param("level", "department")
            .with_param("id", "department-002");
        assert_eq!(ctx.target(check), Some((GeoLevel::Department, "department-002")));

        let bad_level = RequestContext::new()
            .with_param("level", "galaxy")
            .with_param("id", "x");
        assert_eq!(bad_level.target(check), None);
    }

    #[test]
    fn test_blank_params_are_absent() {
        let policy = AccessPolicy::new().allow_self(&["user_id"]);
        let ctx = RequestContext::new().with_param("user_id", "  ");
        assert_eq!(ctx.owner_ids(&policy).count(), 0);
    }

    #[test]
    fn test_decision_into_result() {
        assert!(AccessDecision::allow(DecisionReason::SelfAccess).into_result().is_ok());
        assert!(matches!(
            AccessDecision::deny(DecisionReason::NotAuthenticated).into_result(),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            AccessDecision::deny(DecisionReason::OutsideScope).into_result(),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn test_policy_deserialize_defaults() {
        let policy: AccessPolicy = serde_json::from_str("{}").unwrap();
        assert!(!policy.allow_self);
        assert!(policy.owner_params.is_empty());
        assert!(policy.location.is_none());

        let policy: AccessPolicy = serde_json::from_str(
            r#"{"allow_self":true,"owner_params":["user_id"],"location":{"level":"province","level_param":null,"id_param":"province_id"}}"#,
        )
        .unwrap();
        assert_eq!(policy.location.unwrap().level, Some(GeoLevel::Province));
    }

    #[test]
    fn test_missing_target_policy_parse() {
        assert_eq!("DENY".parse::<MissingTargetPolicy>().unwrap(), MissingTargetPolicy::Deny);
        assert_eq!("allow".parse::<MissingTargetPolicy>().unwrap(), MissingTargetPolicy::Allow);
        assert!("maybe".parse::<MissingTargetPolicy>().is_err());
    }
}
