//! 访问决策引擎
//! 组合角色策略、位置包含和本人访问规则，对单个目标做出允许/拒绝决定

use std::sync::Arc;

use super::{role_registry::RoleHierarchyRegistry, scope_resolver::LocationScopeResolver};
use crate::{
    error::AppError,
    models::{
        access::{AccessDecision, AccessPolicy, DecisionReason, MissingTargetPolicy, RequestContext},
        actor::Actor,
        geography::GeoLevel,
    },
};

/// Single-target policy decision point.
///
/// Rules are evaluated in a fixed order and the first match wins:
///
/// 1. no policy attached: allowed
/// 2. no actor: denied
/// 3. self-access allowed and the actor owns the target: allowed
/// 4. administrator: allowed
/// 5. location check declared with a resolvable target: containment decides
/// 6. location check declared without a target: `missing_target` decides
/// 7. otherwise: allowed
///
/// Denials are values, not errors. Only corrupt reference data is returned as
/// `Err`, so it can never be mistaken for an ordinary denial.
#[derive(Clone)]
pub struct AccessDecisionEngine {
    registry: Arc<RoleHierarchyRegistry>,
    resolver: LocationScopeResolver,
    missing_target: MissingTargetPolicy,
}

impl AccessDecisionEngine {
    pub fn new(
        registry: Arc<RoleHierarchyRegistry>,
        resolver: LocationScopeResolver,
        missing_target: MissingTargetPolicy,
    ) -> Self {
        Self {
            registry,
            resolver,
            missing_target,
        }
    }

    pub fn registry(&self) -> &RoleHierarchyRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &LocationScopeResolver {
        &self.resolver
    }

    pub fn decide(
        &self,
        actor: Option<&Actor>,
        policy: Option<&AccessPolicy>,
        ctx: &RequestContext,
    ) -> Result<AccessDecision, AppError> {
        let Some(policy) = policy else {
            return Ok(AccessDecision::allow(DecisionReason::PublicOperation));
        };

        let Some(actor) = actor else {
            return Ok(AccessDecision::deny(DecisionReason::NotAuthenticated));
        };

        if policy.allow_self && ctx.owner_ids(policy).any(|owner| owner == actor.id) {
            return Ok(AccessDecision::allow(DecisionReason::SelfAccess));
        }

        if actor.is_administrator() {
            return Ok(AccessDecision::allow(DecisionReason::Administrator));
        }

        let Some(check) = policy.location.as_ref() else {
            return Ok(AccessDecision::allow(DecisionReason::NoScopeCheck));
        };

        match ctx.target(check) {
            Some((level, id)) => {
                let contained = self.resolver.validate_containment(actor, level, id)?;
                Ok(if contained {
                    AccessDecision::allow(DecisionReason::WithinScope)
                } else {
                    AccessDecision::deny(DecisionReason::OutsideScope)
                })
            }
            None => Ok(match self.missing_target {
                MissingTargetPolicy::Deny => AccessDecision::deny(DecisionReason::MissingTarget),
                MissingTargetPolicy::Allow => AccessDecision::allow(DecisionReason::MissingTarget),
            }),
        }
    }

    /// 是否可以管理目标用户
    ///
    /// 需要角色层级允许，且目标用户的锚点位于操作者范围内。
    pub fn can_manage_user(&self, actor: &Actor, target: &Actor) -> Result<bool, AppError> {
        if actor.is_administrator() {
            return Ok(true);
        }
        if !self.registry.can_manage(actor.role, target.role)? {
            return Ok(false);
        }
        match target.scope_anchor() {
            Some((level, id)) => self.resolver.validate_containment(actor, level, id),
            None => Ok(false),
        }
    }

    /// 是否可以审批位于指定学校的记录
    pub fn can_approve_at(&self, actor: &Actor, school_id: Option<&str>) -> Result<bool, AppError> {
        if !self.registry.can_approve(actor.role)? {
            return Ok(false);
        }
        if actor.is_administrator() {
            return Ok(true);
        }
        match school_id {
            Some(id) => self.resolver.validate_containment(actor, GeoLevel::School, id),
            None => Ok(false),
        }
    }
}
