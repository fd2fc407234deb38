//! 位置范围解析
//! 把用户分配的地理 ID 解析为实体链，并做传递性包含检查

use serde::Serialize;
use std::sync::Arc;

use super::geography_catalog::GeographicEntityCatalog;
use crate::{
    error::AppError,
    models::{
        actor::Actor,
        geography::{GeoLevel, GeographicEntity},
    },
};

/// Resolved location chain of an actor, most specific level first.
///
/// Request-scoped: built per check, never cached.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocationScope {
    pub entities: Vec<GeographicEntity>,
}

impl LocationScope {
    pub fn entity(&self, level: GeoLevel) -> Option<&GeographicEntity> {
        self.entities.iter().find(|e| e.level == level)
    }

    pub fn most_specific(&self) -> Option<&GeographicEntity> {
        self.entities.first()
    }

    pub fn levels(&self) -> Vec<GeoLevel> {
        self.entities.iter().map(|e| e.level).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Clone)]
pub struct LocationScopeResolver {
    catalog: Arc<GeographicEntityCatalog>,
}

impl LocationScopeResolver {
    pub fn new(catalog: Arc<GeographicEntityCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &GeographicEntityCatalog {
        &self.catalog
    }

    /// 解析用户的位置范围
    ///
    /// 只包含用户实际分配了 ID 的层级；分配了不存在的实体属于配置故障。
    pub fn resolve_scope(&self, actor: &Actor) -> Result<LocationScope, AppError> {
        let mut entities = Vec::new();

        for level in GeoLevel::ALL.iter().rev() {
            let Some(id) = actor.assigned_id(*level) else {
                continue;
            };
            let entity = self
                .catalog
                .by_id(*level, id)
                .ok_or_else(|| AppError::UnknownAssignment {
                    level: *level,
                    id: id.to_string(),
                })?;
            entities.push(entity.clone());
        }

        Ok(LocationScope { entities })
    }

    /// 用户直接管理的实体：锚点的下一级子实体
    ///
    /// Administrator 管理全部 Zone；学校层级的用户没有下级实体。
    pub fn managed_entities(&self, actor: &Actor) -> Result<Vec<GeographicEntity>, AppError> {
        if actor.is_administrator() {
            return Ok(self.catalog.zones().into_iter().cloned().collect());
        }

        let Some((level, id)) = actor.scope_anchor() else {
            tracing::warn!(
                actor_id = %actor.id,
                role = %actor.role,
                missing = ?actor.missing_assignments(),
                "Actor has no scope anchor"
            );
            return Ok(Vec::new());
        };

        // 锚点本身必须存在
        self.catalog
            .by_id(level, id)
            .ok_or_else(|| AppError::UnknownAssignment {
                level,
                id: id.to_string(),
            })?;

        Ok(self
            .catalog
            .children_of(level, id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// 目标是否位于用户的锚点之下（或等于锚点）
    ///
    /// 通过目标的祖先链证明包含关系，Zone 用户无需分配学校 ID 即可访问学校。
    pub fn validate_containment(
        &self,
        actor: &Actor,
        target_level: GeoLevel,
        target_id: &str,
    ) -> Result<bool, AppError> {
        if actor.is_administrator() {
            return Ok(true);
        }

        let Some((anchor_level, anchor_id)) = actor.scope_anchor() else {
            tracing::warn!(
                actor_id = %actor.id,
                role = %actor.role,
                "Containment check without scope anchor, denying"
            );
            return Ok(false);
        };

        self.catalog
            .is_within(target_level, target_id, anchor_level, anchor_id)
    }
}
