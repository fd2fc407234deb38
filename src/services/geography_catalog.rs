//! 地理实体目录
//! 只读的 Zone → Province → Department → Cluster → School 树

use std::collections::{HashMap, HashSet};

use crate::{
    error::AppError,
    models::geography::{GeoLevel, GeographicEntity, LocationStamp},
};

/// Read-only geography tree, indexed by (level, id).
#[derive(Debug, Clone, Default)]
pub struct GeographicEntityCatalog {
    entities: Vec<GeographicEntity>,
    by_key: HashMap<(GeoLevel, String), usize>,
    /// (parent level, parent id) -> children sorted by name
    children: HashMap<(GeoLevel, String), Vec<usize>>,
    zones: Vec<usize>,
}

impl GeographicEntityCatalog {
    /// 建立索引，不做完整性校验（见 `validate_integrity`）
    pub fn from_entities(entities: Vec<GeographicEntity>) -> Self {
        let mut by_key = HashMap::with_capacity(entities.len());
        let mut children: HashMap<(GeoLevel, String), Vec<usize>> = HashMap::new();
        let mut zones = Vec::new();

        for (index, entity) in entities.iter().enumerate() {
            by_key.insert((entity.level, entity.id.clone()), index);

            match (entity.level.parent(), entity.parent_id.as_ref()) {
                (Some(parent_level), Some(parent_id)) => {
                    children
                        .entry((parent_level, parent_id.clone()))
                        .or_default()
                        .push(index);
                }
                (None, _) => zones.push(index),
                (Some(_), None) => {}
            }
        }

        let by_name = |a: &usize, b: &usize| {
            entities[*a]
                .name
                .cmp(&entities[*b].name)
                .then_with(|| entities[*a].id.cmp(&entities[*b].id))
        };
        for list in children.values_mut() {
            list.sort_by(by_name);
        }
        zones.sort_by(by_name);

        Self {
            entities,
            by_key,
            children,
            zones,
        }
    }

    /// 建立索引并校验；任何问题都视为配置故障
    pub fn load(entities: Vec<GeographicEntity>) -> Result<Self, AppError> {
        let catalog = Self::from_entities(entities);
        let problems = catalog.validate_integrity();
        if let Some(first) = problems.into_iter().next() {
            return Err(first);
        }
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn count_at(&self, level: GeoLevel) -> usize {
        self.entities.iter().filter(|e| e.level == level).count()
    }

    pub fn entities(&self) -> impl Iterator<Item = &GeographicEntity> {
        self.entities.iter()
    }

    pub fn by_id(&self, level: GeoLevel, id: &str) -> Option<&GeographicEntity> {
        self.by_key
            .get(&(level, id.to_string()))
            .map(|index| &self.entities[*index])
    }

    /// 查找实体，不存在时返回 NotFound
    pub fn require(&self, level: GeoLevel, id: &str) -> Result<&GeographicEntity, AppError> {
        self.by_id(level, id)
            .ok_or_else(|| AppError::NotFound(format!("{} {}", level, id)))
    }

    /// 子实体（按名称排序）；`parent_level` 是父实体所在层级
    pub fn children_of(&self, parent_level: GeoLevel, parent_id: &str) -> Vec<&GeographicEntity> {
        self.children
            .get(&(parent_level, parent_id.to_string()))
            .map(|list| list.iter().map(|index| &self.entities[*index]).collect())
            .unwrap_or_default()
    }

    pub fn zones(&self) -> Vec<&GeographicEntity> {
        self.zones.iter().map(|index| &self.entities[*index]).collect()
    }

    /// 祖先链：从实体自身一直到所属 Zone
    ///
    /// 目标不存在返回 NotFound；父指针悬空返回 DanglingParent（配置故障）。
    pub fn ancestor_chain(&self, level: GeoLevel, id: &str) -> Result<Vec<&GeographicEntity>, AppError> {
        let mut current = self.require(level, id)?;
        let mut chain = Vec::with_capacity(level.depth() + 1);
        chain.push(current);

        while let Some(parent_level) = current.level.parent() {
            let parent_id = current.parent_id.as_deref().ok_or_else(|| {
                AppError::InvalidGeography(format!(
                    "{} {} has no parent",
                    current.level, current.id
                ))
            })?;

            let parent = self
                .by_id(parent_level, parent_id)
                .ok_or_else(|| AppError::DanglingParent {
                    level: current.level,
                    id: current.id.clone(),
                    parent_id: parent_id.to_string(),
                })?;

            chain.push(parent);
            current = parent;
        }

        Ok(chain)
    }

    /// `ancestor_id` 是否出现在目标的祖先链上（包括目标自身）
    pub fn is_within(
        &self,
        target_level: GeoLevel,
        target_id: &str,
        ancestor_level: GeoLevel,
        ancestor_id: &str,
    ) -> Result<bool, AppError> {
        if ancestor_level.depth() > target_level.depth() {
            // 祖先层级比目标更深，但仍需确认目标存在
            self.ancestor_chain(target_level, target_id)?;
            return Ok(false);
        }
        let chain = self.ancestor_chain(target_level, target_id)?;
        Ok(chain
            .iter()
            .any(|e| e.level == ancestor_level && e.id == ancestor_id))
    }

    /// 写入时使用的完整祖先 ID 戳
    pub fn stamp(&self, level: GeoLevel, id: &str) -> Result<LocationStamp, AppError> {
        let mut stamp = LocationStamp::default();
        for entity in self.ancestor_chain(level, id)? {
            stamp.set(entity.level, Some(entity.id.clone()));
        }
        Ok(stamp)
    }

    /// 已存储的戳是否与当前目录一致
    pub fn is_stamp_consistent(&self, stamp: &LocationStamp) -> Result<bool, AppError> {
        let Some((level, id)) = stamp.deepest() else {
            return Ok(false);
        };
        Ok(self.stamp(level, id)? == *stamp)
    }

    /// 完整性校验，返回所有发现的问题
    pub fn validate_integrity(&self) -> Vec<AppError> {
        let mut problems = Vec::new();
        let mut seen: HashSet<(GeoLevel, &str)> = HashSet::new();

        for entity in &self.entities {
            if entity.id.trim().is_empty() {
                problems.push(AppError::InvalidGeography(format!(
                    "{} '{}' has an empty id",
                    entity.level, entity.name
                )));
            }
            if !seen.insert((entity.level, entity.id.as_str())) {
                problems.push(AppError::InvalidGeography(format!(
                    "duplicate {} id {}",
                    entity.level, entity.id
                )));
            }

            match (entity.level.parent(), entity.parent_id.as_deref()) {
                (None, Some(parent_id)) => problems.push(AppError::InvalidGeography(format!(
                    "zone {} must not have a parent (found {})",
                    entity.id, parent_id
                ))),
                (Some(_), None) => problems.push(AppError::InvalidGeography(format!(
                    "{} {} has no parent",
                    entity.level, entity.id
                ))),
                (Some(parent_level), Some(parent_id)) => {
                    if self.by_id(parent_level, parent_id).is_none() {
                        problems.push(AppError::DanglingParent {
                            level: entity.level,
                            id: entity.id.clone(),
                            parent_id: parent_id.to_string(),
                        });
                    }
                }
                (None, None) => {}
            }
        }

        problems
    }
}
