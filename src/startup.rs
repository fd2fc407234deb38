//! 启动时加载并校验参考数据
//! 任何参考数据问题都会中止启动

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        geography::{GeoLevel, GeographicEntity},
        role::{Role, RolePolicy},
    },
    repository::{GeographyRepository, RoleRepository},
    services::{GeographicEntityCatalog, RoleHierarchyRegistry},
    telemetry,
};

/// 已校验的参考数据
pub struct ReferenceData {
    pub registry: RoleHierarchyRegistry,
    pub catalog: GeographicEntityCatalog,
}

/// 从数据库加载角色策略和地理实体并构建参考数据
pub async fn load_reference_data(db: &PgPool) -> Result<ReferenceData, AppError> {
    let policies = RoleRepository::new(db.clone()).load_policies().await?;
    let entities = GeographyRepository::new(db.clone()).load_all().await?;
    build_reference_data(policies, entities)
}

/// 校验角色策略表和地理目录
pub fn build_reference_data(
    policies: Vec<RolePolicy>,
    entities: Vec<GeographicEntity>,
) -> Result<ReferenceData, AppError> {
    let registry = RoleHierarchyRegistry::new(policies).map_err(|e| {
        tracing::error!(error = %e, "Role policy table rejected");
        e
    })?;

    let catalog = GeographicEntityCatalog::from_entities(entities);
    let problems = catalog.validate_integrity();
    if !problems.is_empty() {
        for problem in &problems {
            tracing::error!(error = %problem, "Geography integrity check failed");
        }
        tracing::error!(count = problems.len(), "Geography reference data rejected");
        if let Some(first) = problems.into_iter().next() {
            return Err(first);
        }
    }

    if catalog.count_at(GeoLevel::Zone) == 0 {
        tracing::warn!("Geography catalog has no zones");
    }

    tracing::info!(
        zones = catalog.count_at(GeoLevel::Zone),
        provinces = catalog.count_at(GeoLevel::Province),
        departments = catalog.count_at(GeoLevel::Department),
        clusters = catalog.count_at(GeoLevel::Cluster),
        schools = catalog.count_at(GeoLevel::School),
        "Reference data loaded"
    );
    telemetry::record_reference_data(Role::ALL.len(), catalog.len());

    Ok(ReferenceData { registry, catalog })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policies() -> Vec<RolePolicy> {
        crate::services::role_registry::default_policies()
    }

    #[test]
    fn test_valid_reference_data() {
        let data = build_reference_data(policies(), vec![
            GeographicEntity::new(GeoLevel::Zone, "zone-001", "North", None),
            GeographicEntity::new(GeoLevel::Province, "province-001", "Alpha", Some("zone-001")),
        ])
        .unwrap();
        assert_eq!(data.catalog.len(), 2);
        assert!(data.registry.can_approve(Role::Zone).unwrap());
    }

    #[test]
    fn test_dangling_parent_aborts_startup() {
        let result = build_reference_data(policies(), vec![
            GeographicEntity::new(GeoLevel::Zone, "zone-001", "North", None),
            GeographicEntity::new(GeoLevel::Cluster, "cluster-001", "C1", Some("department-404")),
        ]);
        match result {
            Err(err) => assert!(err.is_configuration_fault()),
            Ok(_) => panic!("dangling parent accepted"),
        }
    }

    #[test]
    fn test_incomplete_role_table_aborts_startup() {
        let mut policies = policies();
        policies.retain(|p| p.role != Role::Director);
        let result = build_reference_data(
            policies,
            vec![GeographicEntity::new(GeoLevel::Zone, "zone-001", "North", None)],
        );
        match result {
            Err(err) => assert!(matches!(err, AppError::MissingRolePolicy(Role::Director))),
            Ok(_) => panic!("incomplete role table accepted"),
        }
    }
}
