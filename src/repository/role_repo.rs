//! Role policy repository

use crate::{
    error::AppError,
    models::role::{RolePolicy, RolePolicyRow},
};
use sqlx::PgPool;

pub struct RoleRepository {
    db: PgPool,
}

impl RoleRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 加载全部角色策略；未知角色名属于配置故障
    pub async fn load_policies(&self) -> Result<Vec<RolePolicy>, AppError> {
        let rows = sqlx::query_as::<_, RolePolicyRow>(
            r#"
            SELECT role, managed_roles, view_scope_label, can_approve, notes
            FROM role_policies
            ORDER BY role
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(RolePolicy::try_from).collect()
    }
}
