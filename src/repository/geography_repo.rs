//! Geography repository (地理参考数据)

use crate::{
    error::AppError,
    models::geography::{GeographicEntity, GeographicEntityRow},
};
use sqlx::PgPool;

pub struct GeographyRepository {
    db: PgPool,
}

impl GeographyRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 加载全部地理实体（启动时一次性加载）
    pub async fn load_all(&self) -> Result<Vec<GeographicEntity>, AppError> {
        let rows = sqlx::query_as::<_, GeographicEntityRow>(
            r#"
            SELECT id, name, localized_name, level, parent_id
            FROM geographic_entities
            ORDER BY level, name, id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(GeographicEntity::try_from).collect()
    }
}
