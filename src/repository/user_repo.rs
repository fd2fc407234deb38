//! User repository (数据库访问层)

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::{
    auth::ActorStore,
    error::AppError,
    models::actor::UserRow,
    services::query_filter::Predicate,
};

pub struct UserRepository {
    db: PgPool,
}

impl UserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActorStore for UserRepository {
    /// 根据 ID 查找用户
    async fn find_user(&self, id: &str) -> Result<Option<UserRow>, AppError> {
        let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 按范围谓词列出用户
    async fn list_users(
        &self,
        predicate: &Predicate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserRow>, AppError> {
        let fragment = predicate.to_sql(1);
        let index = fragment.params.len();
        let query = format!(
            "SELECT * FROM users WHERE {} ORDER BY display_name, id LIMIT ${} OFFSET ${}",
            fragment.clause,
            index + 1,
            index + 2
        );

        let mut query_builder = sqlx::query_as::<_, UserRow>(&query);
        for param in &fragment.params {
            query_builder = query_builder.bind(param);
        }
        let users = query_builder
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;

        Ok(users)
    }

    async fn count_users(&self, predicate: &Predicate) -> Result<i64, AppError> {
        let fragment = predicate.to_sql(1);
        let query = format!("SELECT COUNT(*) FROM users WHERE {}", fragment.clause);

        let mut query_builder = sqlx::query(&query);
        for param in &fragment.params {
            query_builder = query_builder.bind(param);
        }
        let count: i64 = query_builder.fetch_one(&self.db).await?.get(0);

        Ok(count)
    }
}
