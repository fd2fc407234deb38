//! 用户来源抽象
//! 核心只依赖这个窄接口，具体存储由 repository 提供

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::actor::{Actor, UserRow},
    services::query_filter::Predicate,
};

#[async_trait]
pub trait ActorStore: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<UserRow>, AppError>;

    /// `predicate` 已包含范围限制
    async fn list_users(
        &self,
        predicate: &Predicate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserRow>, AppError>;

    async fn count_users(&self, predicate: &Predicate) -> Result<i64, AppError>;

    /// 加载已认证用户；未知角色属于配置故障
    async fn find_actor(&self, id: &str) -> Result<Option<Actor>, AppError> {
        match self.find_user(id).await? {
            Some(row) => Ok(Some(Actor::try_from(&row)?)),
            None => Ok(None),
        }
    }
}
