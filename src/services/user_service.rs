//! 用户查询服务
//! 列表按范围谓词过滤，单个用户按本人访问或管理关系判定

use std::sync::Arc;

use tracing::instrument;

use crate::{
    auth::ActorStore,
    error::AppError,
    models::{
        actor::{Actor, UserListFilters, UserResponse},
        geography::GeoLevel,
    },
};

use super::{
    access_engine::AccessDecisionEngine,
    query_filter::{Predicate, QueryFilterBuilder, USER_COLUMNS},
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

pub struct UserService {
    store: Arc<dyn ActorStore>,
    engine: Arc<AccessDecisionEngine>,
    filters: QueryFilterBuilder,
}

impl UserService {
    pub fn new(store: Arc<dyn ActorStore>, engine: Arc<AccessDecisionEngine>) -> Self {
        Self {
            store,
            engine,
            filters: QueryFilterBuilder::new(),
        }
    }

    /// 列出操作者范围内的用户
    #[instrument(skip(self, actor, filters), fields(actor_id = %actor.id))]
    pub async fn list_users(
        &self,
        actor: &Actor,
        filters: &UserListFilters,
    ) -> Result<(Vec<UserResponse>, i64), AppError> {
        let predicate = self
            .filters
            .scoped(actor, &USER_COLUMNS, user_filter_predicate(filters))?;

        let limit = filters.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = filters.offset.unwrap_or(0).max(0);

        let rows = self.store.list_users(&predicate, limit, offset).await?;
        let total = self.store.count_users(&predicate).await?;

        let users = rows
            .into_iter()
            .map(UserResponse::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((users, total))
    }

    /// 查看单个用户：本人、管理员或有管理关系的上级
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn get_user(&self, actor: &Actor, user_id: &str) -> Result<UserResponse, AppError> {
        let row = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        if actor.id != row.id {
            let target = Actor::try_from(&row)?;
            if !self.engine.can_manage_user(actor, &target)? {
                tracing::warn!(
                    actor_id = %actor.id,
                    role = %actor.role,
                    target_id = %target.id,
                    target_role = %target.role,
                    "User lookup outside managed scope"
                );
                return Err(AppError::Forbidden);
            }
        }

        UserResponse::try_from(row)
    }
}

/// 调用方过滤条件
pub fn user_filter_predicate(filters: &UserListFilters) -> Predicate {
    let mut predicates = Vec::new();

    if let Some(role) = filters.role {
        predicates.push(Predicate::eq("role", role.as_str()));
    }
    if let Some(status) = non_blank(&filters.status) {
        predicates.push(Predicate::eq("status", status));
    }
    if let Some(school_id) = non_blank(&filters.school_id) {
        predicates.push(Predicate::eq(GeoLevel::School.id_column(), school_id));
    }
    if let Some(search) = non_blank(&filters.search) {
        predicates.push(Predicate::search(&["display_name", "id"], search));
    }

    Predicate::all_of(predicates)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
