//! 课堂观察服务
//! 写入时打位置戳，读取时由访问引擎和范围谓词强制可见性

use std::sync::Arc;

use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use super::{
    access_engine::AccessDecisionEngine,
    audit_service::{AuditAction, AuditService},
    query_filter::{Predicate, QueryFilterBuilder, OBSERVATION_COLUMNS},
};
use crate::{
    auth::ActorStore,
    error::AppError,
    models::{
        access::{AccessPolicy, RequestContext},
        actor::Actor,
        geography::GeoLevel,
        observation::{
            CreateObservationRequest, NewObservation, Observation, ObservationListFilters,
            ObservationPage, ObservationStatus, ReviewRequest,
        },
        role::Role,
    },
    repository::observation_repo::ObservationRepository,
};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

pub struct ObservationService {
    repo: ObservationRepository,
    actors: Arc<dyn ActorStore>,
    engine: Arc<AccessDecisionEngine>,
    audit: Arc<AuditService>,
    filters: QueryFilterBuilder,
}

impl ObservationService {
    pub fn new(
        db: PgPool,
        actors: Arc<dyn ActorStore>,
        engine: Arc<AccessDecisionEngine>,
        audit: Arc<AuditService>,
    ) -> Self {
        Self {
            repo: ObservationRepository::new(db),
            actors,
            engine,
            audit,
            filters: QueryFilterBuilder::new(),
        }
    }

    /// 创建观察记录
    ///
    /// 学校必须在操作者范围内；记录的完整祖先 ID 在写入时从目录生成。
    #[instrument(skip(self, actor, req), fields(actor_id = %actor.id))]
    pub async fn create(
        &self,
        actor: &Actor,
        req: CreateObservationRequest,
    ) -> Result<Observation, AppError> {
        req.validate()?;

        let new = self.prepare(actor, req).await?;
        let observation = self.repo.insert(&new).await?;

        tracing::info!(
            observation_id = %observation.id,
            observer_id = %actor.id,
            school_id = observation.school_id.as_deref().unwrap_or_default(),
            "Observation created"
        );
        self.audit
            .record_success(
                actor,
                AuditAction::ObservationCreate,
                OBSERVATION_COLUMNS.resource,
                &observation.id.to_string(),
            )
            .await;

        Ok(observation)
    }

    /// 校验范围、确定被观察教师并生成位置戳
    pub async fn prepare(
        &self,
        actor: &Actor,
        req: CreateObservationRequest,
    ) -> Result<NewObservation, AppError> {
        let catalog = self.engine.resolver().catalog();
        catalog.require(GeoLevel::School, &req.school_id)?;

        if !self
            .engine
            .resolver()
            .validate_containment(actor, GeoLevel::School, &req.school_id)?
        {
            tracing::warn!(
                actor_id = %actor.id,
                role = %actor.role,
                school_id = %req.school_id,
                "Observation school outside actor scope"
            );
            return Err(AppError::Forbidden);
        }

        let teacher_id = self
            .observed_teacher(actor, req.teacher_id.as_deref(), &req.school_id)
            .await?;
        let location = catalog.stamp(GeoLevel::School, &req.school_id)?;

        Ok(NewObservation {
            title: req.title,
            form_id: req.form_id,
            observer_id: actor.id.clone(),
            teacher_id,
            notes: req.notes,
            location,
        })
    }

    /// 被观察教师
    ///
    /// 教师只能为自己建记录；其他角色指定的教师必须存在且任教于该学校。
    async fn observed_teacher(
        &self,
        actor: &Actor,
        teacher_id: Option<&str>,
        school_id: &str,
    ) -> Result<Option<String>, AppError> {
        let teacher_id = teacher_id.map(str::trim).filter(|id| !id.is_empty());

        if actor.role == Role::Teacher {
            return match teacher_id {
                None => Ok(Some(actor.id.clone())),
                Some(id) if id == actor.id => Ok(Some(actor.id.clone())),
                Some(id) => {
                    tracing::warn!(
                        actor_id = %actor.id,
                        teacher_id = %id,
                        "Teacher attempted to create observation for another user"
                    );
                    Err(AppError::Forbidden)
                }
            };
        }

        let Some(id) = teacher_id else {
            return Ok(None);
        };

        let teacher = match self.actors.find_actor(id).await? {
            Some(teacher) if teacher.role == Role::Teacher => teacher,
            Some(_) | None => {
                return Err(AppError::validation("teacher_id must reference a teacher"));
            }
        };

        if !self
            .engine
            .resolver()
            .validate_containment(&teacher, GeoLevel::School, school_id)?
        {
            return Err(AppError::validation(
                "teacher_id must reference a teacher at the observed school",
            ));
        }

        Ok(Some(teacher.id))
    }

    #[instrument(skip(self, actor, filters), fields(actor_id = %actor.id))]
    pub async fn list(
        &self,
        actor: &Actor,
        filters: &ObservationListFilters,
    ) -> Result<ObservationPage, AppError> {
        let predicate = self
            .filters
            .scoped(actor, &OBSERVATION_COLUMNS, observation_filter_predicate(filters))?;

        let limit = filters.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = filters.offset.unwrap_or(0).max(0);

        let items = self.repo.list(&predicate, limit, offset).await?;
        let total = self.repo.count(&predicate).await?;

        Ok(ObservationPage {
            items,
            total,
            limit,
            offset,
        })
    }

    /// 查看单条记录：观察者/被观察教师本人，或学校位于范围内
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Observation, AppError> {
        let observation = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("observation"))?;

        self.authorize_view(actor, &observation)?;
        self.check_stamp(&observation);

        Ok(observation)
    }

    pub fn authorize_view(&self, actor: &Actor, observation: &Observation) -> Result<(), AppError> {
        let decision = self.engine.decide(
            Some(actor),
            Some(&observation_policy()),
            &observation_context(observation),
        )?;

        if !decision.is_allowed() {
            tracing::warn!(
                actor_id = %actor.id,
                role = %actor.role,
                observation_id = %observation.id,
                reason = decision.reason.as_str(),
                "Observation access denied"
            );
        }
        decision.into_result()
    }

    /// 提交：只有观察者本人
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn submit(&self, actor: &Actor, id: Uuid) -> Result<Observation, AppError> {
        let observation = self.get(actor, id).await?;
        if observation.observer_id != actor.id {
            return Err(AppError::Forbidden);
        }

        let updated = self
            .transition(&observation, ObservationStatus::Submitted, None, None)
            .await?;
        self.audit
            .record_success(
                actor,
                AuditAction::ObservationSubmit,
                OBSERVATION_COLUMNS.resource,
                &id.to_string(),
            )
            .await;
        Ok(updated)
    }

    /// 审批或驳回：需要审批权限且学校位于范围内
    #[instrument(skip(self, actor, req), fields(actor_id = %actor.id))]
    pub async fn review(
        &self,
        actor: &Actor,
        id: Uuid,
        approve: bool,
        req: ReviewRequest,
    ) -> Result<Observation, AppError> {
        req.validate()?;
        let observation = self.get(actor, id).await?;

        if !self
            .engine
            .can_approve_at(actor, observation.school_id.as_deref())?
        {
            tracing::warn!(
                actor_id = %actor.id,
                role = %actor.role,
                observation_id = %id,
                "Approval not permitted"
            );
            return Err(AppError::Forbidden);
        }

        let (next, action) = if approve {
            (ObservationStatus::Approved, AuditAction::ObservationApprove)
        } else {
            (ObservationStatus::Rejected, AuditAction::ObservationReject)
        };

        let updated = self
            .transition(&observation, next, Some(&actor.id), req.comment.as_deref())
            .await?;
        self.audit
            .record_success(actor, action, OBSERVATION_COLUMNS.resource, &id.to_string())
            .await;
        Ok(updated)
    }

    async fn transition(
        &self,
        observation: &Observation,
        next: ObservationStatus,
        reviewed_by: Option<&str>,
        comment: Option<&str>,
    ) -> Result<Observation, AppError> {
        let current = observation.status()?;
        if !current.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "Cannot move observation from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }

        self.repo
            .update_status(observation.id, current, next, reviewed_by, comment)
            .await?
            .ok_or_else(|| AppError::Conflict("Observation was modified concurrently".to_string()))
    }

    /// 位置戳与当前目录不一致时记录警告（参考数据在写入后发生了变化）
    fn check_stamp(&self, observation: &Observation) {
        let catalog = self.engine.resolver().catalog();
        match catalog.is_stamp_consistent(&observation.stamp()) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                observation_id = %observation.id,
                "Observation location stamp is stale"
            ),
            Err(e) => tracing::warn!(
                observation_id = %observation.id,
                error = %e,
                "Observation location stamp cannot be verified"
            ),
        }
    }
}

/// 单条观察记录的访问策略
pub fn observation_policy() -> AccessPolicy {
    AccessPolicy::new()
        .allow_self(&["observer_id", "teacher_id"])
        .scoped_to(GeoLevel::School, "school_id")
}

/// 从记录本身收集决策参数
pub fn observation_context(observation: &Observation) -> RequestContext {
    let mut ctx = RequestContext::new().with_param("observer_id", observation.observer_id.clone());
    if let Some(teacher_id) = &observation.teacher_id {
        ctx.insert("teacher_id", teacher_id.clone());
    }
    if let Some(school_id) = &observation.school_id {
        ctx.insert("school_id", school_id.clone());
    }
    ctx
}

/// 调用方过滤条件（与范围谓词 AND）
pub fn observation_filter_predicate(filters: &ObservationListFilters) -> Predicate {
    let mut predicates = Vec::new();

    if let Some(status) = filters.status {
        predicates.push(Predicate::eq("status", status.as_str()));
    }
    if let Some(teacher_id) = non_blank(&filters.teacher_id) {
        predicates.push(Predicate::eq("teacher_id", teacher_id));
    }
    for level in GeoLevel::ALL {
        let value = match level {
            GeoLevel::Zone => &filters.zone_id,
            GeoLevel::Province => &filters.province_id,
            GeoLevel::Department => &filters.department_id,
            GeoLevel::Cluster => &filters.cluster_id,
            GeoLevel::School => &filters.school_id,
        };
        if let (Some(id), Some(column)) = (non_blank(value), OBSERVATION_COLUMNS.column_for(level)) {
            predicates.push(Predicate::eq(column, id));
        }
    }
    if let Some(search) = non_blank(&filters.search) {
        predicates.push(Predicate::search(&["title", "notes"], search));
    }

    Predicate::all_of(predicates)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
