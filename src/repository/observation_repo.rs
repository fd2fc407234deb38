//! Observation repository

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::observation::{NewObservation, Observation, ObservationStatus},
    services::query_filter::Predicate,
};

pub struct ObservationRepository {
    db: PgPool,
}

impl ObservationRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 插入带位置戳的观察记录
    pub async fn insert(&self, new: &NewObservation) -> Result<Observation, AppError> {
        let observation = sqlx::query_as::<_, Observation>(
            r#"
            INSERT INTO observations (
                id, title, form_id, observer_id, teacher_id, status, notes,
                zone_id, province_id, department_id, cluster_id, school_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.form_id)
        .bind(&new.observer_id)
        .bind(&new.teacher_id)
        .bind(ObservationStatus::Draft.as_str())
        .bind(&new.notes)
        .bind(&new.location.zone_id)
        .bind(&new.location.province_id)
        .bind(&new.location.department_id)
        .bind(&new.location.cluster_id)
        .bind(&new.location.school_id)
        .fetch_one(&self.db)
        .await?;

        Ok(observation)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Observation>, AppError> {
        let observation = sqlx::query_as::<_, Observation>("SELECT * FROM observations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(observation)
    }

    /// 按谓词列出（谓词已包含范围限制）
    pub async fn list(
        &self,
        predicate: &Predicate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Observation>, AppError> {
        let fragment = predicate.to_sql(1);
        let index = fragment.params.len();
        let query = format!(
            "SELECT * FROM observations WHERE {} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            fragment.clause,
            index + 1,
            index + 2
        );

        let mut query_builder = sqlx::query_as::<_, Observation>(&query);
        for param in &fragment.params {
            query_builder = query_builder.bind(param);
        }
        let observations = query_builder
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;

        Ok(observations)
    }

    pub async fn count(&self, predicate: &Predicate) -> Result<i64, AppError> {
        let fragment = predicate.to_sql(1);
        let query = format!("SELECT COUNT(*) FROM observations WHERE {}", fragment.clause);

        let mut query_builder = sqlx::query(&query);
        for param in &fragment.params {
            query_builder = query_builder.bind(param);
        }
        let count: i64 = query_builder.fetch_one(&self.db).await?.get(0);

        Ok(count)
    }

    /// 状态流转；当前状态已被并发修改时返回 None
    pub async fn update_status(
        &self,
        id: Uuid,
        from: ObservationStatus,
        to: ObservationStatus,
        reviewed_by: Option<&str>,
        comment: Option<&str>,
    ) -> Result<Option<Observation>, AppError> {
        let observation = sqlx::query_as::<_, Observation>(
            r#"
            UPDATE observations
            SET
                status = $3,
                reviewed_by = COALESCE($4, reviewed_by),
                review_comment = COALESCE($5, review_comment),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(reviewed_by)
        .bind(comment)
        .fetch_optional(&self.db)
        .await?;

        Ok(observation)
    }
}
