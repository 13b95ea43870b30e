use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::services::{ApplicationStatus, OpportunityStatus};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Opportunity {
    pub id: Uuid,
    pub recruiter_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub required_skills: Vec<String>,
    pub wage: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deadline: Option<OffsetDateTime>,
    #[sqlx(try_from = "String")]
    pub status: OpportunityStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Application joined with posting title and applicant name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ApplicationDetail {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    pub opportunity_title: String,
    pub worker_id: Uuid,
    pub worker_name: String,
    pub cover_letter: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub struct NewOpportunity {
    pub recruiter_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub required_skills: Vec<String>,
    pub wage: Option<String>,
    pub deadline: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
pub struct OpportunityChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub required_skills: Option<Vec<String>>,
    pub wage: Option<String>,
    pub deadline: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
pub struct OpportunitySearch {
    pub q: Option<String>,
    pub skill: Option<String>,
    pub location: Option<String>,
}

const APPLICATION_SELECT: &str = r#"
    SELECT a.id, a.opportunity_id, o.title AS opportunity_title,
           a.worker_id, u.name AS worker_name, a.cover_letter, a.status,
           a.created_at, a.updated_at
      FROM job_applications a
      JOIN opportunities o ON o.id = a.opportunity_id
      JOIN users u ON u.id = a.worker_id
"#;

pub async fn list_active(
    db: &PgPool,
    s: &OpportunitySearch,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Opportunity>> {
    sqlx::query_as::<_, Opportunity>(
        r#"
        SELECT * FROM opportunities
         WHERE status = 'active'
           AND ($1::text IS NULL OR title ILIKE '%' || $1 || '%' OR description ILIKE '%' || $1 || '%')
           AND ($2::text IS NULL OR $2 = ANY(required_skills))
           AND ($3::text IS NULL OR location ILIKE '%' || $3 || '%')
         ORDER BY created_at DESC
         LIMIT $4 OFFSET $5
        "#,
    )
    .bind(s.q.as_deref())
    .bind(s.skill.as_deref())
    .bind(s.location.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn list_by_recruiter(
    db: &PgPool,
    recruiter_id: Uuid,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Opportunity>> {
    sqlx::query_as::<_, Opportunity>(
        r#"
        SELECT * FROM opportunities
         WHERE recruiter_id = $1
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(recruiter_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn get(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Opportunity>> {
    sqlx::query_as::<_, Opportunity>("SELECT * FROM opportunities WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create(db: &PgPool, new: NewOpportunity) -> sqlx::Result<Opportunity> {
    sqlx::query_as::<_, Opportunity>(
        r#"
        INSERT INTO opportunities
            (recruiter_id, title, description, location, required_skills, wage, deadline)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(new.recruiter_id)
    .bind(new.title)
    .bind(new.description)
    .bind(new.location)
    .bind(new.required_skills)
    .bind(new.wage)
    .bind(new.deadline)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: Uuid, c: OpportunityChanges) -> sqlx::Result<Opportunity> {
    sqlx::query_as::<_, Opportunity>(
        r#"
        UPDATE opportunities
           SET title = COALESCE($2, title),
               description = COALESCE($3, description),
               location = COALESCE($4, location),
               required_skills = COALESCE($5, required_skills),
               wage = COALESCE($6, wage),
               deadline = COALESCE($7, deadline),
               updated_at = now()
         WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(c.title)
    .bind(c.description)
    .bind(c.location)
    .bind(c.required_skills)
    .bind(c.wage)
    .bind(c.deadline)
    .fetch_one(db)
    .await
}

pub async fn set_status(db: &PgPool, id: Uuid, status: OpportunityStatus) -> sqlx::Result<Opportunity> {
    sqlx::query_as::<_, Opportunity>(
        "UPDATE opportunities SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_one(db)
    .await
}

/// Owner-side status change. Leaves moderated (hidden) postings untouched
/// and returns `None` for them.
pub async fn set_status_unless_hidden(
    db: &PgPool,
    id: Uuid,
    status: OpportunityStatus,
) -> sqlx::Result<Option<Opportunity>> {
    sqlx::query_as::<_, Opportunity>(
        r#"
        UPDATE opportunities SET status = $2, updated_at = now()
         WHERE id = $1 AND status <> 'hidden'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(db)
    .await
}

pub async fn insert_application(
    db: &PgPool,
    opportunity_id: Uuid,
    worker_id: Uuid,
    cover_letter: Option<&str>,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO job_applications (opportunity_id, worker_id, cover_letter)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(opportunity_id)
    .bind(worker_id)
    .bind(cover_letter)
    .fetch_one(db)
    .await
}

pub async fn get_application(db: &PgPool, id: Uuid) -> sqlx::Result<Option<ApplicationDetail>> {
    let sql = format!("{APPLICATION_SELECT} WHERE a.id = $1");
    sqlx::query_as::<_, ApplicationDetail>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list_applications(
    db: &PgPool,
    opportunity_id: Uuid,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<ApplicationDetail>> {
    let sql = format!(
        "{APPLICATION_SELECT} WHERE a.opportunity_id = $1 ORDER BY a.created_at ASC LIMIT $2 OFFSET $3"
    );
    sqlx::query_as::<_, ApplicationDetail>(&sql)
        .bind(opportunity_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
}

pub async fn list_for_worker(
    db: &PgPool,
    worker_id: Uuid,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<ApplicationDetail>> {
    let sql = format!(
        "{APPLICATION_SELECT} WHERE a.worker_id = $1 ORDER BY a.created_at DESC LIMIT $2 OFFSET $3"
    );
    sqlx::query_as::<_, ApplicationDetail>(&sql)
        .bind(worker_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
}

/// Recruiter decision; a withdrawn application is never overwritten.
pub async fn decide_application(
    db: &PgPool,
    id: Uuid,
    status: ApplicationStatus,
) -> sqlx::Result<bool> {
    let res = sqlx::query(
        r#"
        UPDATE job_applications SET status = $2, updated_at = now()
         WHERE id = $1 AND status <> 'withdrawn'
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .execute(db)
    .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn set_application_status(
    db: &PgPool,
    id: Uuid,
    status: ApplicationStatus,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE job_applications SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(db)
        .await?;
    Ok(())
}
