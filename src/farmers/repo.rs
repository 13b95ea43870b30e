use serde::Serialize;
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Farmer profile joined with the owning user's public fields.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FarmerProfile {
    pub user_id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
    pub specialty: Option<String>,
    pub farm_name: Option<String>,
    pub location: Option<String>,
    pub rating: f64,
    pub reviews_count: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewer_name: String,
    pub rating: i32,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

const PROFILE_SELECT: &str = r#"
    SELECT f.user_id, u.name, u.avatar_url, f.specialty, f.farm_name, f.location,
           f.rating, f.reviews_count
      FROM farmers f
      JOIN users u ON u.id = f.user_id
"#;

pub async fn create_empty<'e, E: PgExecutor<'e>>(ex: E, user_id: Uuid) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO farmers (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn list(
    db: &PgPool,
    specialty: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<FarmerProfile>> {
    let sql = format!(
        r#"{PROFILE_SELECT}
         WHERE u.status = 'active'
           AND ($1::text IS NULL OR f.specialty ILIKE '%' || $1 || '%')
         ORDER BY f.rating DESC, f.reviews_count DESC, u.name ASC
         LIMIT $2 OFFSET $3
        "#
    );
    sqlx::query_as::<_, FarmerProfile>(&sql)
        .bind(specialty)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
}

pub async fn get<'e, E: PgExecutor<'e>>(ex: E, user_id: Uuid) -> sqlx::Result<Option<FarmerProfile>> {
    let sql = format!("{PROFILE_SELECT} WHERE f.user_id = $1 AND u.status = 'active'");
    sqlx::query_as::<_, FarmerProfile>(&sql)
        .bind(user_id)
        .fetch_optional(ex)
        .await
}

/// Row-locks an active farmer until the transaction ends, serializing reviews.
pub async fn lock_active<'e, E: PgExecutor<'e>>(ex: E, user_id: Uuid) -> sqlx::Result<bool> {
    let found = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT f.user_id
          FROM farmers f
          JOIN users u ON u.id = f.user_id
         WHERE f.user_id = $1 AND u.status = 'active'
           FOR UPDATE OF f
        "#,
    )
    .bind(user_id)
    .fetch_optional(ex)
    .await?;
    Ok(found.is_some())
}

pub async fn upsert(
    db: &PgPool,
    user_id: Uuid,
    specialty: Option<String>,
    farm_name: Option<String>,
    location: Option<String>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO farmers (user_id, specialty, farm_name, location)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO UPDATE
           SET specialty = COALESCE(EXCLUDED.specialty, farmers.specialty),
               farm_name = COALESCE(EXCLUDED.farm_name, farmers.farm_name),
               location = COALESCE(EXCLUDED.location, farmers.location),
               updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(specialty)
    .bind(farm_name)
    .bind(location)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn insert_review<'e, E: PgExecutor<'e>>(
    ex: E,
    farmer_id: Uuid,
    reviewer_id: Uuid,
    rating: i32,
    comment: Option<&str>,
) -> sqlx::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO farmer_reviews (farmer_id, reviewer_id, rating, comment)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(farmer_id)
    .bind(reviewer_id)
    .bind(rating)
    .bind(comment)
    .fetch_one(ex)
    .await
}

/// Recomputes `rating` as the mean of all reviews and `reviews_count` as their count.
pub async fn refresh_rating<'e, E: PgExecutor<'e>>(ex: E, farmer_id: Uuid) -> sqlx::Result<(f64, i32)> {
    sqlx::query_as::<_, (f64, i32)>(
        r#"
        UPDATE farmers f
           SET rating = COALESCE(s.avg_rating, 0),
               reviews_count = s.cnt,
               updated_at = now()
          FROM (SELECT AVG(rating)::float8 AS avg_rating, COUNT(*)::int4 AS cnt
                  FROM farmer_reviews
                 WHERE farmer_id = $1) s
         WHERE f.user_id = $1
        RETURNING f.rating, f.reviews_count
        "#,
    )
    .bind(farmer_id)
    .fetch_one(ex)
    .await
}

pub async fn list_reviews(
    db: &PgPool,
    farmer_id: Uuid,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Review>> {
    sqlx::query_as::<_, Review>(
        r#"
        SELECT r.id, r.farmer_id, r.reviewer_id, u.name AS reviewer_name,
               r.rating, r.comment, r.created_at
          FROM farmer_reviews r
          JOIN users u ON u.id = r.reviewer_id
         WHERE r.farmer_id = $1
         ORDER BY r.created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(farmer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}
