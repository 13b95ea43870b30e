use serde::Serialize;
use sqlx::{FromRow, PgPool};

#[derive(Debug, Serialize, FromRow)]
pub struct Stats {
    pub users: i64,
    pub farmers: i64,
    pub recruiters: i64,
    pub buyers: i64,
    pub suspended_users: i64,
    pub active_opportunities: i64,
    pub applications: i64,
    pub visible_threads: i64,
    pub active_products: i64,
    pub orders: i64,
}

pub async fn stats(db: &PgPool) -> sqlx::Result<Stats> {
    sqlx::query_as::<_, Stats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users)                                  AS users,
            (SELECT COUNT(*) FROM users WHERE role = 'farmer')            AS farmers,
            (SELECT COUNT(*) FROM users WHERE role = 'recruiter')         AS recruiters,
            (SELECT COUNT(*) FROM users WHERE role = 'buyer')             AS buyers,
            (SELECT COUNT(*) FROM users WHERE status = 'suspended')       AS suspended_users,
            (SELECT COUNT(*) FROM opportunities WHERE status = 'active')  AS active_opportunities,
            (SELECT COUNT(*) FROM job_applications)                       AS applications,
            (SELECT COUNT(*) FROM threads WHERE status = 'visible')       AS visible_threads,
            (SELECT COUNT(*) FROM products WHERE status = 'active')       AS active_products,
            (SELECT COUNT(*) FROM orders)                                 AS orders
        "#,
    )
    .fetch_one(db)
    .await
}
