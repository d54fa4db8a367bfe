//! Database schema bootstrap, run once at startup

use sqlx::PgPool;
use tracing::info;

/// Table DDL. Stores and tags carry an internal serial id plus an external
/// UUID; the join table has its own UUID identity and a composite unique
/// constraint over (store, tag).
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stores (
        id BIGSERIAL PRIMARY KEY,
        store_id UUID NOT NULL UNIQUE,
        store_name VARCHAR(100) NOT NULL,
        address VARCHAR(100) NOT NULL,
        content VARCHAR(100) NOT NULL,
        lat DOUBLE PRECISION NOT NULL,
        lng DOUBLE PRECISION NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id BIGSERIAL PRIMARY KEY,
        tag_id UUID NOT NULL UNIQUE,
        tag_name VARCHAR(100) NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stores_tags (
        id BIGSERIAL PRIMARY KEY,
        stores_tags_id UUID NOT NULL UNIQUE,
        store_id BIGINT NOT NULL REFERENCES stores(id),
        tag_id BIGINT NOT NULL REFERENCES tags(id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        CONSTRAINT uq_store_tag UNIQUE (store_id, tag_id)
    )
    "#,
];

/// Create the tables when they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database schema ready");
    Ok(())
}
