//! Store repository - transactional SQL operations for stores, tags and links

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::geocode::{GeocodeError, GeocoderClient};
use crate::store::tags::{self, TagDiff};

/// Store row joined with its tag names
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreWithTags {
    pub store_id: Uuid,
    pub store_name: String,
    pub address: String,
    pub content: String,
    pub lat: f64,
    pub lng: f64,
    pub tags: Vec<String>,
}

/// Filters for `list`; both combine with AND
#[derive(Debug, Default)]
pub struct StoreFilter {
    /// Case-insensitive substring match on the store name
    pub name_pattern: Option<String>,
    /// Exact tag name the store must be linked to
    pub tag_name: Option<String>,
}

/// New store for insertion
#[derive(Debug)]
pub struct NewStore {
    pub store_name: String,
    pub address: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Partial store update; `None` fields stay untouched
#[derive(Debug, Default)]
pub struct StoreUpdate {
    pub store_name: Option<String>,
    pub address: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("store not found")]
    StoreNotFound,

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error("data integrity violation: {0}")]
    Integrity(sqlx::Error),

    #[error("database unavailable: {0}")]
    Unavailable(sqlx::Error),

    #[error("database schema error: {0}")]
    Schema(sqlx::Error),

    #[error("database error: {0}")]
    Other(sqlx::Error),
}

/// Classify a storage fault into exactly one taxonomy entry.
///
/// Constraint violations (SQLSTATE 23xxx) cover the concurrent tag-name
/// race: the losing transaction fails here and rolls back instead of
/// duplicating a dictionary row.
fn classify(err: sqlx::Error) -> RepoError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code();
            let code = code.as_deref().unwrap_or("");
            if code.starts_with("23") {
                RepoError::Integrity(err)
            } else if code.starts_with("42") {
                RepoError::Schema(err)
            } else {
                RepoError::Other(err)
            }
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => RepoError::Unavailable(err),
        sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. } => RepoError::Schema(err),
        _ => RepoError::Other(err),
    }
}

/// Select list shared by `list` and `get`: stores joined to their tag names,
/// aggregated per store with an empty array when none are linked.
const STORE_SELECT: &str = r#"
SELECT s.store_id, s.store_name, s.address, s.content, s.lat, s.lng,
       COALESCE(
           array_agg(t.tag_name ORDER BY t.tag_name)
               FILTER (WHERE t.tag_name IS NOT NULL),
           '{}'
       )::text[] AS tags
FROM stores s
LEFT JOIN stores_tags st ON st.store_id = s.id
LEFT JOIN tags t ON t.id = st.tag_id
"#;

/// Build the list query for the given filters.
fn build_list_query(filter: &StoreFilter) -> String {
    let mut conditions: Vec<String> = Vec::new();

    if filter.name_pattern.is_some() {
        conditions.push(format!("s.store_name ILIKE ${}", conditions.len() + 1));
    }
    if filter.tag_name.is_some() {
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM stores_tags st2 JOIN tags t2 ON t2.id = st2.tag_id \
             WHERE st2.store_id = s.id AND t2.tag_name = ${})",
            conditions.len() + 1
        ));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {} ", conditions.join(" AND "))
    };

    format!("{STORE_SELECT}{where_clause}GROUP BY s.id ORDER BY s.id")
}

fn row_to_store(row: &PgRow) -> StoreWithTags {
    StoreWithTags {
        store_id: row.get("store_id"),
        store_name: row.get("store_name"),
        address: row.get("address"),
        content: row.get("content"),
        lat: row.get("lat"),
        lng: row.get("lng"),
        tags: row.get("tags"),
    }
}

/// Store repository over a Postgres pool.
///
/// Every write operation runs inside a single transaction; geocoding happens
/// before the transaction opens so an upstream failure can never leave one
/// dangling.
#[derive(Clone)]
pub struct StoreRepository {
    pool: PgPool,
    geocoder: GeocoderClient,
}

impl StoreRepository {
    pub fn new(pool: PgPool, geocoder: GeocoderClient) -> Self {
        Self { pool, geocoder }
    }

    /// List stores with their tag names, optionally filtered.
    pub async fn list(&self, filter: &StoreFilter) -> Result<Vec<StoreWithTags>, RepoError> {
        let query = build_list_query(filter);

        let mut q = sqlx::query(&query);
        if let Some(ref pattern) = filter.name_pattern {
            q = q.bind(format!("%{}%", pattern));
        }
        if let Some(ref tag_name) = filter.tag_name {
            q = q.bind(tag_name);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(classify)?;

        Ok(rows.iter().map(row_to_store).collect())
    }

    /// Get one store with its tag names by external id.
    pub async fn get(&self, store_id: Uuid) -> Result<StoreWithTags, RepoError> {
        let query = format!("{STORE_SELECT}WHERE s.store_id = $1 GROUP BY s.id");

        let row = sqlx::query(&query)
            .bind(store_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;

        row.as_ref()
            .map(row_to_store)
            .ok_or(RepoError::StoreNotFound)
    }

    /// Create a store with its tag links; returns the new external id.
    pub async fn create(&self, new_store: NewStore) -> Result<Uuid, RepoError> {
        let coords = self.geocoder.lookup(&new_store.address).await?;

        let mut tx = self.pool.begin().await.map_err(classify)?;

        let store_id = Uuid::new_v4();
        let row_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO stores (store_id, store_name, address, content, lat, lng)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(store_id)
        .bind(&new_store.store_name)
        .bind(&new_store.address)
        .bind(&new_store.content)
        .bind(coords.lat)
        .bind(coords.lng)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        info!(
            "store created: store_id={}, name={}",
            store_id, new_store.store_name
        );

        let diff = tags::diff_tags(&BTreeMap::new(), &new_store.tags);
        self.apply_tag_diff(&mut tx, row_id, diff).await?;

        tx.commit().await.map_err(classify)?;

        Ok(store_id)
    }

    /// Update the provided fields of a store; reconciles tag links when a
    /// target tag set is given.
    pub async fn update(&self, store_id: Uuid, update: StoreUpdate) -> Result<(), RepoError> {
        // Address changes re-run geocoding and refresh both coordinates
        let coords = match update.address {
            Some(ref address) => Some(self.geocoder.lookup(address).await?),
            None => None,
        };

        let mut tx = self.pool.begin().await.map_err(classify)?;

        let row_id = self.resolve(&mut tx, store_id).await?;

        let mut updates = vec!["updated_at = $1".to_string()];
        let mut param_idx = 2;

        if update.store_name.is_some() {
            updates.push(format!("store_name = ${}", param_idx));
            param_idx += 1;
        }
        if update.address.is_some() {
            updates.push(format!("address = ${}", param_idx));
            updates.push(format!("lat = ${}", param_idx + 1));
            updates.push(format!("lng = ${}", param_idx + 2));
            param_idx += 3;
        }
        if update.content.is_some() {
            updates.push(format!("content = ${}", param_idx));
            param_idx += 1;
        }

        let query = format!(
            "UPDATE stores SET {} WHERE id = ${}",
            updates.join(", "),
            param_idx
        );

        let mut q = sqlx::query(&query).bind(Utc::now());

        if let Some(ref v) = update.store_name {
            q = q.bind(v);
        }
        if let Some(ref v) = update.address {
            q = q.bind(v);
        }
        if let Some(c) = coords {
            q = q.bind(c.lat).bind(c.lng);
        }
        if let Some(ref v) = update.content {
            q = q.bind(v);
        }

        q.bind(row_id)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        if let Some(ref target) = update.tags {
            let current = current_tags(&mut tx, row_id).await?;
            let diff = tags::diff_tags(&current, target);
            self.apply_tag_diff(&mut tx, row_id, diff).await?;
        }

        tx.commit().await.map_err(classify)?;

        info!("store updated: store_id={}", store_id);
        Ok(())
    }

    /// Delete a store and all of its tag links.
    pub async fn delete(&self, store_id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        let row_id = self.resolve(&mut tx, store_id).await?;

        // Links first, so no dangling join rows survive
        sqlx::query("DELETE FROM stores_tags WHERE store_id = $1")
            .bind(row_id)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        sqlx::query("DELETE FROM stores WHERE id = $1")
            .bind(row_id)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        tx.commit().await.map_err(classify)?;

        info!("store deleted: store_id={}", store_id);
        Ok(())
    }

    /// Resolve an external store id to its internal row id, before any write.
    async fn resolve(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        store_id: Uuid,
    ) -> Result<i64, RepoError> {
        sqlx::query_scalar("SELECT id FROM stores WHERE store_id = $1")
            .bind(store_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(classify)?
            .ok_or(RepoError::StoreNotFound)
    }

    /// Apply a tag diff inside the operation's transaction: drop stale links,
    /// insert missing dictionary rows, then link every added name.
    async fn apply_tag_diff(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        store_row_id: i64,
        diff: TagDiff,
    ) -> Result<(), RepoError> {
        if diff.is_empty() {
            return Ok(());
        }

        for link_id in &diff.to_remove {
            sqlx::query("DELETE FROM stores_tags WHERE stores_tags_id = $1")
                .bind(link_id)
                .execute(&mut **tx)
                .await
                .map_err(classify)?;
        }

        if diff.to_add.is_empty() {
            return Ok(());
        }

        // Existing dictionary rows for the names being linked
        let rows = sqlx::query("SELECT id, tag_name FROM tags WHERE tag_name = ANY($1)")
            .bind(&diff.to_add)
            .fetch_all(&mut **tx)
            .await
            .map_err(classify)?;

        let mut tag_row_ids: BTreeMap<String, i64> = rows
            .into_iter()
            .map(|row| (row.get("tag_name"), row.get("id")))
            .collect();

        // Names with no dictionary row yet are inserted first
        for name in &diff.to_add {
            if !tag_row_ids.contains_key(name) {
                let tag_row_id: i64 = sqlx::query_scalar(
                    "INSERT INTO tags (tag_id, tag_name) VALUES ($1, $2) RETURNING id",
                )
                .bind(Uuid::new_v4())
                .bind(name)
                .fetch_one(&mut **tx)
                .await
                .map_err(classify)?;

                debug!("tag created: {}", name);
                tag_row_ids.insert(name.clone(), tag_row_id);
            }
        }

        // One link row per added name, pre-existing or fresh
        for (name, tag_row_id) in &tag_row_ids {
            sqlx::query(
                "INSERT INTO stores_tags (stores_tags_id, store_id, tag_id) VALUES ($1, $2, $3)",
            )
            .bind(Uuid::new_v4())
            .bind(store_row_id)
            .bind(tag_row_id)
            .execute(&mut **tx)
            .await
            .map_err(classify)?;

            debug!("store {} linked to tag {}", store_row_id, name);
        }

        Ok(())
    }
}

/// Current links for a store as tag name to join-row id.
async fn current_tags(
    tx: &mut Transaction<'_, Postgres>,
    store_row_id: i64,
) -> Result<BTreeMap<String, Uuid>, RepoError> {
    let rows = sqlx::query(
        r#"
        SELECT t.tag_name, st.stores_tags_id
        FROM stores_tags st
        JOIN tags t ON t.id = st.tag_id
        WHERE st.store_id = $1
        "#,
    )
    .bind(store_row_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(classify)?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("tag_name"), row.get("stores_tags_id")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_list_query_binds_nothing() {
        let query = build_list_query(&StoreFilter::default());

        assert!(!query.contains("$1"));
        assert!(query.contains("GROUP BY s.id ORDER BY s.id"));
    }

    #[test]
    fn name_filter_binds_first_parameter() {
        let filter = StoreFilter {
            name_pattern: Some("store1".to_string()),
            tag_name: None,
        };

        let query = build_list_query(&filter);

        assert!(query.contains("s.store_name ILIKE $1"));
        assert!(!query.contains("$2"));
    }

    #[test]
    fn combined_filters_bind_in_order() {
        let filter = StoreFilter {
            name_pattern: Some("store1".to_string()),
            tag_name: Some("タグ1".to_string()),
        };

        let query = build_list_query(&filter);

        assert!(query.contains("s.store_name ILIKE $1"));
        assert!(query.contains("t2.tag_name = $2"));
        assert!(query.contains(" AND "));
    }

    #[test]
    fn tag_filter_alone_binds_first_parameter() {
        let filter = StoreFilter {
            name_pattern: None,
            tag_name: Some("タグ1".to_string()),
        };

        let query = build_list_query(&filter);

        assert!(query.contains("t2.tag_name = $1"));
    }

    #[test]
    fn pool_faults_classify_as_unavailable() {
        assert!(matches!(
            classify(sqlx::Error::PoolTimedOut),
            RepoError::Unavailable(_)
        ));
        assert!(matches!(
            classify(sqlx::Error::PoolClosed),
            RepoError::Unavailable(_)
        ));
    }

    #[test]
    fn column_faults_classify_as_schema() {
        assert!(matches!(
            classify(sqlx::Error::ColumnNotFound("tags".to_string())),
            RepoError::Schema(_)
        ));
    }

    #[test]
    fn unknown_faults_classify_as_other() {
        assert!(matches!(
            classify(sqlx::Error::RowNotFound),
            RepoError::Other(_)
        ));
        assert!(matches!(
            classify(sqlx::Error::Protocol("boom".to_string())),
            RepoError::Other(_)
        ));
    }
}
