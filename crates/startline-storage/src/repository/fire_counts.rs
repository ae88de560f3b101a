//! Fire count repository
//!
//! Counts are additive rows keyed by an `(org, scope)` pair where scope is
//! `campfires:{event_id}:{fire_version}`. Writers insert rows, readers sum
//! them, and a periodic squash folds the rows of a scope into one. Rows
//! under a superseded fire version are never read again and stay orphaned
//! until the next reschedule deletes the whole prefix.

use sqlx::SqlitePool;
use startline_common::types::OrgId;
use std::collections::HashMap;

/// Fire count repository
#[derive(Clone)]
pub struct FireCountRepository {
    pool: SqlitePool,
}

impl FireCountRepository {
    /// Create a new fire count repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an additive count row. Commutative, safe for concurrent
    /// writers without locking.
    pub async fn incr(&self, org_id: OrgId, scope: &str, count: i64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO fire_counts (org_id, scope, count) VALUES (?, ?, ?)")
            .bind(org_id)
            .bind(scope)
            .bind(count)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Sum the rows of an exact scope
    pub async fn sum(&self, org_id: OrgId, scope: &str) -> Result<i64, sqlx::Error> {
        let total: (Option<i64>,) = sqlx::query_as(
            "SELECT SUM(count) FROM fire_counts WHERE org_id = ? AND scope = ?",
        )
        .bind(org_id)
        .bind(scope)
        .fetch_one(&self.pool)
        .await?;
        Ok(total.0.unwrap_or(0))
    }

    /// Bulk sum a set of scopes, keyed by scope
    pub async fn prefetch(
        &self,
        org_id: OrgId,
        scopes: &[String],
    ) -> Result<HashMap<String, i64>, sqlx::Error> {
        if scopes.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb = sqlx::QueryBuilder::new(
            "SELECT scope, SUM(count) FROM fire_counts WHERE org_id = ",
        );
        qb.push_bind(org_id);
        qb.push(" AND scope IN (");
        let mut sep = qb.separated(", ");
        for scope in scopes {
            sep.push_bind(scope);
        }
        qb.push(") GROUP BY scope");

        let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows.into_iter().collect())
    }

    /// Delete every row whose scope starts with the given prefix
    pub async fn delete_prefix(&self, org_id: OrgId, prefix: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM fire_counts WHERE org_id = ? AND scope LIKE ? || '%'")
            .bind(org_id)
            .bind(prefix)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Fold all rows of a scope into a single summed row. Idempotent and
    /// order-independent, intended for a periodic compaction pass.
    pub async fn squash(&self, org_id: OrgId, scope: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let total: (Option<i64>,) = sqlx::query_as(
            "SELECT SUM(count) FROM fire_counts WHERE org_id = ? AND scope = ?",
        )
        .bind(org_id)
        .bind(scope)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM fire_counts WHERE org_id = ? AND scope = ?")
            .bind(org_id)
            .bind(scope)
            .execute(&mut *tx)
            .await?;

        if let Some(total) = total.0.filter(|t| *t != 0) {
            sqlx::query("INSERT INTO fire_counts (org_id, scope, count) VALUES (?, ?, ?)")
                .bind(org_id)
                .bind(scope)
                .bind(total)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Number of rows backing a scope, used to verify squashing
    pub async fn row_count(&self, org_id: OrgId, scope: &str) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM fire_counts WHERE org_id = ? AND scope = ?",
        )
        .bind(org_id)
        .bind(scope)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }
}
