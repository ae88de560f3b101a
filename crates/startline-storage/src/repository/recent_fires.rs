//! Recent fire repository
//!
//! A per-event recency index written by the execution engine as contacts
//! fire. Members are `{disambiguator}|{contact_id}` strings so the same
//! contact can appear more than once across fires.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use startline_common::types::EventId;

use crate::models::RecentFire;

/// Recent fire repository
#[derive(Clone)]
pub struct RecentFireRepository {
    pool: SqlitePool,
}

impl RecentFireRepository {
    /// Create a new recent fire repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a fire, the external engine's write path
    pub async fn add(
        &self,
        event_id: EventId,
        member: &str,
        fired_on: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO recent_fires (event_id, member, fired_on) VALUES (?, ?, ?)")
            .bind(event_id)
            .bind(member)
            .bind(fired_on)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List an event's fires, most recent first
    pub async fn list_desc(&self, event_id: EventId) -> Result<Vec<RecentFire>, sqlx::Error> {
        sqlx::query_as::<_, RecentFire>(
            r#"
            SELECT * FROM recent_fires
            WHERE event_id = ?
            ORDER BY fired_on DESC, id DESC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabasePool;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_add_and_list_desc() {
        let db = DatabasePool::connect_memory().await.unwrap();
        db.migrate().await.unwrap();
        let repo = RecentFireRepository::new(db.pool().clone());

        let event1 = Uuid::now_v7();
        let event2 = Uuid::now_v7();
        let t1 = Utc.with_ymd_and_hms(2021, 12, 12, 19, 49, 14).unwrap();
        let t2 = Utc.with_ymd_and_hms(2021, 12, 12, 19, 49, 15).unwrap();
        let t3 = Utc.with_ymd_and_hms(2021, 12, 12, 19, 49, 21).unwrap();

        repo.add(event1, "a|c1", t1).await.unwrap();
        repo.add(event1, "b|c2", t2).await.unwrap();
        repo.add(event2, "c|c1", t3).await.unwrap();

        let fires = repo.list_desc(event1).await.unwrap();
        assert_eq!(
            vec![("b|c2".to_string(), t2), ("a|c1".to_string(), t1)],
            fires.into_iter().map(|f| (f.member, f.fired_on)).collect::<Vec<_>>()
        );

        let fires = repo.list_desc(event2).await.unwrap();
        assert_eq!(1, fires.len());
        assert_eq!("c|c1", fires[0].member);
    }
}
