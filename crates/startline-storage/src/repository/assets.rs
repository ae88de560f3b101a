//! Org asset repositories
//!
//! Flows, channels, contacts, contact groups and contact fields are owned
//! by other parts of the system; this core only needs existence and
//! reference lookups plus the get-or-create paths imports use.

use chrono::Utc;
use sqlx::SqlitePool;
use startline_common::types::{
    ChannelId, ContactId, FieldId, FieldType, FlowId, GroupId, OrgId,
};
use uuid::Uuid;

use crate::models::{Channel, Contact, ContactField, ContactGroup, Flow};

/// Flow repository
#[derive(Clone)]
pub struct FlowRepository {
    pool: SqlitePool,
}

impl FlowRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, org_id: OrgId, name: &str) -> Result<Flow, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Flow>(
            r#"
            INSERT INTO flows (id, org_id, name, is_system, is_active, created_at, updated_at)
            VALUES (?, ?, ?, 0, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: FlowId) -> Result<Option<Flow>, sqlx::Error> {
        sqlx::query_as::<_, Flow>("SELECT * FROM flows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get an active, non-system flow belonging to the org, the reference
    /// check triggers and flow events use
    pub async fn get_active(&self, org_id: OrgId, id: FlowId) -> Result<Option<Flow>, sqlx::Error> {
        sqlx::query_as::<_, Flow>(
            "SELECT * FROM flows WHERE id = ? AND org_id = ? AND is_active = 1 AND is_system = 0",
        )
        .bind(id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Channel repository
#[derive(Clone)]
pub struct ChannelRepository {
    pool: SqlitePool,
}

impl ChannelRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, org_id: OrgId, name: &str) -> Result<Channel, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Channel>(
            r#"
            INSERT INTO channels (id, org_id, name, is_active, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: ChannelId) -> Result<Option<Channel>, sqlx::Error> {
        sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_active(
        &self,
        org_id: OrgId,
        id: ChannelId,
    ) -> Result<Option<Channel>, sqlx::Error> {
        sqlx::query_as::<_, Channel>(
            "SELECT * FROM channels WHERE id = ? AND org_id = ? AND is_active = 1",
        )
        .bind(id)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Contact repository
#[derive(Clone)]
pub struct ContactRepository {
    pool: SqlitePool,
}

impl ContactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        org_id: OrgId,
        name: Option<&str>,
        language: Option<&str>,
    ) -> Result<Contact, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (id, org_id, name, language, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(name)
        .bind(language)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: ContactId) -> Result<Option<Contact>, sqlx::Error> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn set_active(&self, id: ContactId, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE contacts SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Fetch the still-active subset of the given contacts
    pub async fn list_active_by_ids(
        &self,
        org_id: OrgId,
        ids: &[ContactId],
    ) -> Result<Vec<Contact>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM contacts WHERE org_id = ");
        qb.push_bind(org_id);
        qb.push(" AND is_active = 1 AND id IN (");
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(*id);
        }
        qb.push(")");

        qb.build_query_as().fetch_all(&self.pool).await
    }
}

/// Contact group repository
#[derive(Clone)]
pub struct ContactGroupRepository {
    pool: SqlitePool,
}

impl ContactGroupRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, org_id: OrgId, name: &str) -> Result<ContactGroup, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, ContactGroup>(
            r#"
            INSERT INTO contact_groups (id, org_id, name, is_active, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: GroupId) -> Result<Option<ContactGroup>, sqlx::Error> {
        sqlx::query_as::<_, ContactGroup>("SELECT * FROM contact_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_name(
        &self,
        org_id: OrgId,
        name: &str,
    ) -> Result<Option<ContactGroup>, sqlx::Error> {
        sqlx::query_as::<_, ContactGroup>(
            "SELECT * FROM contact_groups WHERE org_id = ? AND LOWER(name) = LOWER(?) AND is_active = 1",
        )
        .bind(org_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    /// Resolve a group by UUID, falling back to name, creating it when
    /// neither matches. The import path.
    pub async fn get_or_create(
        &self,
        org_id: OrgId,
        name: &str,
        uuid: Option<GroupId>,
    ) -> Result<ContactGroup, sqlx::Error> {
        if let Some(uuid) = uuid {
            if let Some(group) = self.get(uuid).await? {
                if group.org_id == org_id && group.is_active {
                    return Ok(group);
                }
            }
        }

        if let Some(group) = self.find_by_name(org_id, name).await? {
            return Ok(group);
        }

        self.create(org_id, name).await
    }
}

/// Contact field repository
#[derive(Clone)]
pub struct ContactFieldRepository {
    pool: SqlitePool,
}

impl ContactFieldRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        org_id: OrgId,
        key: &str,
        name: &str,
        value_type: FieldType,
    ) -> Result<ContactField, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, ContactField>(
            r#"
            INSERT INTO contact_fields (id, org_id, key, name, value_type, is_system, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(key)
        .bind(name)
        .bind(value_type.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: FieldId) -> Result<Option<ContactField>, sqlx::Error> {
        sqlx::query_as::<_, ContactField>("SELECT * FROM contact_fields WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_by_key(
        &self,
        org_id: OrgId,
        key: &str,
    ) -> Result<Option<ContactField>, sqlx::Error> {
        sqlx::query_as::<_, ContactField>(
            "SELECT * FROM contact_fields WHERE org_id = ? AND key = ?",
        )
        .bind(org_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
    }

    /// Resolve a field by key, creating it as a datetime field when
    /// missing. The campaign import path.
    pub async fn get_or_create_datetime(
        &self,
        org_id: OrgId,
        key: &str,
        name: &str,
    ) -> Result<ContactField, sqlx::Error> {
        if let Some(field) = self.find_by_key(org_id, key).await? {
            return Ok(field);
        }

        self.create(org_id, key, name, FieldType::Datetime).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabasePool;
    use pretty_assertions::assert_eq;

    async fn pool() -> SqlitePool {
        let db = DatabasePool::connect_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.pool().clone()
    }

    #[tokio::test]
    async fn test_contacts_active_filter() {
        let pool = pool().await;
        let repo = ContactRepository::new(pool);
        let org = Uuid::new_v4();

        let ann = repo.create(org, Some("Ann"), None).await.unwrap();
        let bob = repo.create(org, Some("Bob"), Some("spa")).await.unwrap();
        repo.set_active(bob.id, false).await.unwrap();

        let active = repo.list_active_by_ids(org, &[ann.id, bob.id]).await.unwrap();
        assert_eq!(1, active.len());
        assert_eq!(ann.id, active[0].id);

        let none = repo.list_active_by_ids(org, &[]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_group_get_or_create() {
        let pool = pool().await;
        let repo = ContactGroupRepository::new(pool);
        let org = Uuid::new_v4();

        let farmers = repo.create(org, "Farmers").await.unwrap();

        // by uuid
        let resolved = repo.get_or_create(org, "Renamed", Some(farmers.id)).await.unwrap();
        assert_eq!(farmers.id, resolved.id);

        // by name, case-insensitive
        let resolved = repo.get_or_create(org, "FARMERS", None).await.unwrap();
        assert_eq!(farmers.id, resolved.id);

        // created fresh
        let doctors = repo.get_or_create(org, "Doctors", None).await.unwrap();
        assert_ne!(farmers.id, doctors.id);

        // a uuid from another org falls back to name resolution
        let other_org = Uuid::new_v4();
        let resolved = repo.get_or_create(other_org, "Farmers", Some(farmers.id)).await.unwrap();
        assert_ne!(farmers.id, resolved.id);
        assert_eq!(other_org, resolved.org_id);
    }

    #[tokio::test]
    async fn test_field_get_or_create_datetime() {
        let pool = pool().await;
        let repo = ContactFieldRepository::new(pool);
        let org = Uuid::new_v4();

        let field = repo
            .get_or_create_datetime(org, "planting_date", "Planting Date")
            .await
            .unwrap();
        assert_eq!(Some(FieldType::Datetime), field.value_type_enum());

        let again = repo
            .get_or_create_datetime(org, "planting_date", "Other Label")
            .await
            .unwrap();
        assert_eq!(field.id, again.id);
    }
}
