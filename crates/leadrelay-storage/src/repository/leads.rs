//! Lead repository
//!
//! Read-only access to the lead store, used by the audience resolver and
//! the dispatcher (contact lookup). Lead CRUD itself belongs to the CRM
//! surface, not this engine.

use leadrelay_common::types::LeadId;
use sqlx::PgPool;

use crate::models::Lead;

/// Lead repository
#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    /// Create a new lead repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a lead by ID
    pub async fn get(&self, id: LeadId) -> Result<Option<Lead>, sqlx::Error> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// All lead IDs currently in the store
    pub async fn list_ids_all(&self) -> Result<Vec<LeadId>, sqlx::Error> {
        let rows: Vec<(LeadId,)> = sqlx::query_as("SELECT id FROM leads ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Lead IDs matching any of the given stages or any of the given sources
    /// (union semantics)
    pub async fn list_ids_matching(
        &self,
        stage_ids: &[String],
        source_ids: &[String],
    ) -> Result<Vec<LeadId>, sqlx::Error> {
        let rows: Vec<(LeadId,)> = sqlx::query_as(
            r#"
            SELECT id FROM leads
            WHERE stage_id = ANY($1) OR source_id = ANY($2)
            ORDER BY created_at
            "#,
        )
        .bind(stage_ids)
        .bind(source_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Count leads in the store
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leads")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
