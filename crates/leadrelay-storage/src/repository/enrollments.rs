//! Enrollment repository

use leadrelay_common::types::{CampaignId, LeadId};
use sqlx::PgPool;

use crate::models::Enrollment;

/// Enrollment repository
#[derive(Clone)]
pub struct EnrollmentRepository {
    pool: PgPool,
}

impl EnrollmentRepository {
    /// Create a new enrollment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get one lead's enrollment in a campaign
    pub async fn get(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> Result<Option<Enrollment>, sqlx::Error> {
        sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE campaign_id = $1 AND lead_id = $2",
        )
        .bind(campaign_id)
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List enrollments for a campaign
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Enrollment>, sqlx::Error> {
        sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT * FROM enrollments
            WHERE campaign_id = $1
            ORDER BY enrolled_at
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Cancel a lead's enrollment and skip its remaining pending messages.
    ///
    /// Both updates run in one transaction so the dispatcher never observes
    /// a cancelled enrollment with still-pending rows that outlive the next
    /// tick. Returns false if the enrollment was not active.
    pub async fn cancel(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE enrollments SET status = 'cancelled'
            WHERE campaign_id = $1 AND lead_id = $2 AND status = 'active'
            "#,
        )
        .bind(campaign_id)
        .bind(lead_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE scheduled_messages SET
                status = 'skipped',
                updated_at = NOW()
            WHERE campaign_id = $1 AND lead_id = $2 AND status = 'pending'
            "#,
        )
        .bind(campaign_id)
        .bind(lead_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Record one successful send against the enrollment and mark it
    /// completed when no pending or claimed messages remain for the lead.
    pub async fn record_sent(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> Result<Option<Enrollment>, sqlx::Error> {
        sqlx::query_as::<_, Enrollment>(
            r#"
            UPDATE enrollments SET
                messages_sent_count = messages_sent_count + 1,
                status = CASE
                    WHEN status = 'active' AND NOT EXISTS (
                        SELECT 1 FROM scheduled_messages m
                        WHERE m.campaign_id = $1 AND m.lead_id = $2
                          AND m.status IN ('pending', 'claimed')
                    ) THEN 'completed'
                    ELSE status
                END
            WHERE campaign_id = $1 AND lead_id = $2
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Mark an active enrollment completed once every one of its scheduled
    /// messages has reached a terminal state.
    ///
    /// `record_sent` covers the success path; this is the companion for
    /// messages whose last outstanding row ends in `failed` or `skipped`.
    /// Returns true if the enrollment was flipped.
    pub async fn complete_if_settled(
        &self,
        campaign_id: CampaignId,
        lead_id: LeadId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE enrollments SET status = 'completed'
            WHERE campaign_id = $1 AND lead_id = $2 AND status = 'active'
              AND NOT EXISTS (
                  SELECT 1 FROM scheduled_messages m
                  WHERE m.campaign_id = $1 AND m.lead_id = $2
                    AND m.status IN ('pending', 'claimed')
              )
            "#,
        )
        .bind(campaign_id)
        .bind(lead_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count enrollments for a campaign, optionally by status
    pub async fn count_by_campaign(
        &self,
        campaign_id: CampaignId,
        status: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = if let Some(status) = status {
            sqlx::query_as(
                "SELECT COUNT(*) FROM enrollments WHERE campaign_id = $1 AND status = $2",
            )
            .bind(campaign_id)
            .bind(status)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM enrollments WHERE campaign_id = $1")
                .bind(campaign_id)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count.0)
    }
}
