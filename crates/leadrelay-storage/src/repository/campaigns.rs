//! Campaign repository

use chrono::Utc;
use leadrelay_common::types::CampaignId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Campaign, CampaignStatus, CampaignTemplate, CreateCampaign, CreateEnrollment,
    CreateScheduledMessage, CreateTemplate,
};

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a campaign together with its templates, enrollments, and
    /// scheduled messages in a single transaction.
    ///
    /// Either the full cross-product lands or none of it does; a failure
    /// partway through rolls everything back so no half-enrolled campaign
    /// is ever visible.
    pub async fn create_full(
        &self,
        id: CampaignId,
        input: CreateCampaign,
        templates: Vec<CreateTemplate>,
        enrollments: Vec<CreateEnrollment>,
        messages: Vec<CreateScheduledMessage>,
    ) -> Result<Campaign, sqlx::Error> {
        let audience_rule =
            serde_json::to_value(&input.audience_rule).unwrap_or_else(|_| serde_json::json!({}));
        let total_enrolled = enrollments.len() as i32;

        let mut tx = self.pool.begin().await?;

        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, name, channel, audience_rule, schedule_mode, duration_days,
                message_limit, send_time, send_on_weekends, total_enrolled
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.channel.to_string())
        .bind(&audience_rule)
        .bind(input.schedule_mode.to_string())
        .bind(input.duration_days)
        .bind(input.message_limit)
        .bind(input.send_time)
        .bind(input.send_on_weekends)
        .bind(total_enrolled)
        .fetch_one(&mut *tx)
        .await?;

        for t in &templates {
            sqlx::query(
                r#"
                INSERT INTO campaign_templates (
                    campaign_id, template_id, template_name, sequence_order, custom_date
                )
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id)
            .bind(&t.template_id)
            .bind(&t.template_name)
            .bind(t.sequence_order)
            .bind(t.custom_date)
            .execute(&mut *tx)
            .await?;
        }

        for e in &enrollments {
            sqlx::query(
                "INSERT INTO enrollments (id, campaign_id, lead_id) VALUES ($1, $2, $3)",
            )
            .bind(Uuid::new_v4())
            .bind(e.campaign_id)
            .bind(e.lead_id)
            .execute(&mut *tx)
            .await?;
        }

        for m in &messages {
            sqlx::query(
                r#"
                INSERT INTO scheduled_messages (
                    id, campaign_id, lead_id, sequence_order, template_id, template_name,
                    scheduled_date, scheduled_at, max_attempts
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(m.campaign_id)
            .bind(m.lead_id)
            .bind(m.sequence_order)
            .bind(&m.template_id)
            .bind(&m.template_name)
            .bind(m.scheduled_date)
            .bind(m.scheduled_at)
            .bind(m.max_attempts)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(campaign)
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List campaigns
    pub async fn list(
        &self,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE status = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Campaign>(
                "SELECT * FROM campaigns ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Ordered template sequence for a campaign
    pub async fn templates(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignTemplate>, sqlx::Error> {
        sqlx::query_as::<_, CampaignTemplate>(
            "SELECT * FROM campaign_templates WHERE campaign_id = $1 ORDER BY sequence_order",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Update campaign status
    pub async fn update_status(
        &self,
        id: CampaignId,
        status: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let completed_at = if matches!(
            status,
            CampaignStatus::Completed | CampaignStatus::Cancelled
        ) {
            Some(Utc::now())
        } else {
            None
        };

        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                status = $2,
                completed_at = COALESCE($3, completed_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// IDs of active campaigns with no pending or claimed messages left
    pub async fn active_ids_with_no_outstanding(&self) -> Result<Vec<CampaignId>, sqlx::Error> {
        let rows: Vec<(CampaignId,)> = sqlx::query_as(
            r#"
            SELECT c.id FROM campaigns c
            WHERE c.status = 'active'
              AND NOT EXISTS (
                  SELECT 1 FROM scheduled_messages m
                  WHERE m.campaign_id = c.id AND m.status IN ('pending', 'claimed')
              )
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Count campaigns
    pub async fn count(&self, status: Option<CampaignStatus>) -> Result<i64, sqlx::Error> {
        let count: (i64,) = if let Some(status) = status {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE status = $1")
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns")
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count.0)
    }
}
