//! Scheduled message repository
//!
//! The pending -> claimed transition here is the single point of mutual
//! exclusion for the dispatcher: it is a conditional update that succeeds
//! for exactly one worker, so a message is handed to at most one sender
//! even with several dispatcher instances running.

use chrono::{DateTime, Utc};
use leadrelay_common::types::CampaignId;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{MessageStatus, ScheduledMessage};

/// Scheduled message repository
#[derive(Clone)]
pub struct ScheduledMessageRepository {
    pool: PgPool,
}

impl ScheduledMessageRepository {
    /// Create a new scheduled message repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a scheduled message by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<ScheduledMessage>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledMessage>("SELECT * FROM scheduled_messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Pending messages whose scheduled time has passed.
    /// Uses FOR UPDATE SKIP LOCKED so overlapping ticks do not block on
    /// each other's scans.
    pub async fn get_due_pending(&self, limit: i64) -> Result<Vec<ScheduledMessage>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            SELECT * FROM scheduled_messages
            WHERE status = 'pending'
              AND scheduled_at <= NOW()
            ORDER BY scheduled_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Atomically claim a pending message.
    ///
    /// The update only matches while the row is still pending; the worker
    /// that wins the race gets `true`, everyone else `false`. The attempt
    /// counter is advanced here so the retry ceiling covers claims that
    /// crash before recording an outcome.
    pub async fn claim(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_messages SET
                status = 'claimed',
                attempt_count = attempt_count + 1,
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a claimed message as sent
    pub async fn mark_sent(&self, id: Uuid) -> Result<Option<ScheduledMessage>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            UPDATE scheduled_messages SET
                status = 'sent',
                sent_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'claimed'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Record a transient failure: back to pending at the given retry time
    /// while attempts remain, failed once they are exhausted.
    pub async fn retry_or_fail(
        &self,
        id: Uuid,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledMessage>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            UPDATE scheduled_messages SET
                status = CASE
                    WHEN attempt_count < max_attempts THEN 'pending'
                    ELSE 'failed'
                END,
                scheduled_at = CASE
                    WHEN attempt_count < max_attempts THEN $3
                    ELSE scheduled_at
                END,
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'claimed'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(retry_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// Record a permanent failure: no retry
    pub async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
    ) -> Result<Option<ScheduledMessage>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            UPDATE scheduled_messages SET
                status = 'failed',
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1 AND status = 'claimed'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await
    }

    /// Skip a claimed message (cancelled enrollment or exhausted limit
    /// observed after the claim)
    pub async fn skip_claimed(&self, id: Uuid) -> Result<Option<ScheduledMessage>, sqlx::Error> {
        sqlx::query_as::<_, ScheduledMessage>(
            r#"
            UPDATE scheduled_messages SET
                status = 'skipped',
                updated_at = NOW()
            WHERE id = $1 AND status = 'claimed'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Skip all pending messages for a campaign (campaign cancel)
    pub async fn skip_pending_by_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_messages SET
                status = 'skipped',
                updated_at = NOW()
            WHERE campaign_id = $1 AND status = 'pending'
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// List scheduled messages for a campaign
    pub async fn list_by_campaign(
        &self,
        campaign_id: CampaignId,
        status: Option<MessageStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ScheduledMessage>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, ScheduledMessage>(
                r#"
                SELECT * FROM scheduled_messages
                WHERE campaign_id = $1 AND status = $2
                ORDER BY scheduled_at ASC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(campaign_id)
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, ScheduledMessage>(
                r#"
                SELECT * FROM scheduled_messages
                WHERE campaign_id = $1
                ORDER BY scheduled_at ASC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(campaign_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Get count by status for a campaign (for stats)
    pub async fn get_campaign_status_counts(
        &self,
        campaign_id: CampaignId,
    ) -> Result<CampaignMessageCounts, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'claimed') as claimed,
                COUNT(*) FILTER (WHERE status = 'sent') as sent,
                COUNT(*) FILTER (WHERE status = 'failed') as failed,
                COUNT(*) FILTER (WHERE status = 'skipped') as skipped
            FROM scheduled_messages
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CampaignMessageCounts {
            pending: row.get::<Option<i64>, _>("pending").unwrap_or(0),
            claimed: row.get::<Option<i64>, _>("claimed").unwrap_or(0),
            sent: row.get::<Option<i64>, _>("sent").unwrap_or(0),
            failed: row.get::<Option<i64>, _>("failed").unwrap_or(0),
            skipped: row.get::<Option<i64>, _>("skipped").unwrap_or(0),
        })
    }
}

/// Campaign message counts by status
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CampaignMessageCounts {
    pub pending: i64,
    pub claimed: i64,
    pub sent: i64,
    pub failed: i64,
    pub skipped: i64,
}

impl CampaignMessageCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.claimed + self.sent + self.failed + self.skipped
    }

    pub fn terminal(&self) -> i64 {
        self.sent + self.failed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seed_due_message(pool: &PgPool) -> Uuid {
        let campaign_id = Uuid::new_v4();
        let lead_id = Uuid::new_v4();
        let id = Uuid::new_v4();

        sqlx::query("INSERT INTO leads (id, name, phone) VALUES ($1, 'Test Lead', '+15550100')")
            .bind(lead_id)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            r#"
            INSERT INTO campaigns (id, name, channel, schedule_mode, message_limit, send_time)
            VALUES ($1, 'Test campaign', 'whatsapp', 'duration', 5, '09:00')
            "#,
        )
        .bind(campaign_id)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            r#"
            INSERT INTO scheduled_messages (
                id, campaign_id, lead_id, sequence_order, template_id, template_name,
                scheduled_date, scheduled_at
            )
            VALUES ($1, $2, $3, 1, 'tpl-1', 'Template', CURRENT_DATE, NOW() - INTERVAL '1 hour')
            "#,
        )
        .bind(id)
        .bind(campaign_id)
        .bind(lead_id)
        .execute(pool)
        .await
        .unwrap();

        id
    }

    #[sqlx::test]
    async fn test_concurrent_claims_have_exactly_one_winner(pool: PgPool) {
        let id = seed_due_message(&pool).await;
        let repo_a = ScheduledMessageRepository::new(pool.clone());
        let repo_b = ScheduledMessageRepository::new(pool.clone());

        let (a, b) = tokio::join!(
            tokio::spawn(async move { repo_a.claim(id).await.unwrap() }),
            tokio::spawn(async move { repo_b.claim(id).await.unwrap() }),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(a ^ b, "exactly one worker may win the claim");

        let repo = ScheduledMessageRepository::new(pool);
        let message = repo.get(id).await.unwrap().unwrap();
        assert_eq!(message.status, "claimed");
        // the single claim consumed a single attempt
        assert_eq!(message.attempt_count, 1);
    }

    #[sqlx::test]
    async fn test_claimed_message_is_not_due_again(pool: PgPool) {
        let id = seed_due_message(&pool).await;
        let repo = ScheduledMessageRepository::new(pool);

        assert_eq!(repo.get_due_pending(10).await.unwrap().len(), 1);
        assert!(repo.claim(id).await.unwrap());
        assert!(repo.get_due_pending(10).await.unwrap().is_empty());

        repo.mark_sent(id).await.unwrap().unwrap();
        // terminal rows never re-enter the due scan
        assert!(repo.get_due_pending(10).await.unwrap().is_empty());
    }
}
