//! Dispatcher - periodic delivery of due scheduled messages
//!
//! Each tick scans for pending messages whose time has passed, claims
//! them one by one through the conditional-update gate, and fans the
//! claimed work out to channel adapters under a concurrency limit.
//! Outcomes feed the retry machinery: transient failures go back to
//! pending with exponential backoff, permanent ones are final.

use crate::channel::{ChannelError, ChannelSet, OutboundMessage};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use leadrelay_common::config::DispatcherConfig;
use leadrelay_storage::models::{CampaignStatus, EnrollmentStatus, ScheduledMessage};
use leadrelay_storage::repository::{
    CampaignRepository, EnrollmentRepository, LeadRepository, ScheduledMessageRepository,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Per-tick outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub claimed: u64,
    pub sent: u64,
    pub retried: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl TickSummary {
    fn add(&mut self, outcome: Outcome) {
        self.claimed += 1;
        match outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::Retried => self.retried += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Sent,
    Retried,
    Failed,
    Skipped,
}

/// The dispatcher
pub struct Dispatcher {
    campaigns: CampaignRepository,
    enrollments: EnrollmentRepository,
    messages: ScheduledMessageRepository,
    leads: LeadRepository,
    channels: Arc<ChannelSet>,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(pool: PgPool, channels: Arc<ChannelSet>, config: DispatcherConfig) -> Self {
        Self {
            campaigns: CampaignRepository::new(pool.clone()),
            enrollments: EnrollmentRepository::new(pool.clone()),
            messages: ScheduledMessageRepository::new(pool.clone()),
            leads: LeadRepository::new(pool),
            channels,
            config,
        }
    }

    /// Run the dispatch loop until the task is aborted
    pub async fn run(self: Arc<Self>) {
        info!(
            tick_interval_secs = self.config.tick_interval_secs,
            batch_size = self.config.batch_size,
            concurrency = self.config.concurrency_limit,
            "Dispatcher started"
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.tick_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match self.clone().tick().await {
                Ok(summary) if summary.claimed > 0 => {
                    info!(
                        claimed = summary.claimed,
                        sent = summary.sent,
                        retried = summary.retried,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        "Dispatch tick complete"
                    );
                }
                Ok(_) => debug!("Dispatch tick complete, nothing due"),
                Err(e) => error!("Dispatch tick failed: {}", e),
            }
        }
    }

    /// Run one dispatch tick: claim due messages, deliver them under the
    /// concurrency limit, and finish campaigns with no outstanding work.
    pub async fn tick(self: Arc<Self>) -> Result<TickSummary, sqlx::Error> {
        let due = self.messages.get_due_pending(self.config.batch_size).await?;
        let mut summary = TickSummary::default();

        if !due.is_empty() {
            debug!(count = due.len(), "Due messages found");

            let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit));
            let mut handles = Vec::with_capacity(due.len());

            for message in due {
                // The claim is the race gate: only one worker flips the row
                // from pending, everyone else moves on.
                if !self.messages.claim(message.id).await? {
                    debug!(message_id = %message.id, "Lost claim race, skipping");
                    continue;
                }

                let dispatcher = self.clone();
                // The semaphore is never closed, so acquisition only fails
                // if the tick itself is being torn down.
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };

                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    dispatcher.deliver(message).await
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok(outcome) => summary.add(outcome),
                    Err(e) => error!("Delivery task panicked: {}", e),
                }
            }
        }

        self.finish_completed_campaigns().await?;
        Ok(summary)
    }

    /// Deliver one claimed message and record the outcome.
    /// The attempt counter was already advanced by the claim.
    async fn deliver(&self, message: ScheduledMessage) -> Outcome {
        // Re-check the enrollment after claiming: a cancellation that raced
        // the due-scan must still win.
        let enrollment = match self
            .enrollments
            .get(message.campaign_id, message.lead_id)
            .await
        {
            Ok(Some(enrollment)) => {
                if enrollment.status_enum() == Some(EnrollmentStatus::Cancelled) {
                    debug!(message_id = %message.id, "Enrollment cancelled, skipping");
                    return self.skip(&message).await;
                }
                enrollment
            }
            Ok(None) => {
                warn!(message_id = %message.id, "No enrollment for claimed message, skipping");
                return self.skip(&message).await;
            }
            Err(e) => {
                error!(message_id = %message.id, "Enrollment lookup failed: {}", e);
                return self.retry(&message, &e.to_string()).await;
            }
        };

        let campaign = match self.campaigns.get(message.campaign_id).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                warn!(message_id = %message.id, "Campaign gone, skipping");
                return self.skip(&message).await;
            }
            Err(e) => {
                error!(message_id = %message.id, "Campaign lookup failed: {}", e);
                return self.retry(&message, &e.to_string()).await;
            }
        };

        if campaign.status_enum() != Some(CampaignStatus::Active) {
            debug!(message_id = %message.id, "Campaign no longer active, skipping");
            return self.skip(&message).await;
        }

        // Messages past the limit are never materialized, so this only
        // fires if the limit was lowered after creation.
        if enrollment.messages_sent_count >= campaign.message_limit {
            debug!(message_id = %message.id, "Lead already at message limit, skipping");
            return self.skip(&message).await;
        }

        let Some(channel) = campaign.channel_enum() else {
            return self.fail(&message, "Campaign has an unknown channel").await;
        };

        let lead = match self.leads.get(message.lead_id).await {
            Ok(Some(lead)) => lead,
            Ok(None) => {
                warn!(message_id = %message.id, lead_id = %message.lead_id, "Lead gone, skipping");
                return self.skip(&message).await;
            }
            Err(e) => {
                error!(message_id = %message.id, "Lead lookup failed: {}", e);
                return self.retry(&message, &e.to_string()).await;
            }
        };

        let Some(to) = lead.address_for(channel) else {
            return self
                .fail(
                    &message,
                    &format!("Lead has no {} address", channel),
                )
                .await;
        };

        let outbound = OutboundMessage {
            to: to.to_string(),
            lead_name: lead.name.clone(),
            template_id: message.template_id.clone(),
            template_name: message.template_name.clone(),
        };

        let adapter = self.channels.adapter_for(channel);
        let send_timeout = Duration::from_secs(self.config.send_timeout_secs);

        match tokio::time::timeout(send_timeout, adapter.send(&outbound)).await {
            Ok(Ok(channel_message_id)) => {
                debug!(
                    message_id = %message.id,
                    channel = adapter.name(),
                    %channel_message_id,
                    "Message delivered"
                );
                self.record_sent(&message).await
            }
            Ok(Err(ChannelError::Transient(e))) => self.retry(&message, &e).await,
            Ok(Err(ChannelError::Permanent(e))) => self.fail(&message, &e).await,
            Err(_) => {
                self.retry(&message, &format!("Send timed out after {:?}", send_timeout))
                    .await
            }
        }
    }

    async fn record_sent(&self, message: &ScheduledMessage) -> Outcome {
        if let Err(e) = self.messages.mark_sent(message.id).await {
            error!(message_id = %message.id, "Failed to mark message sent: {}", e);
            return Outcome::Failed;
        }
        if let Err(e) = self
            .enrollments
            .record_sent(message.campaign_id, message.lead_id)
            .await
        {
            error!(message_id = %message.id, "Failed to update enrollment: {}", e);
        }
        Outcome::Sent
    }

    async fn retry(&self, message: &ScheduledMessage, error_text: &str) -> Outcome {
        // attempt_count already reflects this attempt
        let attempts = message.attempt_count + 1;
        let retry_at = next_retry_at(
            Utc::now(),
            attempts,
            self.config.retry_base_secs,
            self.config.retry_cap_secs,
        );

        match self
            .messages
            .retry_or_fail(message.id, error_text, retry_at)
            .await
        {
            Ok(Some(updated)) if updated.status == "pending" => {
                warn!(
                    message_id = %message.id,
                    attempts,
                    retry_at = %retry_at,
                    "Transient failure, retry scheduled: {}",
                    error_text
                );
                Outcome::Retried
            }
            Ok(_) => {
                error!(
                    message_id = %message.id,
                    attempts,
                    "Attempts exhausted, message failed: {}",
                    error_text
                );
                self.settle_enrollment(message).await;
                Outcome::Failed
            }
            Err(e) => {
                error!(message_id = %message.id, "Failed to record retry: {}", e);
                Outcome::Failed
            }
        }
    }

    async fn fail(&self, message: &ScheduledMessage, error_text: &str) -> Outcome {
        error!(message_id = %message.id, "Permanent failure: {}", error_text);
        if let Err(e) = self.messages.mark_failed(message.id, error_text).await {
            error!(message_id = %message.id, "Failed to mark message failed: {}", e);
        }
        self.settle_enrollment(message).await;
        Outcome::Failed
    }

    async fn skip(&self, message: &ScheduledMessage) -> Outcome {
        if let Err(e) = self.messages.skip_claimed(message.id).await {
            error!(message_id = %message.id, "Failed to skip message: {}", e);
        }
        self.settle_enrollment(message).await;
        Outcome::Skipped
    }

    /// An enrollment whose last outstanding message just ended in `failed`
    /// or `skipped` is completed here; `record_sent` handles sent endings.
    async fn settle_enrollment(&self, message: &ScheduledMessage) {
        match self
            .enrollments
            .complete_if_settled(message.campaign_id, message.lead_id)
            .await
        {
            Ok(true) => {
                debug!(
                    campaign_id = %message.campaign_id,
                    lead_id = %message.lead_id,
                    "Enrollment completed"
                );
            }
            Ok(false) => {}
            Err(e) => {
                error!(
                    campaign_id = %message.campaign_id,
                    lead_id = %message.lead_id,
                    "Failed to settle enrollment: {}",
                    e
                );
            }
        }
    }

    /// Mark active campaigns with no pending or claimed messages completed
    async fn finish_completed_campaigns(&self) -> Result<(), sqlx::Error> {
        for campaign_id in self.campaigns.active_ids_with_no_outstanding().await? {
            if let Some(campaign) = self
                .campaigns
                .update_status(campaign_id, CampaignStatus::Completed)
                .await?
            {
                info!(campaign_id = %campaign.id, name = %campaign.name, "Campaign completed");
            }
        }
        Ok(())
    }
}

/// Exponential backoff for the nth delivery attempt, capped.
///
/// The first retry waits the base delay, each further retry doubles it.
pub fn backoff_delay(attempt: i32, base_secs: i64, cap_secs: i64) -> ChronoDuration {
    let exponent = attempt.saturating_sub(1).clamp(0, 30) as u32;
    let delay = base_secs.saturating_mul(1i64 << exponent).min(cap_secs);
    ChronoDuration::seconds(delay)
}

/// The instant a transient failure becomes eligible again
pub fn next_retry_at(
    now: DateTime<Utc>,
    attempt: i32,
    base_secs: i64,
    cap_secs: i64,
) -> DateTime<Utc> {
    now + backoff_delay(attempt, base_secs, cap_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1, 60, 3600), ChronoDuration::seconds(60));
        assert_eq!(backoff_delay(2, 60, 3600), ChronoDuration::seconds(120));
        assert_eq!(backoff_delay(3, 60, 3600), ChronoDuration::seconds(240));
        assert_eq!(backoff_delay(4, 60, 3600), ChronoDuration::seconds(480));
    }

    #[test]
    fn test_backoff_respects_cap() {
        assert_eq!(backoff_delay(10, 60, 3600), ChronoDuration::seconds(3600));
        // very large attempt numbers never overflow
        assert_eq!(backoff_delay(1000, 60, 3600), ChronoDuration::seconds(3600));
    }

    #[test]
    fn test_backoff_handles_degenerate_attempts() {
        assert_eq!(backoff_delay(0, 60, 3600), ChronoDuration::seconds(60));
        assert_eq!(backoff_delay(-5, 60, 3600), ChronoDuration::seconds(60));
    }

    #[test]
    fn test_next_retry_at_is_in_the_future() {
        let now = Utc::now();
        let at = next_retry_at(now, 3, 60, 3600);
        assert_eq!(at, now + ChronoDuration::seconds(240));
    }

    #[test]
    fn test_tick_summary_counters() {
        let mut summary = TickSummary::default();
        summary.add(Outcome::Sent);
        summary.add(Outcome::Sent);
        summary.add(Outcome::Retried);
        summary.add(Outcome::Skipped);
        assert_eq!(summary.claimed, 4);
        assert_eq!(summary.sent, 2);
        assert_eq!(summary.retried, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.skipped, 1);
    }
}
