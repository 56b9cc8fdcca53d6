//! Audience Resolver - campaign membership capture
//!
//! Resolves a campaign's targeting rule into a concrete, deduplicated list
//! of lead IDs once, at creation time. The snapshot is never re-evaluated:
//! leads created or re-staged later are not pulled into running campaigns.

use leadrelay_common::types::{AudienceRule, LeadId};
use leadrelay_storage::repository::LeadRepository;
use sqlx::PgPool;
use std::collections::HashSet;

/// Audience resolver
#[derive(Clone)]
pub struct AudienceResolver {
    lead_repo: LeadRepository,
}

impl AudienceResolver {
    /// Create a new audience resolver
    pub fn new(pool: PgPool) -> Self {
        Self {
            lead_repo: LeadRepository::new(pool),
        }
    }

    /// Resolve the rule into a deduplicated lead snapshot.
    ///
    /// Returns an empty vector when nothing matches; the caller decides
    /// whether that is an error (campaign creation rejects it).
    pub async fn resolve(&self, rule: &AudienceRule) -> Result<Vec<LeadId>, sqlx::Error> {
        let ids = if rule.all {
            self.lead_repo.list_ids_all().await?
        } else {
            let stage_ids: Vec<String> = rule.stage_ids.iter().cloned().collect();
            let source_ids: Vec<String> = rule.source_ids.iter().cloned().collect();
            self.lead_repo
                .list_ids_matching(&stage_ids, &source_ids)
                .await?
        };

        Ok(dedup_preserving_order(ids))
    }
}

/// Drop duplicate IDs while keeping first-seen order
fn dedup_preserving_order(ids: Vec<LeadId>) -> Vec<LeadId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
