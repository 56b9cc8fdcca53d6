//! Common types for LeadRelay

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Unique identifier for leads
pub type LeadId = Uuid;

/// Unique identifier for campaigns
pub type CampaignId = Uuid;

/// Unique identifier for enrollments
pub type EnrollmentId = Uuid;

/// Unique identifier for scheduled messages
pub type ScheduledMessageId = Uuid;

/// Channel-side template identifier (opaque to the engine)
pub type TemplateId = String;

/// Pipeline stage identifier, owned by the lead store
pub type StageId = String;

/// Lead source identifier, owned by the lead store
pub type SourceId = String;

/// Outbound messaging channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Email,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Whatsapp => write!(f, "whatsapp"),
            Channel::Email => write!(f, "email"),
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whatsapp" => Ok(Channel::Whatsapp),
            "email" => Ok(Channel::Email),
            other => Err(crate::Error::Validation(format!(
                "Unknown channel: {}",
                other
            ))),
        }
    }
}

/// Campaign targeting rule, fixed once at campaign creation.
///
/// Either every lead in the store, or the union of leads matching any of the
/// listed stages or any of the listed sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceRule {
    pub all: bool,
    #[serde(default)]
    pub stage_ids: BTreeSet<StageId>,
    #[serde(default)]
    pub source_ids: BTreeSet<SourceId>,
}

impl AudienceRule {
    /// Rule matching every lead in the store
    pub fn all_leads() -> Self {
        Self {
            all: true,
            stage_ids: BTreeSet::new(),
            source_ids: BTreeSet::new(),
        }
    }

    /// Rule matching leads in any of the given stages or sources
    pub fn matching(stage_ids: BTreeSet<StageId>, source_ids: BTreeSet<SourceId>) -> Self {
        Self {
            all: false,
            stage_ids,
            source_ids,
        }
    }

    /// Validate the rule shape
    pub fn validate(&self) -> crate::Result<()> {
        if !self.all && self.stage_ids.is_empty() && self.source_ids.is_empty() {
            return Err(crate::Error::Validation(
                "Audience rule must target all leads or list at least one stage or source"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a campaign send time from "HH:MM"
pub fn parse_send_time(s: &str) -> crate::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| crate::Error::Validation(format!("Invalid send time: {:?} (expected HH:MM)", s)))
}

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_channel_roundtrip() {
        assert_eq!(Channel::Whatsapp.to_string(), "whatsapp");
        assert_eq!("email".parse::<Channel>().unwrap(), Channel::Email);
        assert!("sms".parse::<Channel>().is_err());
    }

    #[test]
    fn test_parse_send_time() {
        let t = parse_send_time("09:30").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert!(parse_send_time("9:3:1").is_err());
        assert!(parse_send_time("25:00").is_err());
    }

    #[test]
    fn test_audience_rule_validate() {
        assert!(AudienceRule::all_leads().validate().is_ok());

        let empty = AudienceRule::matching(BTreeSet::new(), BTreeSet::new());
        assert!(empty.validate().is_err());

        let stages = AudienceRule::matching(
            ["stage-new".to_string()].into_iter().collect(),
            BTreeSet::new(),
        );
        assert!(stages.validate().is_ok());
    }
}
