//! LeadRelay Core - Outreach campaign scheduling and dispatch
//!
//! The engine behind campaign creation and delivery:
//! audience resolution, per-template date assignment, enrollment
//! materialization, and the periodic dispatcher that claims due messages
//! and hands them to a channel adapter.

pub mod audience;
pub mod campaign;
pub mod channel;
pub mod dispatch;
pub mod enrollment;
pub mod schedule;

pub use audience::AudienceResolver;
pub use campaign::{
    CampaignCreated, CampaignError, CampaignManager, CampaignStats, NewCampaign,
    NewCampaignTemplate, SingleSendOutcome,
};
pub use channel::{ChannelAdapter, ChannelError, ChannelSet, OutboundMessage};
pub use dispatch::{Dispatcher, TickSummary};
pub use schedule::{ScheduleError, SchedulePreviewEntry};
