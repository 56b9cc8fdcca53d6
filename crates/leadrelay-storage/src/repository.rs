//! Repository layer for data access

pub mod campaigns;
pub mod enrollments;
pub mod leads;
pub mod scheduled_messages;

pub use campaigns::CampaignRepository;
pub use enrollments::EnrollmentRepository;
pub use leads::LeadRepository;
pub use scheduled_messages::{CampaignMessageCounts, ScheduledMessageRepository};
