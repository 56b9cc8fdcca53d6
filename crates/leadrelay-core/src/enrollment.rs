//! Enrollment Manager - audience x calendar materialization
//!
//! Plans the per-lead, per-template scheduled message rows for a new
//! campaign. Template positions past the per-lead message limit are not
//! materialized at all, so the dispatcher never has to consult the
//! schedule computer again.

use chrono::{NaiveDate, NaiveTime};
use leadrelay_common::types::{CampaignId, LeadId};
use leadrelay_storage::models::{CreateEnrollment, CreateScheduledMessage, CreateTemplate};

/// Plan the full cross-product of audience x calendar for one campaign.
///
/// One enrollment per lead; one scheduled message per lead per calendar
/// entry with `sequence_order <= message_limit`. The rows are persisted
/// by the campaign repository in a single transaction.
pub fn plan_enrollments(
    campaign_id: CampaignId,
    audience: &[LeadId],
    templates: &[CreateTemplate],
    calendar: &[(i32, NaiveDate)],
    message_limit: i32,
    send_time: NaiveTime,
    max_attempts: i32,
) -> (Vec<CreateEnrollment>, Vec<CreateScheduledMessage>) {
    let mut enrollments = Vec::with_capacity(audience.len());
    let mut messages = Vec::new();

    for &lead_id in audience {
        enrollments.push(CreateEnrollment {
            campaign_id,
            lead_id,
        });

        for &(sequence_order, date) in calendar {
            if sequence_order > message_limit {
                continue;
            }
            let Some(template) = templates.iter().find(|t| t.sequence_order == sequence_order)
            else {
                continue;
            };

            messages.push(CreateScheduledMessage {
                campaign_id,
                lead_id,
                sequence_order,
                template_id: template.template_id.clone(),
                template_name: template.template_name.clone(),
                scheduled_date: date,
                scheduled_at: date.and_time(send_time).and_utc(),
                max_attempts,
            });
        }
    }

    (enrollments, messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn template(sequence_order: i32) -> CreateTemplate {
        CreateTemplate {
            template_id: format!("tpl-{}", sequence_order),
            template_name: format!("Template {}", sequence_order),
            sequence_order,
            custom_date: None,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_row_count_is_audience_times_min_n_limit() {
        let campaign_id = Uuid::new_v4();
        let audience: Vec<LeadId> = (0..4).map(|_| Uuid::new_v4()).collect();
        let templates: Vec<_> = (1..=3).map(template).collect();
        let calendar = vec![(1, date(3)), (2, date(5)), (3, date(7))];
        let send_time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        // limit below N truncates
        let (enrollments, messages) =
            plan_enrollments(campaign_id, &audience, &templates, &calendar, 2, send_time, 5);
        assert_eq!(enrollments.len(), 4);
        assert_eq!(messages.len(), 4 * 2);
        assert!(messages.iter().all(|m| m.sequence_order <= 2));

        // limit above N materializes everything
        let (_, messages) =
            plan_enrollments(campaign_id, &audience, &templates, &calendar, 10, send_time, 5);
        assert_eq!(messages.len(), 4 * 3);
    }

    #[test]
    fn test_sequence_beyond_limit_never_materialized() {
        let campaign_id = Uuid::new_v4();
        let audience = vec![Uuid::new_v4()];
        let templates: Vec<_> = (1..=3).map(template).collect();
        let calendar = vec![(1, date(3)), (2, date(5)), (3, date(7))];
        let send_time = NaiveTime::from_hms_opt(10, 30, 0).unwrap();

        let (_, messages) =
            plan_enrollments(campaign_id, &audience, &templates, &calendar, 2, send_time, 5);

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.sequence_order != 3));
    }

    #[test]
    fn test_scheduled_at_combines_date_and_send_time() {
        let campaign_id = Uuid::new_v4();
        let audience = vec![Uuid::new_v4()];
        let templates = vec![template(1)];
        let calendar = vec![(1, date(3))];
        let send_time = NaiveTime::from_hms_opt(14, 15, 0).unwrap();

        let (_, messages) =
            plan_enrollments(campaign_id, &audience, &templates, &calendar, 1, send_time, 5);

        assert_eq!(messages[0].scheduled_date, date(3));
        assert_eq!(
            messages[0].scheduled_at,
            date(3).and_time(send_time).and_utc()
        );
        assert_eq!(messages[0].template_id, "tpl-1");
    }

    #[test]
    fn test_empty_audience_plans_nothing() {
        let (enrollments, messages) = plan_enrollments(
            Uuid::new_v4(),
            &[],
            &[template(1)],
            &[(1, date(3))],
            1,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            5,
        );
        assert!(enrollments.is_empty());
        assert!(messages.is_empty());
    }
}
