//! Schedule Computer - per-template date assignment
//!
//! Turns an ordered template sequence plus timing configuration into a
//! calendar: one send date per sequence position. Pure date arithmetic,
//! no store access.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use leadrelay_storage::models::{CreateTemplate, ScheduleMode};
use serde::Serialize;
use thiserror::Error;

/// Schedule validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Campaign must have at least one template")]
    NoTemplates,

    #[error("Template sequence_order values must be exactly 1..{expected}")]
    BadSequence { expected: i32 },

    #[error("Campaign duration must be at least 1 day")]
    BadDuration,

    #[error("Template {sequence_order} is missing a custom date")]
    MissingCustomDate { sequence_order: i32 },

    #[error("Custom dates are only allowed in custom schedule mode")]
    UnexpectedCustomDate,

    #[error("Custom dates must be non-decreasing by sequence order")]
    NonMonotonicDates,

    #[error("Custom date {date} is before the campaign start date {start}")]
    DateInPast { date: NaiveDate, start: NaiveDate },
}

/// One entry of the campaign-level schedule preview returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulePreviewEntry {
    pub template_name: String,
    pub send_date: NaiveDate,
    pub sequence: i32,
}

/// Compute the calendar: one `(sequence_order, date)` pair per template.
///
/// Templates are validated to carry a contiguous 1..N sequence. In custom
/// mode dates are taken verbatim after validation; in duration mode N
/// offsets are spread evenly across `[0, D-1]` and weekend dates are
/// advanced to the following Monday when weekend sends are disabled.
pub fn compute_schedule(
    templates: &[CreateTemplate],
    mode: ScheduleMode,
    duration_days: Option<i32>,
    send_on_weekends: bool,
    reference: NaiveDate,
) -> Result<Vec<(i32, NaiveDate)>, ScheduleError> {
    let ordered = validate_sequence(templates)?;

    match mode {
        ScheduleMode::Custom => custom_dates(&ordered, reference),
        ScheduleMode::Duration => {
            let duration = duration_days.ok_or(ScheduleError::BadDuration)?;
            if ordered.iter().any(|t| t.custom_date.is_some()) {
                return Err(ScheduleError::UnexpectedCustomDate);
            }
            duration_dates(&ordered, duration, send_on_weekends, reference)
        }
    }
}

/// Build the caller-facing preview from templates and their computed dates
pub fn build_preview(
    templates: &[CreateTemplate],
    calendar: &[(i32, NaiveDate)],
) -> Vec<SchedulePreviewEntry> {
    calendar
        .iter()
        .filter_map(|&(sequence, date)| {
            templates
                .iter()
                .find(|t| t.sequence_order == sequence)
                .map(|t| SchedulePreviewEntry {
                    template_name: t.template_name.clone(),
                    send_date: date,
                    sequence,
                })
        })
        .collect()
}

/// Check the 1..N contiguity invariant and return templates in sequence order
fn validate_sequence(templates: &[CreateTemplate]) -> Result<Vec<CreateTemplate>, ScheduleError> {
    if templates.is_empty() {
        return Err(ScheduleError::NoTemplates);
    }

    let mut ordered = templates.to_vec();
    ordered.sort_by_key(|t| t.sequence_order);

    let expected = ordered.len() as i32;
    for (i, t) in ordered.iter().enumerate() {
        if t.sequence_order != i as i32 + 1 {
            return Err(ScheduleError::BadSequence { expected });
        }
    }

    Ok(ordered)
}

fn custom_dates(
    ordered: &[CreateTemplate],
    reference: NaiveDate,
) -> Result<Vec<(i32, NaiveDate)>, ScheduleError> {
    let mut calendar = Vec::with_capacity(ordered.len());
    let mut previous: Option<NaiveDate> = None;

    for t in ordered {
        let date = t.custom_date.ok_or(ScheduleError::MissingCustomDate {
            sequence_order: t.sequence_order,
        })?;

        if date < reference {
            return Err(ScheduleError::DateInPast {
                date,
                start: reference,
            });
        }
        if let Some(prev) = previous {
            if date < prev {
                return Err(ScheduleError::NonMonotonicDates);
            }
        }

        previous = Some(date);
        calendar.push((t.sequence_order, date));
    }

    Ok(calendar)
}

fn duration_dates(
    ordered: &[CreateTemplate],
    duration_days: i32,
    send_on_weekends: bool,
    reference: NaiveDate,
) -> Result<Vec<(i32, NaiveDate)>, ScheduleError> {
    if duration_days < 1 {
        return Err(ScheduleError::BadDuration);
    }

    let n = ordered.len() as i64;
    let span = (duration_days - 1) as i64;
    let divisor = (n - 1).max(1);

    let mut calendar = Vec::with_capacity(ordered.len());
    for (i, t) in ordered.iter().enumerate() {
        let offset = (i as i64 * span) / divisor;
        let mut date = reference + Duration::days(offset);
        if !send_on_weekends {
            date = next_weekday(date);
        }
        calendar.push((t.sequence_order, date));
    }

    Ok(calendar)
}

/// Advance a weekend date to the following Monday
fn next_weekday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn template(sequence_order: i32, custom_date: Option<NaiveDate>) -> CreateTemplate {
        CreateTemplate {
            template_id: format!("tpl-{}", sequence_order),
            template_name: format!("Template {}", sequence_order),
            sequence_order,
            custom_date,
        }
    }

    fn templates(n: i32) -> Vec<CreateTemplate> {
        (1..=n).map(|i| template(i, None)).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_duration_even_spread() {
        // Monday start, 3 templates over 7 days: offsets 0, 3, 6
        let start = date(2024, 6, 3);
        let calendar = compute_schedule(
            &templates(3),
            ScheduleMode::Duration,
            Some(7),
            true,
            start,
        )
        .unwrap();

        assert_eq!(
            calendar,
            vec![
                (1, date(2024, 6, 3)),
                (2, date(2024, 6, 6)),
                (3, date(2024, 6, 9)),
            ]
        );
    }

    #[test]
    fn test_single_template_lands_on_reference() {
        let start = date(2024, 6, 3);
        let calendar =
            compute_schedule(&templates(1), ScheduleMode::Duration, Some(14), true, start).unwrap();
        assert_eq!(calendar, vec![(1, start)]);
    }

    #[test]
    fn test_more_templates_than_days_ties_allowed() {
        let start = date(2024, 6, 3);
        let calendar =
            compute_schedule(&templates(5), ScheduleMode::Duration, Some(2), true, start).unwrap();

        // 5 templates across [0, 1]: some dates repeat, none decrease
        for window in calendar.windows(2) {
            assert!(window[0].1 <= window[1].1);
        }
        assert_eq!(calendar[0].1, start);
        assert_eq!(calendar[4].1, start + Duration::days(1));
    }

    #[test]
    fn test_duration_bounds_hold_for_all_shapes() {
        let start = date(2024, 1, 1);
        for n in 1..=8 {
            for d in 1..=20 {
                let calendar = compute_schedule(
                    &templates(n),
                    ScheduleMode::Duration,
                    Some(d),
                    true,
                    start,
                )
                .unwrap();

                assert_eq!(calendar.len(), n as usize);
                assert_eq!(calendar[0].1, start, "first date must equal reference");
                let last = start + Duration::days((d - 1) as i64);
                for window in calendar.windows(2) {
                    assert!(window[0].1 <= window[1].1, "dates must be non-decreasing");
                }
                for &(_, dt) in &calendar {
                    assert!(dt <= last, "no date may exceed reference + D-1");
                }
            }
        }
    }

    #[test]
    fn test_weekend_skip_never_lands_on_weekend() {
        let start = date(2024, 1, 1);
        for n in 1..=6 {
            for d in 1..=15 {
                let calendar = compute_schedule(
                    &templates(n),
                    ScheduleMode::Duration,
                    Some(d),
                    false,
                    start,
                )
                .unwrap();
                for &(_, dt) in &calendar {
                    assert!(
                        dt.weekday() != Weekday::Sat && dt.weekday() != Weekday::Sun,
                        "{} falls on a weekend",
                        dt
                    );
                }
                for window in calendar.windows(2) {
                    assert!(window[0].1 <= window[1].1);
                }
            }
        }
    }

    #[test]
    fn test_friday_start_weekend_skip() {
        // 2024-06-07 is a Friday. Offsets 0, 3, 6 land Fri / Mon / Thu.
        let friday = date(2024, 6, 7);
        assert_eq!(friday.weekday(), Weekday::Fri);

        let calendar = compute_schedule(
            &templates(3),
            ScheduleMode::Duration,
            Some(7),
            false,
            friday,
        )
        .unwrap();

        assert_eq!(calendar[0].1, friday);
        assert_eq!(calendar[1].1, date(2024, 6, 10)); // Monday
        for &(_, dt) in &calendar {
            assert!(dt.weekday() != Weekday::Sat && dt.weekday() != Weekday::Sun);
        }
    }

    #[test]
    fn test_custom_dates_verbatim() {
        let start = date(2024, 6, 1);
        let input = vec![
            template(1, Some(date(2024, 6, 2))),
            template(2, Some(date(2024, 6, 2))),
            template(3, Some(date(2024, 6, 10))),
        ];
        let calendar =
            compute_schedule(&input, ScheduleMode::Custom, None, true, start).unwrap();
        assert_eq!(
            calendar,
            vec![
                (1, date(2024, 6, 2)),
                (2, date(2024, 6, 2)),
                (3, date(2024, 6, 10)),
            ]
        );
    }

    #[test]
    fn test_custom_rejects_missing_date() {
        let start = date(2024, 6, 1);
        let input = vec![template(1, Some(date(2024, 6, 2))), template(2, None)];
        let err = compute_schedule(&input, ScheduleMode::Custom, None, true, start).unwrap_err();
        assert_eq!(err, ScheduleError::MissingCustomDate { sequence_order: 2 });
    }

    #[test]
    fn test_custom_rejects_non_monotonic() {
        let start = date(2024, 6, 1);
        let input = vec![
            template(1, Some(date(2024, 6, 10))),
            template(2, Some(date(2024, 6, 5))),
        ];
        let err = compute_schedule(&input, ScheduleMode::Custom, None, true, start).unwrap_err();
        assert_eq!(err, ScheduleError::NonMonotonicDates);
    }

    #[test]
    fn test_custom_rejects_past_date() {
        let start = date(2024, 6, 10);
        let input = vec![template(1, Some(date(2024, 6, 5)))];
        let err = compute_schedule(&input, ScheduleMode::Custom, None, true, start).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::DateInPast {
                date: date(2024, 6, 5),
                start,
            }
        );
    }

    #[test]
    fn test_duration_rejects_custom_dates() {
        let start = date(2024, 6, 1);
        let input = vec![template(1, Some(date(2024, 6, 2)))];
        let err =
            compute_schedule(&input, ScheduleMode::Duration, Some(5), true, start).unwrap_err();
        assert_eq!(err, ScheduleError::UnexpectedCustomDate);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let start = date(2024, 6, 1);
        assert_eq!(
            compute_schedule(&[], ScheduleMode::Duration, Some(5), true, start).unwrap_err(),
            ScheduleError::NoTemplates
        );
        assert_eq!(
            compute_schedule(&templates(2), ScheduleMode::Duration, Some(0), true, start)
                .unwrap_err(),
            ScheduleError::BadDuration
        );
        assert_eq!(
            compute_schedule(&templates(2), ScheduleMode::Duration, None, true, start)
                .unwrap_err(),
            ScheduleError::BadDuration
        );

        let gap = vec![template(1, None), template(3, None)];
        assert_eq!(
            compute_schedule(&gap, ScheduleMode::Duration, Some(5), true, start).unwrap_err(),
            ScheduleError::BadSequence { expected: 2 }
        );
    }

    #[test]
    fn test_build_preview() {
        let input = vec![template(1, None), template(2, None)];
        let calendar = vec![(1, date(2024, 6, 3)), (2, date(2024, 6, 5))];
        let preview = build_preview(&input, &calendar);
        assert_eq!(preview.len(), 2);
        assert_eq!(preview[0].template_name, "Template 1");
        assert_eq!(preview[0].send_date, date(2024, 6, 3));
        assert_eq!(preview[1].sequence, 2);
    }
}
