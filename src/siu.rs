use chrono::{Datelike, Duration, NaiveDate, Utc};

use crate::config::ScoringConfig;
use crate::models::{ActivityRecord, AttendanceRecord, SiuMember, SiuScore, SiuEntry, Student};

/// A scoring period: one calendar month of activity and attendance records.
pub type YearMonth = (i32, u32);

/// Score every SIU member on data-entry behavior: entry volume, timeliness of
/// submission, and attendance. With a period the records are restricted to
/// that calendar month; records strictly before the period (or before `now`
/// when unfiltered) feed only the previous rank, for trend display.
///
/// A member with no matching activities still earns attendance points and a
/// rank. An empty roster short-circuits to an empty result.
pub fn score_members(
    members: &[SiuMember],
    activities: &[ActivityRecord],
    attendance: &[AttendanceRecord],
    users: &[Student],
    period: Option<YearMonth>,
    now: NaiveDate,
    config: &ScoringConfig,
) -> Vec<SiuScore> {
    if members.is_empty() {
        return Vec::new();
    }

    let period_start =
        period.and_then(|(year, month)| NaiveDate::from_ymd_opt(year, month, 1));
    let cutoff = period_start.unwrap_or(now);

    let in_period = |date: Option<NaiveDate>| match period {
        Some((year, month)) => {
            date.is_some_and(|d| d.year() == year && d.month() == month)
        }
        None => true,
    };

    let current_activities: Vec<&ActivityRecord> = activities
        .iter()
        .filter(|act| in_period(act.effective_date()))
        .collect();
    let current_attendance: Vec<&AttendanceRecord> = attendance
        .iter()
        .filter(|rec| in_period(rec.date))
        .collect();

    let before_activities: Vec<&ActivityRecord> = activities
        .iter()
        .filter(|act| act.effective_date().is_some_and(|d| d < cutoff))
        .collect();
    let before_attendance: Vec<&AttendanceRecord> = attendance
        .iter()
        .filter(|rec| rec.date.is_some_and(|d| d < cutoff))
        .collect();

    let previous = score_period(members, &before_activities, &before_attendance, config);
    let mut scores = score_period(members, &current_activities, &current_attendance, config);

    for score in &mut scores {
        score.dob = users
            .iter()
            .find(|u| u.admission_no == score.admission_no)
            .and_then(|u| u.dob);
        score.previous_rank = previous
            .iter()
            .find(|p| p.admission_no == score.admission_no)
            .map(|p| p.rank);
    }
    scores
}

fn score_period(
    members: &[SiuMember],
    activities: &[&ActivityRecord],
    attendance: &[&AttendanceRecord],
    config: &ScoringConfig,
) -> Vec<SiuScore> {
    let attendance_days = attendance.len();

    let mut scores: Vec<SiuScore> = members
        .iter()
        .map(|member| {
            let selected: Vec<&ActivityRecord> = activities
                .iter()
                .copied()
                .filter(|act| {
                    act.submitted_by
                        .as_deref()
                        .is_some_and(|by| by.eq_ignore_ascii_case(&member.email))
                })
                .collect();

            let total_entries: usize =
                selected.iter().map(|act| record_entries(act)).sum();

            let timeliness_score: f64 = selected
                .iter()
                .filter(|act| is_timely(act, config.timeliness_window_hours))
                .map(|act| record_entries(act) as f64 * config.timeliness_points_per_entry)
                .sum();

            let entry_count_score = total_entries as f64 * config.entry_points_per_entry;

            let days_absent = attendance
                .iter()
                .filter(|rec| rec.absentees.contains(&member.admission_no))
                .count();
            let present_days = attendance_days.saturating_sub(days_absent);
            let attendance_score = present_days as f64 * config.attendance_points_per_day;

            // Newest first; source order is submission order.
            let last_entries: Vec<SiuEntry> = selected
                .iter()
                .rev()
                .take(5)
                .map(|act| SiuEntry {
                    activity: act.activity.clone(),
                    date: act.effective_date(),
                    student_count: record_entries(act),
                })
                .collect();

            SiuScore {
                admission_no: member.admission_no.clone(),
                name: member.name.clone(),
                email: member.email.clone(),
                dob: None,
                total_entries,
                timeliness_score,
                entry_count_score,
                attendance_score,
                total_points: timeliness_score + entry_count_score + attendance_score,
                present_days,
                rank: 0,
                previous_rank: None,
                last_entries,
            }
        })
        .collect();

    // Stable: tied members keep roster order.
    scores.sort_by(|a, b| {
        b.total_points
            .partial_cmp(&a.total_points)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (index, score) in scores.iter_mut().enumerate() {
        score.rank = index + 1;
    }
    scores
}

/// Student entries one record carries: the listed admission numbers, or one
/// when the field holds a single value.
fn record_entries(act: &ActivityRecord) -> usize {
    act.admission_no.entry_count().max(1)
}

/// Timely means submitted strictly before activity date 00:00 UTC plus the
/// window; the boundary instant itself is late. Records missing either
/// timestamp never qualify.
fn is_timely(act: &ActivityRecord, window_hours: i64) -> bool {
    let (Some(date), Some(submitted)) = (act.activity_date, act.submission_timestamp) else {
        return false;
    };
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        return false;
    };
    submitted < midnight.and_utc() + Duration::hours(window_hours)
}

/// Distinct calendar months seen in the activity data, newest first. Drives
/// the month filter on the SIU views.
pub fn available_months(activities: &[ActivityRecord]) -> Vec<YearMonth> {
    let mut months: Vec<YearMonth> = activities
        .iter()
        .filter_map(|act| act.effective_date())
        .map(|d| (d.year(), d.month()))
        .collect();
    months.sort_unstable();
    months.dedup();
    months.reverse();
    months
}

pub fn month_label((year, month): YearMonth) -> String {
    let name = NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.format("%B %Y").to_string());
    name.unwrap_or_else(|| format!("{year}-{month:02}"))
}

/// Wall-clock fallback for callers that do not inject a date.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
