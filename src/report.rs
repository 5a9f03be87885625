use std::fmt::Write;

use chrono::{Datelike, NaiveDate};

use crate::config::ScoringConfig;
use crate::grades::TermKind;
use crate::houses;
use crate::models::{
    class_sort_key, ActivityRecord, House, MarkRecord, ProcessedStudent, SiuScore, Student,
};

/// Full markdown report: house standings with yesterday's movement, per-house
/// activity detail, class leaderboards, the SIU member ranking, and today's
/// birthdays.
pub fn build_report(
    processed: &[ProcessedStudent],
    marks: &[MarkRecord],
    activities: &[ActivityRecord],
    siu_scores: &[SiuScore],
    users: &[Student],
    as_of: NaiveDate,
    config: &ScoringConfig,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# School Evaluation Report");
    let _ = writeln!(output, "Generated for {as_of}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## House Standings");

    let standings = houses::standings(processed, activities, as_of, config);
    for row in &standings {
        let movement = if row.previous_day_delta > 0.0 {
            format!(" (prev day +{:.0})", row.previous_day_delta)
        } else if row.previous_day_delta < 0.0 {
            format!(" (prev day {:.0})", row.previous_day_delta)
        } else {
            String::new()
        };
        let _ = writeln!(
            output,
            "{}. {} - {:.0} points{}",
            row.rank, row.house, row.total_points, movement
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## House Detail");
    for house in House::ALL {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {house}");
        let breakdown = houses::activity_breakdown(processed, activities, house, config);
        let positives: Vec<_> = breakdown.iter().filter(|(_, p)| *p > 0.0).take(3).collect();
        let mut negatives: Vec<_> = breakdown.iter().filter(|(_, p)| *p < 0.0).collect();
        negatives.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if positives.is_empty() && negatives.is_empty() {
            let _ = writeln!(output, "No logged activities.");
            continue;
        }
        for (name, points) in positives {
            let _ = writeln!(output, "- {name}: +{points:.0}");
        }
        for (name, points) in negatives.into_iter().take(3) {
            let _ = writeln!(output, "- {name}: {points:.0}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Class Leaderboards");

    let mut groups: Vec<(String, String)> = processed
        .iter()
        .map(|p| (p.student.class.clone(), p.student.division.clone()))
        .collect();
    groups.sort_by_key(|(c, d)| class_sort_key(c, d));
    groups.dedup();

    if groups.is_empty() {
        let _ = writeln!(output, "No students in this snapshot.");
    }
    for (class, division) in groups {
        let mut members: Vec<&ProcessedStudent> = processed
            .iter()
            .filter(|p| p.student.class == class && p.student.division == division)
            .collect();
        members.sort_by_key(|p| p.academic_rank);

        let _ = writeln!(output);
        let _ = writeln!(output, "### Class {class}-{division}");
        for entry in members.iter().take(5) {
            // The offline-produced First Term rank, when the record carries one.
            let official = marks
                .iter()
                .find(|m| m.admission_no == entry.student.admission_no)
                .and_then(|m| {
                    m.terms
                        .iter()
                        .find(|(label, _)| TermKind::parse(label) == Some(TermKind::FirstTerm))
                })
                .and_then(|(_, term)| term.rank.0);
            let official = official
                .map(|rank| format!(", term rank {rank:.0}"))
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "{}. {} - academic {:.0}, discipline {:+.1} (rank {}){}",
                entry.academic_rank,
                entry.student.name,
                entry.academic_total,
                entry.discipline_points,
                entry.discipline_rank,
                official
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## SIU Member Rankings");

    if siu_scores.is_empty() {
        let _ = writeln!(output, "No SIU members in this snapshot.");
    }
    for score in siu_scores {
        let trend = match score.previous_rank {
            Some(prev) if prev > score.rank => format!(" (up from #{prev})"),
            Some(prev) if prev < score.rank => format!(" (down from #{prev})"),
            _ => String::new(),
        };
        let birthday = score
            .dob
            .is_some_and(|d| d.month() == as_of.month() && d.day() == as_of.day());
        let _ = writeln!(
            output,
            "{}. {} - {:.0} points ({} entries, timeliness {:.0}, attendance {:.0}){}{}",
            score.rank,
            score.name,
            score.total_points,
            score.total_entries,
            score.timeliness_score,
            score.attendance_score,
            trend,
            if birthday { " (birthday today)" } else { "" }
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Birthdays Today");

    let mut birthdays: Vec<&Student> = users
        .iter()
        .filter(|u| {
            u.dob
                .is_some_and(|d| d.month() == as_of.month() && d.day() == as_of.day())
        })
        .collect();
    birthdays.sort_by(|a, b| a.name.cmp(&b.name));

    if birthdays.is_empty() {
        let _ = writeln!(output, "No birthdays today.");
    }
    for person in birthdays {
        let label = if person.class.is_empty() {
            person
                .designation
                .clone()
                .unwrap_or_else(|| "Staff".to_string())
        } else {
            person.class_label()
        };
        let _ = writeln!(output, "- {} ({label})", person.name);
    }

    output
}
