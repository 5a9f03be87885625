use serde::{Deserialize, Serialize};

use crate::config::{CeConfig, ScoringConfig};
use crate::models::Section;

/// The known exam terms. Source data never spells these consistently, so the
/// tolerant matching lives in [`TermKind::parse`] at the ingestion edge; the
/// max-mark table and everything downstream key on the enum exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermKind {
    MonthlyExam01,
    FirstMidTerm,
    SecondMidTerm,
    FirstTerm,
}

impl TermKind {
    /// Case-insensitive substring identification. "First mid" must be checked
    /// before "first term" or mid-term labels would never match.
    pub fn parse(label: &str) -> Option<TermKind> {
        let label = label.to_lowercase();
        if label.contains("monthly") {
            Some(TermKind::MonthlyExam01)
        } else if label.contains("first mid") {
            Some(TermKind::FirstMidTerm)
        } else if label.contains("second mid") {
            Some(TermKind::SecondMidTerm)
        } else if label.contains("first term") {
            Some(TermKind::FirstTerm)
        } else {
            None
        }
    }
}

pub const ABSENT_GRADE: &str = "Ab";

#[derive(Debug, Clone, PartialEq)]
pub struct GradeInfo {
    pub grade: String,
    pub is_absent: bool,
    pub max_mark: u32,
}

/// Max achievable mark for one subject cell, after term identification and
/// the layered table fallback.
pub fn max_mark(
    config: &ScoringConfig,
    term_label: &str,
    class_level: Option<u32>,
    subject: &str,
) -> u32 {
    config.max_marks.resolve(
        TermKind::parse(term_label),
        Section::of_class(class_level),
        class_level,
        subject,
    )
}

/// Letter grade for a mark. An absent mark is always the `Ab` sentinel and
/// never a letter or a zero; otherwise the percentage of max is scanned
/// against the section's threshold table, highest band first.
pub fn resolve_grade(
    mark: Option<f64>,
    config: &ScoringConfig,
    term_label: &str,
    class_level: Option<u32>,
    subject: &str,
) -> GradeInfo {
    let max = max_mark(config, term_label, class_level, subject);
    let Some(mark) = mark else {
        return GradeInfo {
            grade: ABSENT_GRADE.to_string(),
            is_absent: true,
            max_mark: max,
        };
    };

    let percentage = if max == 0 { 0.0 } else { (mark / max as f64) * 100.0 };
    let section = Section::of_class(class_level);
    let bands = if section == Section::Upper || class_level == Some(8) {
        &config.grades.compressed_bands
    } else {
        &config.grades.default_bands
    };
    let grade = bands
        .iter()
        .find(|band| percentage >= band.min_percent)
        .map(|band| band.grade.clone())
        .unwrap_or_else(|| "E".to_string());

    GradeInfo {
        grade,
        is_absent: false,
        max_mark: max,
    }
}

const UP_GRADE_ORDER: [&str; 5] = ["E", "D", "C", "B", "A"];

/// Continuous-evaluation grade for Upper Primary: the terminal grade, floored
/// at C. Absent or unrecognized grades also floor at C.
pub fn ce_grade_up(te_grade: &str) -> String {
    let floor = UP_GRADE_ORDER.iter().position(|g| *g == "C").unwrap_or(0);
    match UP_GRADE_ORDER.iter().position(|g| *g == te_grade) {
        Some(index) if index >= floor => te_grade.to_string(),
        _ => "C".to_string(),
    }
}

/// Continuous-evaluation mark for High School: percentage breakpoints against
/// the terminal mark, never below the tier floor.
pub fn ce_mark_hs(mark: Option<f64>, max_mark: u32, ce: &CeConfig) -> f64 {
    let floor = if max_mark >= ce.high_tier_threshold {
        ce.floor_high_tier
    } else {
        ce.floor_default
    };
    let Some(mark) = mark else { return floor };
    if max_mark == 0 {
        return floor;
    }

    let percentage = (mark / max_mark as f64) * 100.0;
    if percentage >= 90.0 {
        ce.ce_max
    } else if percentage >= 75.0 {
        (ce.ce_max * 0.9).round()
    } else if percentage >= 60.0 {
        (ce.ce_max * 0.8).round()
    } else {
        floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_labels_match_by_substring() {
        assert_eq!(TermKind::parse("First Term Exam"), Some(TermKind::FirstTerm));
        assert_eq!(TermKind::parse("first term"), Some(TermKind::FirstTerm));
        assert_eq!(
            TermKind::parse("First Mid Term Exam"),
            Some(TermKind::FirstMidTerm)
        );
        assert_eq!(
            TermKind::parse("SECOND MID TERM"),
            Some(TermKind::SecondMidTerm)
        );
        assert_eq!(
            TermKind::parse("Monthly Exam 01"),
            Some(TermKind::MonthlyExam01)
        );
        assert_eq!(TermKind::parse("Annual Exam"), None);
    }

    #[test]
    fn absent_mark_is_always_the_sentinel() {
        let config = ScoringConfig::default();
        for (term, class, subject) in [
            ("First Term Exam", Some(9), "Maths"),
            ("Monthly Exam 01", Some(2), "Mal I"),
            ("Unknown Exam", None, "Anything"),
        ] {
            let info = resolve_grade(None, &config, term, class, subject);
            assert!(info.is_absent);
            assert_eq!(info.grade, ABSENT_GRADE);
        }
    }

    #[test]
    fn nine_band_table_for_lower_and_senior_high() {
        let config = ScoringConfig::default();
        // Class 9 Maths is out of 80: 72/80 = 90% → A+.
        let info = resolve_grade(Some(72.0), &config, "First Term Exam", Some(9), "Maths");
        assert_eq!(info.grade, "A+");
        assert_eq!(info.max_mark, 80);
        // 36/80 = 45% → C.
        let info = resolve_grade(Some(36.0), &config, "First Term Exam", Some(9), "Maths");
        assert_eq!(info.grade, "C");
    }

    #[test]
    fn compressed_table_for_upper_section_and_class_8() {
        let config = ScoringConfig::default();
        // Class 6 First Term is out of 30: 24/30 = 80% → A on the 5-band table.
        let info = resolve_grade(Some(24.0), &config, "First Term Exam", Some(6), "Hindi");
        assert_eq!(info.grade, "A");
        assert_eq!(info.max_mark, 30);
        // Class 8 Phy. is out of 20: 10/20 = 50% → C (not C+ from the 9-band).
        let info = resolve_grade(Some(10.0), &config, "First Term Exam", Some(8), "Phy.");
        assert_eq!(info.grade, "C");
    }

    #[test]
    fn threshold_is_inclusive_at_the_band_edge() {
        let config = ScoringConfig::default();
        // Exactly 80% in the compressed table is an A.
        let info = resolve_grade(Some(16.0), &config, "First Term Exam", Some(8), "Chem.");
        assert_eq!(info.grade, "A");
    }

    #[test]
    fn ce_grade_up_floors_at_c() {
        assert_eq!(ce_grade_up("A"), "A");
        assert_eq!(ce_grade_up("B"), "B");
        assert_eq!(ce_grade_up("C"), "C");
        assert_eq!(ce_grade_up("D"), "C");
        assert_eq!(ce_grade_up("E"), "C");
        assert_eq!(ce_grade_up(ABSENT_GRADE), "C");
    }

    #[test]
    fn ce_mark_hs_breakpoints() {
        let ce = CeConfig::default();
        assert_eq!(ce_mark_hs(Some(36.0), 40, &ce), 20.0); // 90%
        assert_eq!(ce_mark_hs(Some(30.0), 40, &ce), 18.0); // 75%
        assert_eq!(ce_mark_hs(Some(24.0), 40, &ce), 16.0); // 60%
        assert_eq!(ce_mark_hs(Some(10.0), 40, &ce), 7.0); // below → floor
    }

    #[test]
    fn ce_mark_hs_floor_depends_on_tier() {
        let ce = CeConfig::default();
        assert_eq!(ce_mark_hs(None, 40, &ce), 7.0);
        assert_eq!(ce_mark_hs(None, 80, &ce), 8.0);
        assert_eq!(ce_mark_hs(Some(20.0), 80, &ce), 8.0); // 25%, high tier floor
    }
}
