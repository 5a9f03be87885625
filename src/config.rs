use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::grades::TermKind;
use crate::models::Section;

/// Every tuning constant the engines use lives here so that the historical
/// formula drift (rating out of 5 vs 10, shifting point values) is a matter
/// of configuration, not code. The defaults are the final-revision values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Upper end of the activity rating scale; ratings are prorated against
    /// this before multiplying by the rule-table base points.
    pub rating_scale_max: f64,
    /// SIU: points per student entry submitted inside the timeliness window.
    pub timeliness_points_per_entry: f64,
    /// SIU: hours after the activity date (00:00 UTC) within which a
    /// submission counts as timely. The boundary itself is late.
    pub timeliness_window_hours: i64,
    /// SIU: points per student entry regardless of timing.
    pub entry_points_per_entry: f64,
    /// SIU: points per day present in the attendance scope.
    pub attendance_points_per_day: f64,
    /// Activity name to signed base points. Names not in the table score
    /// zero.
    pub activity_rules: HashMap<String, f64>,
    pub grades: GradeConfig,
    pub max_marks: MaxMarkTable,
    pub ce: CeConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            rating_scale_max: 10.0,
            timeliness_points_per_entry: 10.0,
            timeliness_window_hours: 48,
            entry_points_per_entry: 5.0,
            attendance_points_per_day: 3.0,
            activity_rules: default_activity_rules(),
            grades: GradeConfig::default(),
            max_marks: MaxMarkTable::default(),
            ce: CeConfig::default(),
        }
    }
}

impl ScoringConfig {
    /// Points one attribution of an activity is worth: prorated rating times
    /// the rule-table base value. Unknown activity or missing rating → 0.
    pub fn activity_points(&self, activity: &str, rating: Option<f64>) -> f64 {
        let base = self.activity_rules.get(activity).copied().unwrap_or(0.0);
        if self.rating_scale_max == 0.0 {
            return 0.0;
        }
        (rating.unwrap_or(0.0) / self.rating_scale_max) * base
    }
}

fn default_activity_rules() -> HashMap<String, f64> {
    [
        ("Class Cleaning", 5.0),
        ("Assembly Appearance", 5.0),
        ("Response in Class Activities", 5.0),
        ("Competitive Winner", 10.0),
        ("Extra Curricular Activities", 10.0),
        ("Helping Mind", 10.0),
        ("Class Performance", 10.0),
        ("Participation in common activities", 10.0),
        ("Participation in Kalolsavam & Sports/ Science fair", 10.0),
        ("First Prize in any Event", 50.0),
        ("Second Prize in any Event", 30.0),
        ("Third Prize in any Event", 20.0),
        ("Bad Words", -15.0),
        ("Misbehaviour towards teachers", -15.0),
        ("Fighting", -20.0),
        ("Misbehaviour in public place", -20.0),
        ("Without ID Card", -10.0),
        ("Indiscipline", -10.0),
        ("Misbehaviour in Assembly", -10.0),
        ("Indisciplinary activity at anytime", -10.0),
        ("Personal Hygiene", -10.0),
        ("Incomplete Uniform", -5.0),
        ("Missing Homework", -5.0),
        ("Play during interval", -5.0),
    ]
    .into_iter()
    .map(|(name, points)| (name.to_string(), points))
    .collect()
}

/// One row of a grade-threshold table: the lowest percentage that still earns
/// the grade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub min_percent: f64,
    pub grade: String,
}

fn bands(rows: &[(f64, &str)]) -> Vec<GradeBand> {
    rows.iter()
        .map(|(min_percent, grade)| GradeBand {
            min_percent: *min_percent,
            grade: (*grade).to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GradeConfig {
    /// Nine-band table used by most classes, highest threshold first.
    pub default_bands: Vec<GradeBand>,
    /// Compressed five-band table for the Upper section and class 8.
    pub compressed_bands: Vec<GradeBand>,
}

impl Default for GradeConfig {
    fn default() -> Self {
        GradeConfig {
            default_bands: bands(&[
                (90.0, "A+"),
                (80.0, "A"),
                (70.0, "B+"),
                (60.0, "B"),
                (50.0, "C+"),
                (40.0, "C"),
                (30.0, "D+"),
                (20.0, "D"),
                (0.0, "E"),
            ]),
            compressed_bands: bands(&[
                (80.0, "A"),
                (60.0, "B"),
                (40.0, "C"),
                (30.0, "D"),
                (0.0, "E"),
            ]),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassMaxMarks {
    pub subjects: HashMap<String, u32>,
    pub default: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SectionMaxMarks {
    pub classes: HashMap<u32, ClassMaxMarks>,
    pub default: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TermMaxMarks {
    pub sections: HashMap<Section, SectionMaxMarks>,
    pub default: Option<u32>,
}

/// Max achievable mark, layered per term → section → class → subject with
/// defaults at every layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaxMarkTable {
    pub terms: HashMap<TermKind, TermMaxMarks>,
    pub default: u32,
}

impl Default for MaxMarkTable {
    fn default() -> Self {
        let mut terms = HashMap::new();
        for term in [
            TermKind::MonthlyExam01,
            TermKind::FirstMidTerm,
            TermKind::SecondMidTerm,
        ] {
            terms.insert(
                term,
                TermMaxMarks {
                    default: Some(20),
                    ..TermMaxMarks::default()
                },
            );
        }

        let hs_8 = ClassMaxMarks {
            subjects: [("Phy.", 20), ("Chem.", 20), ("Bio.", 20)]
                .into_iter()
                .map(|(s, m)| (s.to_string(), m))
                .collect(),
            default: Some(40),
        };
        let hs_senior = ClassMaxMarks {
            subjects: [("English", 80), ("S.S.", 80), ("Maths", 80)]
                .into_iter()
                .map(|(s, m)| (s.to_string(), m))
                .collect(),
            default: Some(40),
        };

        let mut first_term_sections = HashMap::new();
        first_term_sections.insert(
            Section::Lower,
            SectionMaxMarks {
                default: Some(25),
                ..SectionMaxMarks::default()
            },
        );
        first_term_sections.insert(
            Section::Upper,
            SectionMaxMarks {
                default: Some(30),
                ..SectionMaxMarks::default()
            },
        );
        first_term_sections.insert(
            Section::High,
            SectionMaxMarks {
                classes: [(8, hs_8), (9, hs_senior.clone()), (10, hs_senior)]
                    .into_iter()
                    .collect(),
                default: None,
            },
        );
        terms.insert(
            TermKind::FirstTerm,
            TermMaxMarks {
                sections: first_term_sections,
                default: None,
            },
        );

        MaxMarkTable { terms, default: 100 }
    }
}

impl MaxMarkTable {
    /// Fallback chain: (term, section, class, subject) → (term, section,
    /// class) → (term, section) → (term) → global default.
    pub fn resolve(
        &self,
        term: Option<TermKind>,
        section: Section,
        class_level: Option<u32>,
        subject: &str,
    ) -> u32 {
        let Some(term_marks) = term.and_then(|t| self.terms.get(&t)) else {
            return self.default;
        };
        let class_marks = term_marks
            .sections
            .get(&section)
            .and_then(|s| class_level.and_then(|level| s.classes.get(&level)));

        class_marks
            .and_then(|c| c.subjects.get(subject).copied())
            .or_else(|| class_marks.and_then(|c| c.default))
            .or_else(|| term_marks.sections.get(&section).and_then(|s| s.default))
            .or(term_marks.default)
            .unwrap_or(self.default)
    }
}

/// Continuous-evaluation scaling for High School marks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CeConfig {
    pub ce_max: f64,
    /// Exams at or above this max mark use the higher floor.
    pub high_tier_threshold: u32,
    pub floor_high_tier: f64,
    pub floor_default: f64,
}

impl Default for CeConfig {
    fn default() -> Self {
        CeConfig {
            ce_max: 20.0,
            high_tier_threshold: 80,
            floor_high_tier: 8.0,
            floor_default: 7.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_points_prorate_by_rating() {
        let config = ScoringConfig::default();
        // Bad Words at full rating keeps the full -15.
        assert_eq!(config.activity_points("Bad Words", Some(10.0)), -15.0);
        assert_eq!(config.activity_points("Bad Words", Some(5.0)), -7.5);
        assert_eq!(config.activity_points("Helping Mind", Some(10.0)), 10.0);
    }

    #[test]
    fn unknown_activity_or_missing_rating_scores_zero() {
        let config = ScoringConfig::default();
        assert_eq!(config.activity_points("Unlisted Thing", Some(10.0)), 0.0);
        assert_eq!(config.activity_points("Fighting", None), 0.0);
    }

    #[test]
    fn legacy_rating_scale_is_an_override_away() {
        let config = ScoringConfig {
            rating_scale_max: 5.0,
            ..ScoringConfig::default()
        };
        assert_eq!(config.activity_points("Class Cleaning", Some(5.0)), 5.0);
    }

    #[test]
    fn config_overrides_merge_over_defaults() {
        let config: ScoringConfig =
            serde_json::from_str(r#"{"timelinessPointsPerEntry": 12.5}"#).unwrap();
        assert_eq!(config.timeliness_points_per_entry, 12.5);
        // Untouched fields keep their canonical values.
        assert_eq!(config.entry_points_per_entry, 5.0);
        assert!(!config.activity_rules.is_empty());
    }

    #[test]
    fn max_mark_fallback_chain() {
        let table = MaxMarkTable::default();
        // Exact subject hit.
        assert_eq!(
            table.resolve(Some(TermKind::FirstTerm), Section::High, Some(9), "Maths"),
            80
        );
        // Class default when the subject is not listed.
        assert_eq!(
            table.resolve(Some(TermKind::FirstTerm), Section::High, Some(9), "Hindi"),
            40
        );
        // Section default when the class is not listed.
        assert_eq!(
            table.resolve(Some(TermKind::FirstTerm), Section::Upper, Some(6), "Maths"),
            30
        );
        // Term default for the flat monthly exams.
        assert_eq!(
            table.resolve(Some(TermKind::MonthlyExam01), Section::Lower, Some(2), "Mal I"),
            20
        );
        // Unknown term falls all the way to the global default.
        assert_eq!(table.resolve(None, Section::High, Some(9), "Maths"), 100);
    }
}
