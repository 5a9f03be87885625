use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::ScoringConfig;
use crate::models::{ActivityRecord, MarkRecord, ProcessedStudent, Student};

/// How many times an activity record applies to a student: 0 when either side
/// has no admission number, otherwise one per exact match (a double-listed
/// student counts twice).
pub fn occurrences(activity: &ActivityRecord, admission_no: &str) -> usize {
    if admission_no.is_empty() {
        return 0;
    }
    activity
        .admission_no
        .0
        .iter()
        .filter(|a| a.as_str() == admission_no)
        .count()
}

/// Signed discipline total for one student across all activities. Unknown
/// activity names and missing ratings contribute zero.
pub fn discipline_points(
    activities: &[ActivityRecord],
    admission_no: &str,
    config: &ScoringConfig,
) -> f64 {
    activities
        .iter()
        .map(|act| {
            occurrences(act, admission_no) as f64
                * config.activity_points(&act.activity, act.rating.0)
        })
        .sum()
}

/// Group students by (class, division), attach academic totals and discipline
/// points, and rank inside each group. Students without a mark record stay in
/// with an academic total of 0; no cross-group rank exists.
///
/// O(students × activities) per group, fine at school-roster scale.
pub fn rank_students(
    students: &[Student],
    marks: &[MarkRecord],
    activities: &[ActivityRecord],
    config: &ScoringConfig,
) -> Vec<ProcessedStudent> {
    let mut groups: BTreeMap<(String, String), Vec<&Student>> = BTreeMap::new();
    for student in students {
        groups
            .entry((student.class.clone(), student.division.clone()))
            .or_default()
            .push(student);
    }

    let mut processed = Vec::with_capacity(students.len());
    for group in groups.into_values() {
        let mut scored: Vec<ProcessedStudent> = group
            .into_iter()
            .map(|student| {
                let academic_total = marks
                    .iter()
                    .find(|m| m.admission_no == student.admission_no)
                    .map(MarkRecord::academic_total)
                    .unwrap_or(0.0);
                let discipline_points =
                    discipline_points(activities, &student.admission_no, config);
                ProcessedStudent {
                    student: student.clone(),
                    academic_total,
                    discipline_points,
                    house_points: academic_total + discipline_points,
                    academic_rank: 0,
                    discipline_rank: 0,
                }
            })
            .collect();

        // Stable sorts keep tied students in input order.
        scored.sort_by(|a, b| desc(a.academic_total, b.academic_total));
        for (index, entry) in scored.iter_mut().enumerate() {
            entry.academic_rank = index + 1;
        }
        scored.sort_by(|a, b| desc(a.discipline_points, b.discipline_points));
        for (index, entry) in scored.iter_mut().enumerate() {
            entry.discipline_rank = index + 1;
        }

        processed.extend(scored);
    }
    processed
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(admission_no: &str, class: &str, division: &str) -> Student {
        serde_json::from_value(serde_json::json!({
            "admissionNo": admission_no,
            "name": format!("Student {admission_no}"),
            "class": class,
            "division": division,
            "house": "Blue",
            "role": "student"
        }))
        .unwrap()
    }

    fn mark_record(admission_no: &str, totals: &[f64]) -> MarkRecord {
        let terms: serde_json::Map<String, serde_json::Value> = totals
            .iter()
            .enumerate()
            .map(|(i, total)| {
                (
                    format!("Term {}", i + 1),
                    serde_json::json!({"total": total, "marks": {}}),
                )
            })
            .collect();
        serde_json::from_value(serde_json::json!({
            "admissionNo": admission_no,
            "terms": terms
        }))
        .unwrap()
    }

    fn activity(name: &str, rating: f64, admission_nos: serde_json::Value) -> ActivityRecord {
        serde_json::from_value(serde_json::json!({
            "Activity": name,
            "Rating": rating,
            "admissionNo": admission_nos,
            "activityDate": "2025-07-01"
        }))
        .unwrap()
    }

    #[test]
    fn higher_academic_total_ranks_first_regardless_of_input_order() {
        let students = vec![student("102", "8", "A"), student("101", "8", "A")];
        let marks = vec![mark_record("101", &[180.0]), mark_record("102", &[150.0])];
        let config = ScoringConfig::default();

        let processed = rank_students(&students, &marks, &[], &config);
        let x = processed
            .iter()
            .find(|p| p.student.admission_no == "101")
            .unwrap();
        let y = processed
            .iter()
            .find(|p| p.student.admission_no == "102")
            .unwrap();
        assert_eq!(x.academic_rank, 1);
        assert_eq!(y.academic_rank, 2);
        assert_eq!(x.academic_total, 180.0);
    }

    #[test]
    fn multi_admission_activity_applies_fully_to_each_student() {
        let students = vec![student("101", "9", "B"), student("102", "9", "B")];
        let act = activity("Bad Words", 10.0, serde_json::json!(["101", "102"]));
        let config = ScoringConfig::default();

        let processed = rank_students(&students, &[], &[act], &config);
        for entry in &processed {
            assert_eq!(entry.discipline_points, -15.0);
        }
    }

    #[test]
    fn double_listed_student_counts_twice() {
        let act = activity("Helping Mind", 10.0, serde_json::json!(["55", "55"]));
        assert_eq!(occurrences(&act, "55"), 2);

        let config = ScoringConfig::default();
        assert_eq!(discipline_points(&[act], "55", &config), 20.0);
    }

    #[test]
    fn missing_admission_numbers_never_match() {
        let act = activity("Helping Mind", 10.0, serde_json::Value::Null);
        assert_eq!(occurrences(&act, "55"), 0);
        let act = activity("Helping Mind", 10.0, serde_json::json!("55"));
        assert_eq!(occurrences(&act, ""), 0);
    }

    #[test]
    fn student_without_mark_record_is_still_ranked() {
        let students = vec![student("1", "5", "A"), student("2", "5", "A")];
        let marks = vec![mark_record("1", &[40.0])];
        let processed = rank_students(&students, &marks, &[], &ScoringConfig::default());

        let unmarked = processed
            .iter()
            .find(|p| p.student.admission_no == "2")
            .unwrap();
        assert_eq!(unmarked.academic_total, 0.0);
        assert_eq!(unmarked.academic_rank, 2);
    }

    #[test]
    fn ranks_are_a_permutation_within_each_group() {
        let students: Vec<Student> = (1..=6)
            .map(|n| student(&n.to_string(), if n <= 3 { "7" } else { "8" }, "A"))
            .collect();
        let marks: Vec<MarkRecord> = (1..=6)
            .map(|n| mark_record(&n.to_string(), &[(n * 10) as f64]))
            .collect();
        let processed = rank_students(&students, &marks, &[], &ScoringConfig::default());

        for class in ["7", "8"] {
            let mut ranks: Vec<usize> = processed
                .iter()
                .filter(|p| p.student.class == class)
                .map(|p| p.academic_rank)
                .collect();
            ranks.sort_unstable();
            assert_eq!(ranks, vec![1, 2, 3]);
        }
    }

    #[test]
    fn ties_keep_input_order() {
        let students = vec![student("a", "6", "C"), student("b", "6", "C")];
        let marks = vec![mark_record("a", &[90.0]), mark_record("b", &[90.0])];
        let processed = rank_students(&students, &marks, &[], &ScoringConfig::default());
        assert_eq!(processed[0].student.admission_no, "a");
        assert_eq!(processed[0].academic_rank, 1);
        assert_eq!(processed[1].academic_rank, 2);
    }

    #[test]
    fn ranking_is_idempotent() {
        let students = vec![student("1", "8", "A"), student("2", "8", "A")];
        let marks = vec![mark_record("1", &[55.0]), mark_record("2", &[70.0])];
        let acts = vec![activity("Fighting", 10.0, serde_json::json!("1"))];
        let config = ScoringConfig::default();

        let first = rank_students(&students, &marks, &acts, &config);
        let second = rank_students(&students, &marks, &acts, &config);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.student.admission_no, b.student.admission_no);
            assert_eq!(a.academic_rank, b.academic_rank);
            assert_eq!(a.discipline_rank, b.discipline_rank);
            assert_eq!(a.house_points, b.house_points);
        }
    }

    #[test]
    fn house_points_combine_academic_and_discipline() {
        let students = vec![student("1", "8", "A")];
        let marks = vec![mark_record("1", &[100.0, 50.0])];
        let acts = vec![activity("Class Cleaning", 10.0, serde_json::json!("1"))];
        let processed = rank_students(&students, &marks, &acts, &ScoringConfig::default());
        assert_eq!(processed[0].academic_total, 150.0);
        assert_eq!(processed[0].discipline_points, 5.0);
        assert_eq!(processed[0].house_points, 155.0);
    }
}
