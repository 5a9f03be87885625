use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::de::DeserializeOwned;

use crate::config::ScoringConfig;
use crate::models::{
    ActivityRecord, AttendanceRecord, MarkRecord, ProcessedStudent, Role, SiuMember, Student,
};

/// One session's worth of read-only data. The engines never mutate it; they
/// take slices in and hand fresh collections back.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub users: Vec<Student>,
    pub marks: Vec<MarkRecord>,
    pub activities: Vec<ActivityRecord>,
    pub attendance: Vec<AttendanceRecord>,
    pub siu_members: Vec<SiuMember>,
}

impl Snapshot {
    /// The academic roster: user records with the student role.
    pub fn students(&self) -> Vec<Student> {
        self.users
            .iter()
            .filter(|u| u.role == Role::Student)
            .cloned()
            .collect()
    }

    /// Students sharing a contact number with the given one (the parent
    /// dashboard's sibling list). Empty when the admission number is unknown.
    pub fn siblings_of(&self, admission_no: &str) -> Vec<&Student> {
        let Some(target) = self
            .users
            .iter()
            .find(|u| u.admission_no == admission_no && u.role == Role::Student)
        else {
            return Vec::new();
        };
        self.users
            .iter()
            .filter(|u| {
                u.role == Role::Student
                    && u.admission_no != target.admission_no
                    && u.shares_phone_with(target)
            })
            .collect()
    }
}

/// Load the JSON snapshot files from a data directory. Users, marks and
/// activities are required; attendance and the SIU roster are optional
/// (not every deployment logs them).
pub fn load_snapshot(dir: &Path) -> anyhow::Result<Snapshot> {
    Ok(Snapshot {
        users: read_json(dir.join("users.json"))?,
        marks: read_json(dir.join("marks.json"))?,
        activities: read_json(dir.join("activities.json"))?,
        attendance: read_json_optional(dir.join("attendance.json"))?,
        siu_members: read_json_optional(dir.join("siu_members.json"))?,
    })
}

/// Scoring configuration: canonical defaults, overridable from a JSON file.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ScoringConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))
        }
        None => Ok(ScoringConfig::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: PathBuf) -> anyhow::Result<Vec<T>> {
    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_json_optional<T: DeserializeOwned>(path: PathBuf) -> anyhow::Result<Vec<T>> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(Vec::new())
    }
}

/// Write the processed leaderboard as CSV, ordered by class then academic
/// rank. Returns the number of data rows written.
pub fn export_leaderboard_csv(
    processed: &[ProcessedStudent],
    path: &Path,
) -> anyhow::Result<usize> {
    let mut rows: Vec<&ProcessedStudent> = processed.iter().collect();
    rows.sort_by_key(|p| {
        (
            crate::models::class_sort_key(&p.student.class, &p.student.division),
            p.academic_rank,
        )
    });

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record([
        "admissionNo",
        "name",
        "class",
        "division",
        "house",
        "academicTotal",
        "academicRank",
        "disciplinePoints",
        "disciplineRank",
        "housePoints",
    ])?;
    for row in &rows {
        writer.write_record([
            row.student.admission_no.clone(),
            row.student.name.clone(),
            row.student.class.clone(),
            row.student.division.clone(),
            row.student
                .house
                .map(|h| h.name().to_string())
                .unwrap_or_default(),
            format!("{:.1}", row.academic_total),
            row.academic_rank.to_string(),
            format!("{:.1}", row.discipline_points),
            row.discipline_rank.to_string(),
            format!("{:.1}", row.house_points),
        ])?;
    }
    writer.flush()?;
    Ok(rows.len())
}
