use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

/// House affiliations are a closed set; anything else in the data is treated
/// as "no house" and excluded from house aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum House {
    Blue,
    Green,
    Rose,
    Yellow,
}

impl House {
    pub const ALL: [House; 4] = [House::Blue, House::Green, House::Rose, House::Yellow];

    pub fn parse(value: &str) -> Option<House> {
        match value.trim().to_ascii_lowercase().as_str() {
            "blue" => Some(House::Blue),
            "green" => Some(House::Green),
            "rose" => Some(House::Rose),
            "yellow" => Some(House::Yellow),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            House::Blue => "Blue",
            House::Green => "Green",
            House::Rose => "Rose",
            House::Yellow => "Yellow",
        }
    }
}

impl std::fmt::Display for House {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// School section bands derived from the numeric class level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, Deserialize,
)]
pub enum Section {
    Lower,
    Upper,
    High,
    Other,
}

impl Section {
    pub fn of_class(level: Option<u32>) -> Section {
        match level {
            Some(1..=4) => Section::Lower,
            Some(5..=7) => Section::Upper,
            Some(8..=10) => Section::High,
            _ => Section::Other,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Section::Lower => "LP",
            Section::Upper => "UP",
            Section::High => "HS",
            Section::Other => "Other",
        }
    }

    pub fn parse(value: &str) -> Option<Section> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LP" | "LOWER" => Some(Section::Lower),
            "UP" | "UPPER" => Some(Section::Upper),
            "HS" | "HIGH" => Some(Section::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Staff,
    Siu,
    #[serde(other)]
    Unknown,
}

/// Admission-number fields arrive as a string, a number, a list of either, or
/// nothing at all. Everything is normalized to strings; an empty list means
/// the record names nobody.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdmissionNos(pub Vec<String>);

impl AdmissionNos {
    pub fn contains(&self, admission_no: &str) -> bool {
        self.0.iter().any(|a| a == admission_no)
    }

    /// One entry per listed admission number; a double-listed student counts
    /// twice.
    pub fn entry_count(&self) -> usize {
        self.0.len()
    }
}

impl<'de> Deserialize<'de> for AdmissionNos {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(AdmissionNos(flatten_scalars(&value)))
    }
}

fn flatten_scalars(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    }
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn de_flex_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value).unwrap_or_default())
}

/// Marks in the source data are hand-entered; anything non-numeric ("Ab",
/// null, a stray string) reads as absent rather than failing the load.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Mark(pub Option<f64>);

impl<'de> Deserialize<'de> for Mark {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Mark(value.as_f64()))
    }
}

fn de_lenient_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_date))
}

fn de_lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(parse_timestamp))
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
        .or_else(|| {
            parse_date(text)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

fn de_house<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<House>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().and_then(House::parse))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(deserialize_with = "de_flex_string")]
    pub admission_no: String,
    pub name: String,
    #[serde(deserialize_with = "de_flex_string")]
    pub class: String,
    #[serde(default, deserialize_with = "de_flex_string")]
    pub division: String,
    #[serde(default, deserialize_with = "de_house")]
    pub house: Option<House>,
    #[serde(default)]
    pub phone: AdmissionNos,
    #[serde(default, deserialize_with = "de_lenient_date")]
    pub dob: Option<NaiveDate>,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub designation: Option<String>,
}

fn default_role() -> Role {
    Role::Unknown
}

impl Student {
    pub fn class_level(&self) -> Option<u32> {
        self.class.trim().parse().ok()
    }

    pub fn section(&self) -> Section {
        Section::of_class(self.class_level())
    }

    pub fn class_label(&self) -> String {
        if self.division.is_empty() {
            self.class.clone()
        } else {
            format!("{}-{}", self.class, self.division)
        }
    }

    /// Families share contact numbers, so two students with any phone in
    /// common are treated as siblings.
    pub fn shares_phone_with(&self, other: &Student) -> bool {
        self.phone.0.iter().any(|p| other.phone.contains(p))
    }
}

/// Ordering key that puts "10-A" after "9-B": numeric class first, then
/// division.
pub fn class_sort_key(class: &str, division: &str) -> (u32, String) {
    (class.trim().parse().unwrap_or(u32::MAX), division.to_string())
}

/// Sections a staff member is responsible for, from their designation.
pub fn responsibility_sections(designation: &str) -> Option<Vec<Section>> {
    match designation {
        "LPST" => Some(vec![Section::Lower]),
        "UPST" => Some(vec![Section::Upper]),
        d if d.starts_with("HST") => Some(vec![Section::High]),
        "PET" | "Drawing Teacher" => Some(vec![Section::Upper, Section::High]),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TermRecord {
    #[serde(default)]
    pub total: Mark,
    #[serde(default)]
    pub rank: Mark,
    #[serde(default)]
    pub marks: std::collections::BTreeMap<String, Mark>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRecord {
    #[serde(deserialize_with = "de_flex_string")]
    pub admission_no: String,
    #[serde(default)]
    pub terms: std::collections::BTreeMap<String, TermRecord>,
}

impl MarkRecord {
    /// Sum of the numeric term totals; absent terms contribute nothing.
    pub fn academic_total(&self) -> f64 {
        self.terms.values().filter_map(|t| t.total.0).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityRecord {
    #[serde(rename = "Activity")]
    pub activity: String,
    #[serde(rename = "Rating", default)]
    pub rating: Mark,
    #[serde(rename = "admissionNo", default)]
    pub admission_no: AdmissionNos,
    #[serde(rename = "activityDate", default, deserialize_with = "de_lenient_date")]
    pub activity_date: Option<NaiveDate>,
    #[serde(
        rename = "submissionTimestamp",
        default,
        deserialize_with = "de_lenient_timestamp"
    )]
    pub submission_timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "submittedBy", default)]
    pub submitted_by: Option<String>,
}

impl ActivityRecord {
    /// The date the event belongs to; falls back to the submission day when
    /// the activity date was not filled in.
    pub fn effective_date(&self) -> Option<NaiveDate> {
        self.activity_date
            .or_else(|| self.submission_timestamp.map(|ts| ts.date_naive()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default, deserialize_with = "de_lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub absentees: AdmissionNos,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiuMember {
    #[serde(deserialize_with = "de_flex_string")]
    pub admission_no: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ProcessedStudent {
    pub student: Student,
    pub academic_total: f64,
    pub discipline_points: f64,
    pub house_points: f64,
    pub academic_rank: usize,
    pub discipline_rank: usize,
}

#[derive(Debug, Clone)]
pub struct SiuEntry {
    pub activity: String,
    pub date: Option<NaiveDate>,
    pub student_count: usize,
}

#[derive(Debug, Clone)]
pub struct SiuScore {
    pub admission_no: String,
    pub name: String,
    pub email: String,
    pub dob: Option<NaiveDate>,
    pub total_entries: usize,
    pub timeliness_score: f64,
    pub entry_count_score: f64,
    pub attendance_score: f64,
    pub total_points: f64,
    pub present_days: usize,
    pub rank: usize,
    pub previous_rank: Option<usize>,
    pub last_entries: Vec<SiuEntry>,
}

#[derive(Debug, Clone)]
pub struct HouseStanding {
    pub house: House,
    pub total_points: f64,
    pub rank: usize,
    pub previous_day_delta: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admission_numbers_normalize_strings_and_numbers() {
        let record: ActivityRecord = serde_json::from_str(
            r#"{"Activity": "Class Cleaning", "Rating": 5, "admissionNo": [101, "102", null]}"#,
        )
        .unwrap();
        assert_eq!(record.admission_no.0, vec!["101", "102"]);
        assert_eq!(record.admission_no.entry_count(), 2);
    }

    #[test]
    fn scalar_admission_number_counts_once() {
        let record: ActivityRecord =
            serde_json::from_str(r#"{"Activity": "Fighting", "admissionNo": 205}"#).unwrap();
        assert!(record.admission_no.contains("205"));
        assert_eq!(record.admission_no.entry_count(), 1);
    }

    #[test]
    fn non_numeric_mark_reads_as_absent() {
        let record: MarkRecord = serde_json::from_str(
            r#"{"admissionNo": "7", "terms": {"First Term Exam": {"total": "Ab", "marks": {"Maths": null, "English": 72}}}}"#,
        )
        .unwrap();
        let term = &record.terms["First Term Exam"];
        assert_eq!(term.total.0, None);
        assert_eq!(term.marks["Maths"].0, None);
        assert_eq!(term.marks["English"].0, Some(72.0));
        assert_eq!(record.academic_total(), 0.0);
    }

    #[test]
    fn section_bands_follow_class_level() {
        assert_eq!(Section::of_class(Some(1)), Section::Lower);
        assert_eq!(Section::of_class(Some(4)), Section::Lower);
        assert_eq!(Section::of_class(Some(5)), Section::Upper);
        assert_eq!(Section::of_class(Some(7)), Section::Upper);
        assert_eq!(Section::of_class(Some(8)), Section::High);
        assert_eq!(Section::of_class(Some(10)), Section::High);
        assert_eq!(Section::of_class(Some(11)), Section::Other);
        assert_eq!(Section::of_class(None), Section::Other);
    }

    #[test]
    fn unknown_house_reads_as_none() {
        let student: Student = serde_json::from_str(
            r#"{"admissionNo": 9, "name": "T", "class": "8", "division": "A", "house": "Crimson"}"#,
        )
        .unwrap();
        assert_eq!(student.house, None);
        assert_eq!(student.admission_no, "9");
    }

    #[test]
    fn class_ordering_is_numeric_then_division() {
        let mut labels = vec![("9", "B"), ("10", "A"), ("2", "C"), ("9", "A")];
        labels.sort_by_key(|(c, d)| class_sort_key(c, d));
        assert_eq!(labels, vec![("2", "C"), ("9", "A"), ("9", "B"), ("10", "A")]);
    }

    #[test]
    fn designation_maps_to_sections() {
        assert_eq!(responsibility_sections("LPST"), Some(vec![Section::Lower]));
        assert_eq!(responsibility_sections("HST (Maths)"), Some(vec![Section::High]));
        assert_eq!(
            responsibility_sections("PET"),
            Some(vec![Section::Upper, Section::High])
        );
        assert_eq!(responsibility_sections("Clerk"), None);
    }

    #[test]
    fn shared_phone_marks_siblings() {
        let a: Student = serde_json::from_str(
            r#"{"admissionNo": "1", "name": "A", "class": "3", "phone": ["944", "955"]}"#,
        )
        .unwrap();
        let b: Student = serde_json::from_str(
            r#"{"admissionNo": "2", "name": "B", "class": "6", "phone": "955"}"#,
        )
        .unwrap();
        let c: Student = serde_json::from_str(
            r#"{"admissionNo": "3", "name": "C", "class": "6", "phone": "966"}"#,
        )
        .unwrap();
        assert!(a.shares_phone_with(&b));
        assert!(!a.shares_phone_with(&c));
    }

    #[test]
    fn timestamp_parsing_accepts_common_shapes() {
        assert!(parse_timestamp("2025-06-12T09:30:00Z").is_some());
        assert!(parse_timestamp("2025-06-12T09:30:00+05:30").is_some());
        assert!(parse_timestamp("2025-06-12").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }
}
