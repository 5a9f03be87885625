use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate};

use crate::config::ScoringConfig;
use crate::models::{ActivityRecord, House, HouseStanding, ProcessedStudent, Section};

/// What slice of the roster a house total covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    School,
    Section(Section),
    Class { class: String, division: String },
}

impl Scope {
    fn matches(&self, entry: &ProcessedStudent) -> bool {
        match self {
            Scope::School => true,
            Scope::Section(section) => entry.student.section() == *section,
            Scope::Class { class, division } => {
                entry.student.class == *class && entry.student.division == *division
            }
        }
    }
}

/// Sum of processed house points per house within the scope. Every house
/// appears in the result even at zero; students without a recognized house
/// contribute to no bucket.
pub fn aggregate_points(
    processed: &[ProcessedStudent],
    scope: &Scope,
) -> BTreeMap<House, f64> {
    let mut totals: BTreeMap<House, f64> = House::ALL.iter().map(|h| (*h, 0.0)).collect();
    for entry in processed.iter().filter(|e| scope.matches(e)) {
        if let Some(house) = entry.student.house {
            *totals.entry(house).or_insert(0.0) += entry.house_points;
        }
    }
    totals
}

fn house_of<'a>(
    processed: &'a [ProcessedStudent],
) -> HashMap<&'a str, House> {
    processed
        .iter()
        .filter_map(|e| e.student.house.map(|h| (e.student.admission_no.as_str(), h)))
        .collect()
}

fn activity_points_by_house<F>(
    processed: &[ProcessedStudent],
    activities: &[ActivityRecord],
    keep: F,
    config: &ScoringConfig,
) -> BTreeMap<House, f64>
where
    F: Fn(&ActivityRecord) -> bool,
{
    let houses = house_of(processed);
    let mut totals: BTreeMap<House, f64> = House::ALL.iter().map(|h| (*h, 0.0)).collect();
    for act in activities.iter().filter(|a| keep(a)) {
        let points = config.activity_points(&act.activity, act.rating.0);
        for admission_no in &act.admission_no.0 {
            if let Some(house) = houses.get(admission_no.as_str()) {
                *totals.entry(*house).or_insert(0.0) += points;
            }
        }
    }
    totals
}

/// Activity-derived points per house for one calendar month, matched on the
/// activity's own date rather than when it was aggregated.
pub fn monthly_activity_points(
    processed: &[ProcessedStudent],
    activities: &[ActivityRecord],
    year: i32,
    month: u32,
    config: &ScoringConfig,
) -> BTreeMap<House, f64> {
    activity_points_by_house(
        processed,
        activities,
        |act| {
            act.effective_date()
                .is_some_and(|d| d.year() == year && d.month() == month)
        },
        config,
    )
}

/// Point movement per house for [target_date, target_date + 1 day).
pub fn daily_delta(
    processed: &[ProcessedStudent],
    activities: &[ActivityRecord],
    target_date: NaiveDate,
    config: &ScoringConfig,
) -> BTreeMap<House, f64> {
    let next_day = target_date + Duration::days(1);
    activity_points_by_house(
        processed,
        activities,
        |act| {
            act.effective_date()
                .is_some_and(|d| d >= target_date && d < next_day)
        },
        config,
    )
}

/// Ranked whole-school standings with the previous day's movement attached,
/// as shown on the live house widget.
pub fn standings(
    processed: &[ProcessedStudent],
    activities: &[ActivityRecord],
    as_of: NaiveDate,
    config: &ScoringConfig,
) -> Vec<HouseStanding> {
    let totals = aggregate_points(processed, &Scope::School);
    let deltas = daily_delta(processed, activities, as_of - Duration::days(1), config);

    let mut rows: Vec<HouseStanding> = totals
        .into_iter()
        .map(|(house, total_points)| HouseStanding {
            house,
            total_points,
            rank: 0,
            previous_day_delta: deltas.get(&house).copied().unwrap_or(0.0),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_points
            .partial_cmp(&a.total_points)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (index, row) in rows.iter_mut().enumerate() {
        row.rank = index + 1;
    }
    rows
}

/// Accumulated activity points per activity name across one house's members,
/// sorted best-first. Feeds the per-house top positive/negative lists.
pub fn activity_breakdown(
    processed: &[ProcessedStudent],
    activities: &[ActivityRecord],
    house: House,
    config: &ScoringConfig,
) -> Vec<(String, f64)> {
    let members: std::collections::HashSet<&str> = processed
        .iter()
        .filter(|e| e.student.house == Some(house))
        .map(|e| e.student.admission_no.as_str())
        .collect();

    let mut by_activity: BTreeMap<String, f64> = BTreeMap::new();
    for act in activities {
        let hits = act
            .admission_no
            .0
            .iter()
            .filter(|a| members.contains(a.as_str()))
            .count();
        if hits > 0 {
            let points = config.activity_points(&act.activity, act.rating.0) * hits as f64;
            *by_activity.entry(act.activity.clone()).or_insert(0.0) += points;
        }
    }

    let mut rows: Vec<(String, f64)> = by_activity.into_iter().collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    rows
}
