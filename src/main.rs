use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand};

mod config;
mod grades;
mod houses;
mod models;
mod ranking;
mod report;
mod siu;
mod store;

use models::{class_sort_key, responsibility_sections, ProcessedStudent, Section};

#[derive(Parser)]
#[command(name = "evalboard")]
#[command(about = "Ranking and house-points engine for the school evaluation portal", long_about = None)]
struct Cli {
    /// Directory holding the JSON snapshot files.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// Optional JSON file overriding the scoring constants and tables.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Evaluation date; defaults to today. Keeps period math reproducible.
    #[arg(long)]
    as_of: Option<NaiveDate>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-class academic and discipline leaderboards
    Rank {
        #[arg(long)]
        class: Option<String>,
        #[arg(long, requires = "class")]
        division: Option<String>,
        /// Restrict to the sections a staff designation is responsible for
        #[arg(long, conflicts_with = "class")]
        designation: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// House standings
    #[command(group(
        ArgGroup::new("scope")
            .args(["section", "class", "month"])
            .multiple(false)
    ))]
    Houses {
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long, requires = "class")]
        division: Option<String>,
        /// Activity-based points for one calendar month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
        /// Show the previous day's point movement instead of totals
        #[arg(long, default_value_t = false)]
        delta: bool,
    },
    /// SIU member data-entry leaderboard
    Siu {
        /// Score one calendar month (YYYY-MM) instead of all time
        #[arg(long)]
        month: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Show the score breakdown and recent entries for one member
        #[arg(long)]
        member: Option<String>,
    },
    /// Resolve the letter grade and CE component for one mark
    Grade {
        #[arg(long)]
        term: String,
        #[arg(long)]
        class: u32,
        #[arg(long)]
        subject: String,
        /// Mark obtained; omit for an absent entry
        #[arg(long)]
        mark: Option<f64>,
    },
    /// Students sharing a contact number with the given student
    Family {
        #[arg(long)]
        admission_no: String,
    },
    /// Generate the full markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export the processed leaderboard as CSV
    Export {
        #[arg(long, default_value = "leaderboard.csv")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = store::load_config(cli.config.as_deref())?;
    let snapshot = store::load_snapshot(&cli.data_dir)
        .with_context(|| format!("failed to load snapshot from {}", cli.data_dir.display()))?;
    let as_of = cli.as_of.unwrap_or_else(siu::today);

    let students = snapshot.students();
    let processed = ranking::rank_students(
        &students,
        &snapshot.marks,
        &snapshot.activities,
        &config,
    );

    match cli.command {
        Commands::Rank {
            class,
            division,
            designation,
            limit,
        } => {
            let sections: Option<Vec<Section>> = designation
                .as_deref()
                .and_then(responsibility_sections);
            if let Some(sections) = &sections {
                let codes: Vec<&str> = sections.iter().map(|s| s.code()).collect();
                println!("Scoped to sections: {}", codes.join(", "));
            } else if let Some(designation) = &designation {
                println!("Designation {designation:?} has no section scope; showing all classes.");
            }
            let scoped: Vec<&ProcessedStudent> = processed
                .iter()
                .filter(|p| match (&class, &sections) {
                    (Some(class), _) => {
                        p.student.class == *class
                            && division
                                .as_deref()
                                .map_or(true, |d| p.student.division == d)
                    }
                    (None, Some(sections)) => sections.contains(&p.student.section()),
                    (None, None) => true,
                })
                .collect();
            print_class_leaderboards(&scoped, limit);
        }
        Commands::Houses {
            section,
            class,
            division,
            month,
            delta,
        } => {
            let totals = if let Some(month) = month {
                let (year, month) = parse_month(&month)?;
                println!("House activity points for {}:", siu::month_label((year, month)));
                houses::monthly_activity_points(
                    &processed,
                    &snapshot.activities,
                    year,
                    month,
                    &config,
                )
            } else if delta {
                let target = as_of - chrono::Duration::days(1);
                println!("House point movement on {target}:");
                houses::daily_delta(&processed, &snapshot.activities, target, &config)
            } else {
                let scope = match (&section, &class) {
                    (Some(code), _) => {
                        let section = Section::parse(code)
                            .with_context(|| format!("unknown section {code:?}"))?;
                        houses::Scope::Section(section)
                    }
                    (None, Some(class)) => houses::Scope::Class {
                        class: class.clone(),
                        division: division.clone().unwrap_or_default(),
                    },
                    (None, None) => houses::Scope::School,
                };
                println!("House standings:");
                houses::aggregate_points(&processed, &scope)
            };

            let mut rows: Vec<_> = totals.into_iter().collect();
            rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            for (rank, (house, points)) in rows.iter().enumerate() {
                println!("{}. {} - {:.0} points", rank + 1, house, points);
            }
        }
        Commands::Siu { month, limit, member } => {
            let period = month.as_deref().map(parse_month).transpose()?;
            let scores = siu::score_members(
                &snapshot.siu_members,
                &snapshot.activities,
                &snapshot.attendance,
                &snapshot.users,
                period,
                as_of,
                &config,
            );
            if scores.is_empty() {
                println!("No SIU members in this snapshot.");
                return Ok(());
            }

            let label = period.map(siu::month_label).unwrap_or_else(|| "All-Time".to_string());
            println!("SIU member rankings ({label}):");
            for score in scores.iter().take(limit) {
                let trend = match score.previous_rank {
                    Some(prev) if prev != score.rank => format!(" (was #{prev})"),
                    _ => String::new(),
                };
                println!(
                    "{}. {} - {:.0} points, {} entries, {} days present{}",
                    score.rank,
                    score.name,
                    score.total_points,
                    score.total_entries,
                    score.present_days,
                    trend
                );
            }

            if let Some(admission_no) = member {
                let Some(score) = scores.iter().find(|s| s.admission_no == admission_no)
                else {
                    anyhow::bail!("no SIU member with admission number {admission_no}");
                };
                println!();
                println!("{} <{}>", score.name, score.email);
                println!(
                    "  timeliness {:.0} + entries {:.0} + attendance {:.0} = {:.0}",
                    score.timeliness_score,
                    score.entry_count_score,
                    score.attendance_score,
                    score.total_points
                );
                if score.last_entries.is_empty() {
                    println!("  No entries in this period.");
                }
                for entry in &score.last_entries {
                    let date = entry
                        .date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "undated".to_string());
                    println!(
                        "  {date}: {} ({} students)",
                        entry.activity, entry.student_count
                    );
                }
            }

            let months = siu::available_months(&snapshot.activities);
            if !months.is_empty() {
                let labels: Vec<String> =
                    months.into_iter().map(siu::month_label).collect();
                println!("Months with activity: {}", labels.join(", "));
            }
        }
        Commands::Grade {
            term,
            class,
            subject,
            mark,
        } => {
            let info = grades::resolve_grade(mark, &config, &term, Some(class), &subject);
            if info.is_absent {
                println!("Grade: {} (absent, out of {})", info.grade, info.max_mark);
            } else {
                println!("Grade: {} (out of {})", info.grade, info.max_mark);
            }
            match Section::of_class(Some(class)) {
                Section::Upper => {
                    println!("CE grade: {}", grades::ce_grade_up(&info.grade));
                }
                Section::High => {
                    println!(
                        "CE mark: {:.0} / {:.0}",
                        grades::ce_mark_hs(mark, info.max_mark, &config.ce),
                        config.ce.ce_max
                    );
                }
                _ => {}
            }
        }
        Commands::Family { admission_no } => {
            let siblings = snapshot.siblings_of(&admission_no);
            if siblings.is_empty() {
                println!("No students share a contact number with {admission_no}.");
            }
            for sibling in siblings {
                println!(
                    "- {} ({}, adm {})",
                    sibling.name,
                    sibling.class_label(),
                    sibling.admission_no
                );
            }
        }
        Commands::Report { out } => {
            let scores = siu::score_members(
                &snapshot.siu_members,
                &snapshot.activities,
                &snapshot.attendance,
                &snapshot.users,
                None,
                as_of,
                &config,
            );
            let report = report::build_report(
                &processed,
                &snapshot.marks,
                &snapshot.activities,
                &scores,
                &snapshot.users,
                as_of,
                &config,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { out } => {
            let written = store::export_leaderboard_csv(&processed, &out)?;
            println!("Wrote {written} rows to {}.", out.display());
        }
    }

    Ok(())
}

fn print_class_leaderboards(scoped: &[&ProcessedStudent], limit: usize) {
    if scoped.is_empty() {
        println!("No students match this scope.");
        return;
    }

    let mut groups: Vec<(String, String)> = scoped
        .iter()
        .map(|p| (p.student.class.clone(), p.student.division.clone()))
        .collect();
    groups.sort_by_key(|(c, d)| class_sort_key(c, d));
    groups.dedup();

    for (class, division) in groups {
        let mut members: Vec<&&ProcessedStudent> = scoped
            .iter()
            .filter(|p| p.student.class == class && p.student.division == division)
            .collect();
        members.sort_by_key(|p| p.academic_rank);

        println!("Class {class}-{division}:");
        for entry in members.iter().take(limit) {
            println!(
                "  {}. {} - academic {:.0}, discipline {:+.1} (rank {}), house points {:.0}",
                entry.academic_rank,
                entry.student.name,
                entry.academic_total,
                entry.discipline_points,
                entry.discipline_rank,
                entry.house_points
            );
        }
    }
}

/// "YYYY-MM" → (year, month).
fn parse_month(text: &str) -> anyhow::Result<siu::YearMonth> {
    let (year, month) = text
        .split_once('-')
        .with_context(|| format!("expected YYYY-MM, got {text:?}"))?;
    let year: i32 = year.parse().with_context(|| format!("bad year in {text:?}"))?;
    let month: u32 = month.parse().with_context(|| format!("bad month in {text:?}"))?;
    anyhow::ensure!((1..=12).contains(&month), "month out of range in {text:?}");
    Ok((year, month))
}
