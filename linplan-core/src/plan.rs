//! Issue filtering, grouping and bucketing for planning sheets

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{Datelike, Duration, NaiveDate};

use crate::constants::{
    CANCELED_STATE_TYPES, DESCRIPTION_MAX_CHARS, NO_CYCLE, NO_INITIATIVE, NO_PROJECT, UNASSIGNED,
};
use crate::linear::Issue;

/// Convert email-style names to proper names.
///
/// `john.doe@company.com` becomes `John Doe`, or `John` with `first_only`.
/// Plain names pass through, trimmed to the first word with `first_only`.
pub fn format_name(name: &str, first_only: bool) -> String {
    if name.is_empty() {
        return String::new();
    }

    let mut formatted = name.to_string();
    if let Some((local, _domain)) = name.split_once('@') {
        formatted = local
            .split('.')
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ");
    }

    if first_only {
        return formatted
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
    }

    formatted
}

// Upper-case the first character, lower-case the rest
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Assignee names formatted as first names, unique and sorted
pub fn extract_unique_assignees(issues: &[Issue]) -> Vec<String> {
    let names: BTreeSet<String> = issues
        .iter()
        .filter_map(Issue::assignee_name)
        .map(|name| format_name(name, true))
        .filter(|name| !name.is_empty())
        .collect();
    names.into_iter().collect()
}

/// Week start dates: `start`, `start + 7d`, ...; stops at the end of the calendar
pub fn generate_week_dates(start: NaiveDate, num_weeks: u32) -> Vec<NaiveDate> {
    (0..num_weeks)
        .map_while(|i| start.checked_add_signed(Duration::weeks(i64::from(i))))
        .collect()
}

/// Quarter label for a date, e.g. `Q4 2025`
pub fn default_quarter(today: NaiveDate) -> String {
    format!("Q{} {}", today.month0() / 3 + 1, today.year())
}

/// Monday on or before the first day of the date's quarter
pub fn default_start_date(today: NaiveDate) -> NaiveDate {
    let quarter_start_month = (today.month0() / 3) * 3 + 1;
    // Day 1 of a month in 1..=12 always exists
    let first = NaiveDate::from_ymd_opt(today.year(), quarter_start_month, 1).unwrap_or(today);
    monday_of(first)
}

/// Monday on or before `date`
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Issues in a canceled state are excluded from planning
pub fn is_active(issue: &Issue) -> bool {
    match &issue.state {
        Some(state) => {
            let state_type = state.state_type.to_lowercase();
            !CANCELED_STATE_TYPES.contains(&state_type.as_str())
        }
        None => true,
    }
}

/// True when the issue's project belongs to one of the initiative ids
pub fn belongs_to_initiatives(issue: &Issue, initiative_ids: &HashSet<String>) -> bool {
    issue
        .project
        .as_ref()
        .map(|project| {
            project
                .initiatives
                .nodes
                .iter()
                .any(|initiative| initiative_ids.contains(&initiative.id))
        })
        .unwrap_or(false)
}

/// `(initiative, project)` names for an issue, with placeholders when missing
pub fn initiative_and_project(issue: &Issue) -> (String, String) {
    match &issue.project {
        Some(project) => {
            let initiative = project
                .initiatives
                .nodes
                .first()
                .map(|initiative| initiative.name.clone())
                .unwrap_or_else(|| NO_INITIATIVE.to_string());
            (initiative, project.name.clone())
        }
        None => (NO_INITIATIVE.to_string(), NO_PROJECT.to_string()),
    }
}

/// Issues grouped by `(initiative, project)`, keys sorted, issue order preserved
pub fn group_issues(issues: &[Issue]) -> BTreeMap<(String, String), Vec<&Issue>> {
    let mut grouped: BTreeMap<(String, String), Vec<&Issue>> = BTreeMap::new();
    for issue in issues {
        grouped.entry(initiative_and_project(issue)).or_default().push(issue);
    }
    grouped
}

/// Description text as written to the sheet
pub fn truncate_description(description: Option<&str>) -> String {
    let description = description.unwrap_or_default();
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        description.chars().take(DESCRIPTION_MAX_CHARS).collect()
    } else {
        description.to_string()
    }
}

/// Issues sharing a cycle, with the week grid that cycle covers
#[derive(Debug, Clone)]
pub struct CycleBucket {
    pub label: String,
    pub number: Option<i64>,
    pub start: NaiveDate,
    pub weeks: u32,
    pub issues: Vec<Issue>,
}

/// Bucket issues by cycle, ordered by cycle number; cycle-less issues go last
pub fn bucket_by_cycle(issues: &[Issue], default_start: NaiveDate, default_weeks: u32) -> Vec<CycleBucket> {
    let mut by_number: BTreeMap<i64, CycleBucket> = BTreeMap::new();
    let mut without_cycle = Vec::new();

    for issue in issues {
        let Some(cycle) = &issue.cycle else {
            without_cycle.push(issue.clone());
            continue;
        };

        let bucket = by_number.entry(cycle.number).or_insert_with(|| {
            let starts = cycle.starts_at.date_naive();
            let ends = cycle.ends_at.date_naive();
            let days = (ends - starts).num_days().max(1);
            let weeks = u32::try_from((days + 6) / 7).unwrap_or(1).max(1);
            let label = cycle
                .name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Cycle {}", cycle.number));
            CycleBucket {
                label,
                number: Some(cycle.number),
                start: monday_of(starts),
                weeks,
                issues: Vec::new(),
            }
        });
        bucket.issues.push(issue.clone());
    }

    let mut buckets: Vec<CycleBucket> = by_number.into_values().collect();
    if !without_cycle.is_empty() {
        buckets.push(CycleBucket {
            label: NO_CYCLE.to_string(),
            number: None,
            start: default_start,
            weeks: default_weeks,
            issues: without_cycle,
        });
    }
    buckets
}

/// Per-assignee totals over a sheet's issue rows
#[derive(Debug, Clone, PartialEq)]
pub struct AssigneeSummary {
    pub name: String,
    pub issues: usize,
    pub estimate_days: f64,
}

/// Aggregate `(assignee, estimate)` pairs by assignee, sorted by name
pub fn summarize_assignees<'a, I>(rows: I) -> Vec<AssigneeSummary>
where
    I: IntoIterator<Item = (&'a str, Option<f64>)>,
{
    let mut totals: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for (assignee, estimate) in rows {
        let name = if assignee.is_empty() { UNASSIGNED } else { assignee };
        let entry = totals.entry(name.to_string()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += estimate.unwrap_or(0.0);
    }
    totals
        .into_iter()
        .map(|(name, (issues, estimate_days))| AssigneeSummary { name, issues, estimate_days })
        .collect()
}
