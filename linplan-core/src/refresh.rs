//! Refreshing a planning tab with freshly fetched issues
//!
//! Tracker-owned columns are overwritten, hand-edited cells (weekly
//! allocations, `Capacity/week`, rows the tracker no longer returns) are kept.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use tracing::warn;
use url::Url;

use crate::existing::ExistingPlan;
use crate::layout::{CellValue, IssueRow, SheetLayout};
use crate::linear::Issue;
use crate::plan::generate_week_dates;

/// Refreshed layout plus what happened to each row
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub layout: SheetLayout,
    /// Fetched issues matched to an existing row
    pub updated: usize,
    /// Fetched issues new to the tab
    pub added: usize,
    /// Existing rows kept as they were
    pub retained: usize,
}

/// Move allocations from the old week columns onto `new_dates`.
///
/// Columns are matched by date; when the old tab has no readable dates at all
/// they are matched by position.
pub fn remap_weeks(
    old_weeks: &[Option<CellValue>],
    old_dates: &[Option<NaiveDate>],
    new_dates: &[NaiveDate],
) -> Vec<Option<CellValue>> {
    let by_position = old_dates.iter().all(Option::is_none);
    let index_by_date: HashMap<NaiveDate, usize> = old_dates
        .iter()
        .enumerate()
        .filter_map(|(idx, date)| date.map(|date| (date, idx)))
        .collect();

    new_dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let old_idx = if by_position { Some(i) } else { index_by_date.get(date).copied() };
            old_idx.and_then(|idx| old_weeks.get(idx).cloned().flatten())
        })
        .collect()
}

/// Week grid of a refreshed tab.
///
/// An explicit start date wins; otherwise the old tab's dates are reused when
/// all of them are readable, else the default quarter grid is generated.
pub fn week_grid(
    existing: &ExistingPlan,
    explicit_start: Option<NaiveDate>,
    default_start: NaiveDate,
    num_weeks: u32,
) -> Vec<NaiveDate> {
    match explicit_start {
        Some(start) => generate_week_dates(start, num_weeks),
        None => existing
            .complete_week_dates()
            .unwrap_or_else(|| generate_week_dates(default_start, num_weeks)),
    }
}

/// Key matching a sheet row to an issue.
///
/// Issue URLs end in a title slug that changes on rename, so the identifier
/// after `/issue/` is used; other URLs match as a whole.
pub fn issue_key(ticket_url: &str) -> Option<String> {
    let ticket_url = ticket_url.trim();
    if ticket_url.is_empty() {
        return None;
    }
    let identifier = Url::parse(ticket_url).ok().and_then(|url| {
        let mut segments = url.path_segments()?;
        segments.find(|segment| *segment == "issue")?;
        segments
            .next()
            .filter(|identifier| !identifier.is_empty())
            .map(str::to_uppercase)
    });
    Some(identifier.unwrap_or_else(|| ticket_url.to_string()))
}

/// Merge fetched issues into an existing planning tab
pub fn merge_plan(
    title: &str,
    issues: &[Issue],
    existing: &ExistingPlan,
    week_dates: Vec<NaiveDate>,
) -> RefreshOutcome {
    let mut first_row_by_key: HashMap<String, usize> = HashMap::new();
    for (idx, row) in existing.rows.iter().enumerate() {
        if let Some(key) = issue_key(&row.url) {
            first_row_by_key.entry(key).or_insert(idx);
        }
    }

    let mut groups: BTreeMap<(String, String), Vec<IssueRow>> = BTreeMap::new();
    let mut merged: HashSet<usize> = HashSet::new();
    let (mut updated, mut added, mut retained) = (0, 0, 0);

    for issue in issues {
        let mut row = IssueRow::from_issue(issue, week_dates.len());
        let matched = issue_key(&issue.url)
            .and_then(|key| first_row_by_key.get(&key).copied())
            .filter(|idx| !merged.contains(idx));
        if let Some(idx) = matched {
            let old = &existing.rows[idx];
            if row.estimate.is_none() {
                row.estimate = old.estimate;
            }
            row.weeks = remap_weeks(&old.weeks, &existing.week_dates, &week_dates);
            merged.insert(idx);
            updated += 1;
        } else {
            added += 1;
        }
        groups.entry(row.group_key()).or_default().push(row);
    }

    for (idx, old) in existing.rows.iter().enumerate() {
        if merged.contains(&idx) {
            continue;
        }
        let duplicate = issue_key(&old.url)
            .and_then(|key| first_row_by_key.get(&key))
            .is_some_and(|first| merged.contains(first));
        if duplicate {
            warn!(
                "Tab '{}' has more than one row for {}; keeping the extra row unchanged",
                existing.sheet_name, old.url
            );
        }
        let mut row = old.clone();
        row.weeks = remap_weeks(&old.weeks, &existing.week_dates, &week_dates);
        groups.entry(row.group_key()).or_default().push(row);
        retained += 1;
    }

    let layout = SheetLayout::from_groups(
        title,
        week_dates,
        groups,
        existing.capacity_per_week.clone(),
    );

    RefreshOutcome {
        layout,
        updated,
        added,
        retained,
    }
}
