//! Whole-workbook operations behind each run mode

use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use crate::constants::NO_CYCLE;
use crate::existing::ExistingWorkbook;
use crate::layout::SheetLayout;
use crate::linear::Issue;
use crate::plan::{bucket_by_cycle, AssigneeSummary};
use crate::refresh::{merge_plan, week_grid};
use crate::workbook::PlanWorkbook;
use crate::{PlannerError, Result};

/// Tab written by a run
#[derive(Debug, Clone)]
pub struct WrittenSheet {
    pub name: String,
    pub summary: Vec<AssigneeSummary>,
}

/// Result of a refresh run
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub sheet: WrittenSheet,
    pub updated: usize,
    pub added: usize,
    pub retained: usize,
}

/// Title shown above a planning tab
pub fn plan_title(team_name: &str, quarter: &str) -> String {
    format!("{} - {} Planning", team_name, quarter)
}

/// Default output file name
pub fn default_output_file(team_name: &str, quarter: &str) -> String {
    format!("{}.xlsx", plan_title(team_name, quarter))
}

/// Write a fresh workbook with a single planning tab
pub fn create_workbook(path: &Path, sheet_name: &str, layout: &SheetLayout) -> Result<WrittenSheet> {
    let mut workbook = PlanWorkbook::new();
    let name = workbook.add_plan_sheet(sheet_name, layout)?;
    workbook.save(path)?;
    info!("Created '{}' with tab '{}'", path.display(), name);
    Ok(WrittenSheet {
        name,
        summary: layout.summary(),
    })
}

/// Write a fresh workbook with one tab per cycle
pub fn create_cycle_workbook(
    path: &Path,
    team_name: &str,
    quarter: &str,
    issues: &[Issue],
    default_start: NaiveDate,
    default_weeks: u32,
) -> Result<Vec<WrittenSheet>> {
    let buckets = bucket_by_cycle(issues, default_start, default_weeks);
    let mut workbook = PlanWorkbook::new();
    let mut written = Vec::with_capacity(buckets.len());

    for bucket in &buckets {
        let title = format!("{} ({})", plan_title(team_name, quarter), bucket.label);
        let layout = SheetLayout::from_issues(&title, &bucket.issues, bucket.start, bucket.weeks);
        let name = workbook.add_plan_sheet(&bucket.label, &layout)?;
        written.push(WrittenSheet {
            name,
            summary: layout.summary(),
        });
    }

    // An empty result still produces a workbook
    if buckets.is_empty() {
        let layout = SheetLayout::from_issues(
            &plan_title(team_name, quarter),
            &[],
            default_start,
            default_weeks,
        );
        let name = workbook.add_plan_sheet(NO_CYCLE, &layout)?;
        written.push(WrittenSheet {
            name,
            summary: layout.summary(),
        });
    }

    workbook.save(path)?;
    info!("Created '{}' with {} cycle tabs", path.display(), written.len());
    Ok(written)
}

/// Add a planning tab after the existing tabs of a workbook
pub fn append_to_workbook(path: &Path, sheet_name: &str, layout: &SheetLayout) -> Result<WrittenSheet> {
    let existing = ExistingWorkbook::open(path)?;
    let mut workbook = PlanWorkbook::new();
    for sheet in &existing.sheets {
        workbook.add_copied_sheet(sheet)?;
    }
    let name = workbook.add_plan_sheet(sheet_name, layout)?;
    workbook.save(path)?;
    info!("Appended tab '{}' to '{}'", name, path.display());
    Ok(WrittenSheet {
        name,
        summary: layout.summary(),
    })
}

/// Options of a refresh run
#[derive(Debug, Clone)]
pub struct RefreshOptions<'a> {
    /// Replaces the old tab title when set
    pub title: Option<&'a str>,
    pub start_date: Option<NaiveDate>,
    pub default_start: NaiveDate,
    pub weeks: u32,
}

/// Re-render the latest planning tab of a workbook with fresh issues
pub fn refresh_workbook(path: &Path, issues: &[Issue], options: &RefreshOptions<'_>) -> Result<RefreshReport> {
    let existing = ExistingWorkbook::open(path)?;
    let (plan_idx, plan) = existing.latest_plan().ok_or_else(|| {
        PlannerError::Workbook(format!("no planning tab found in {}", path.display()))
    })?;
    info!("Refreshing tab '{}' with {} rows", plan.sheet_name, plan.rows.len());

    let title = options
        .title
        .map(str::to_string)
        .or_else(|| plan.title.clone())
        .unwrap_or_else(|| plan.sheet_name.clone());
    let weeks = week_grid(&plan, options.start_date, options.default_start, options.weeks);
    let outcome = merge_plan(&title, issues, &plan, weeks);

    let mut workbook = PlanWorkbook::new();
    let mut refreshed_name = String::new();
    for (idx, sheet) in existing.sheets.iter().enumerate() {
        if idx == plan_idx {
            refreshed_name = workbook.add_plan_sheet(&sheet.name, &outcome.layout)?;
        } else {
            workbook.add_copied_sheet(sheet)?;
        }
    }
    workbook.save(path)?;
    info!(
        "Refreshed '{}': {} updated, {} added, {} kept",
        refreshed_name, outcome.updated, outcome.added, outcome.retained
    );

    Ok(RefreshReport {
        sheet: WrittenSheet {
            name: refreshed_name,
            summary: outcome.layout.summary(),
        },
        updated: outcome.updated,
        added: outcome.added,
        retained: outcome.retained,
    })
}
