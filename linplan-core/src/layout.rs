//! Planning sheet model
//!
//! A [`SheetLayout`] fixes every row and column position of one planning tab
//! before anything is written, so the writer only has to paint cells and the
//! refresh step can rebuild a tab from merged rows.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::constants::{
    CAPACITY_FIRST_ROW, CAPACITY_HEADER_ROW, COL_ASSIGNEE, COL_FIRST_WEEK, HEADER_GAP_ROWS,
};
use crate::linear::Issue;
use crate::plan::{
    format_name, generate_week_dates, group_issues, initiative_and_project, summarize_assignees,
    truncate_description, AssigneeSummary,
};

/// Value of a single spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    /// Spreadsheet date/time serial as read, including times of day
    DateTime(f64),
    Formula(String),
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Cell content as it would read in a text column
    pub fn display(&self) -> String {
        match self {
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::DateTime(serial) => serial.to_string(),
            CellValue::Formula(f) => f.clone(),
        }
    }
}

/// One issue line of a planning tab
#[derive(Debug, Clone, PartialEq)]
pub struct IssueRow {
    pub initiative: String,
    pub project: String,
    pub title: String,
    pub estimate: Option<f64>,
    pub description: String,
    pub url: String,
    pub assignee: String,
    /// One slot per week column; manual allocations survive refreshes
    pub weeks: Vec<Option<CellValue>>,
}

impl IssueRow {
    pub fn from_issue(issue: &Issue, num_weeks: usize) -> Self {
        let (initiative, project) = initiative_and_project(issue);
        IssueRow {
            initiative,
            project,
            title: issue.title.clone(),
            estimate: issue.estimate,
            description: truncate_description(issue.description.as_deref()),
            url: issue.url.clone(),
            assignee: format_name(issue.assignee_name().unwrap_or_default(), true),
            weeks: vec![None; num_weeks],
        }
    }

    pub fn group_key(&self) -> (String, String) {
        (self.initiative.clone(), self.project.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SheetRow {
    /// Gray row between two initiatives
    Separator,
    Issue(IssueRow),
}

/// Positions and content of one planning tab
#[derive(Debug, Clone)]
pub struct SheetLayout {
    pub title: String,
    pub week_dates: Vec<NaiveDate>,
    pub assignees: Vec<String>,
    /// Manual `Capacity/week` values per assignee
    pub capacity_per_week: BTreeMap<String, CellValue>,
    pub rows: Vec<SheetRow>,
}

impl SheetLayout {
    /// Layout for freshly fetched issues
    pub fn from_issues(title: &str, issues: &[Issue], start: NaiveDate, num_weeks: u32) -> Self {
        let week_dates = generate_week_dates(start, num_weeks);
        let groups = group_issues(issues)
            .into_iter()
            .map(|(key, issues)| {
                let rows = issues
                    .into_iter()
                    .map(|issue| IssueRow::from_issue(issue, week_dates.len()))
                    .collect();
                (key, rows)
            })
            .collect();
        Self::from_groups(title, week_dates, groups, BTreeMap::new())
    }

    /// Layout from rows already grouped by `(initiative, project)`
    pub fn from_groups(
        title: &str,
        week_dates: Vec<NaiveDate>,
        groups: BTreeMap<(String, String), Vec<IssueRow>>,
        capacity_per_week: BTreeMap<String, CellValue>,
    ) -> Self {
        let assignees: BTreeSet<String> = groups
            .values()
            .flatten()
            .map(|row| row.assignee.clone())
            .filter(|name| !name.is_empty())
            .collect();

        let mut rows = Vec::new();
        let mut last_initiative: Option<String> = None;
        for ((initiative, _project), group) in groups {
            if group.is_empty() {
                continue;
            }
            if last_initiative.as_ref().is_some_and(|last| *last != initiative) {
                rows.push(SheetRow::Separator);
            }
            last_initiative = Some(initiative);
            rows.extend(group.into_iter().map(SheetRow::Issue));
        }

        SheetLayout {
            title: title.to_string(),
            week_dates,
            assignees: assignees.into_iter().collect(),
            capacity_per_week,
            rows,
        }
    }

    pub fn num_weeks(&self) -> u16 {
        u16::try_from(self.week_dates.len()).unwrap_or(u16::MAX - COL_FIRST_WEEK)
    }

    /// Capacity row of the n-th assignee
    pub fn capacity_row(&self, index: usize) -> u32 {
        CAPACITY_FIRST_ROW + index as u32
    }

    /// Column header row, below the capacity block and a gap
    pub fn header_row(&self) -> u32 {
        CAPACITY_FIRST_ROW + self.assignees.len() as u32 + HEADER_GAP_ROWS
    }

    pub fn data_start_row(&self) -> u32 {
        self.header_row() + 1
    }

    /// Last data row; collapses to the first data row when there are none
    pub fn data_end_row(&self) -> u32 {
        match self.rows.len() {
            0 => self.data_start_row(),
            n => self.data_start_row() + n as u32 - 1,
        }
    }

    pub fn week_col(&self, index: usize) -> u16 {
        COL_FIRST_WEEK + index as u16
    }

    pub fn capacity_per_week_col(&self) -> u16 {
        COL_FIRST_WEEK + self.num_weeks()
    }

    /// Right edge of the separator fill
    pub fn last_week_col(&self) -> u16 {
        COL_ASSIGNEE + self.num_weeks()
    }

    /// Per-week capacity formula for an assignee's capacity row
    pub fn sumif_formula(&self, capacity_row: u32, week_index: usize) -> String {
        let first = self.data_start_row() + 1;
        let last = self.data_end_row() + 1;
        let assignee_col = column_letter(COL_ASSIGNEE);
        let week_col = column_letter(self.week_col(week_index));
        format!(
            "=SUMIF(${a}${first}:${a}${last},${a}{row},{w}${first}:{w}${last})",
            a = assignee_col,
            w = week_col,
            first = first,
            last = last,
            row = capacity_row + 1,
        )
    }

    /// Header cell formula pointing at the dated cell of the capacity header
    pub fn week_header_formula(&self, week_index: usize) -> String {
        format!(
            "={}{}",
            column_letter(self.week_col(week_index)),
            CAPACITY_HEADER_ROW + 1
        )
    }

    pub fn issue_rows(&self) -> impl Iterator<Item = &IssueRow> {
        self.rows.iter().filter_map(|row| match row {
            SheetRow::Issue(issue) => Some(issue),
            SheetRow::Separator => None,
        })
    }

    pub fn summary(&self) -> Vec<AssigneeSummary> {
        summarize_assignees(self.issue_rows().map(|row| (row.assignee.as_str(), row.estimate)))
    }
}

/// Spreadsheet column letters for a 0-based column index: 0 -> A, 26 -> AA
pub fn column_letter(col: u16) -> String {
    let mut n = u32::from(col) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::tests::{issue, with_assignee, with_project};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 29).unwrap()
    }

    fn sample_issues() -> Vec<Issue> {
        let mut estimated = with_project(issue("APP-1"), "Login", Some(("n1", "Security")));
        estimated.estimate = Some(2.5);
        vec![
            with_assignee(estimated, "jane.doe@acme.com"),
            with_assignee(with_project(issue("APP-2"), "Billing", Some(("n2", "Growth"))), "omar@acme.com"),
            with_assignee(with_project(issue("APP-3"), "Login", Some(("n1", "Security"))), "Omar Haddad"),
            with_project(issue("APP-4"), "Funnels", Some(("n2", "Growth"))),
        ]
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(7), "H");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(51), "AZ");
        assert_eq!(column_letter(52), "BA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_rows_grouped_with_separators() {
        let layout = SheetLayout::from_issues("Apps - Q4 2025 Planning", &sample_issues(), start(), 13);
        let shape: Vec<String> = layout
            .rows
            .iter()
            .map(|row| match row {
                SheetRow::Separator => "--".to_string(),
                SheetRow::Issue(row) => format!("{}/{}/{}", row.initiative, row.project, row.title),
            })
            .collect();
        assert_eq!(
            shape,
            vec![
                "Growth/Billing/Title APP-2",
                "Growth/Funnels/Title APP-4",
                "--",
                "Security/Login/Title APP-1",
                "Security/Login/Title APP-3",
            ]
        );
    }

    #[test]
    fn test_positions() {
        let layout = SheetLayout::from_issues("t", &sample_issues(), start(), 13);
        assert_eq!(layout.assignees, vec!["Jane", "Omar"]);
        // Excel row 5 + 2 assignees + 4 = row 11
        assert_eq!(layout.header_row(), 10);
        assert_eq!(layout.data_start_row(), 11);
        assert_eq!(layout.data_end_row(), 15);
        assert_eq!(layout.capacity_per_week_col(), 21);
        assert_eq!(layout.last_week_col(), 20);
        assert_eq!(layout.week_dates.len(), 13);
    }

    #[test]
    fn test_sumif_formula() {
        let layout = SheetLayout::from_issues("t", &sample_issues(), start(), 13);
        assert_eq!(
            layout.sumif_formula(layout.capacity_row(0), 0),
            "=SUMIF($H$12:$H$16,$H5,I$12:I$16)"
        );
        assert_eq!(
            layout.sumif_formula(layout.capacity_row(1), 12),
            "=SUMIF($H$12:$H$16,$H6,U$12:U$16)"
        );
        assert_eq!(layout.week_header_formula(1), "=J4");
    }

    #[test]
    fn test_empty_layout_range_collapses() {
        let layout = SheetLayout::from_issues("t", &[], start(), 4);
        assert!(layout.assignees.is_empty());
        assert!(layout.rows.is_empty());
        assert_eq!(layout.header_row(), 8);
        assert_eq!(layout.data_end_row(), layout.data_start_row());
    }

    #[test]
    fn test_issue_row_fields() {
        let layout = SheetLayout::from_issues("t", &sample_issues(), start(), 3);
        let row = layout.issue_rows().find(|row| row.title == "Title APP-1").unwrap();
        assert_eq!(row.estimate, Some(2.5));
        assert_eq!(row.assignee, "Jane");
        assert_eq!(row.url, "https://linear.app/acme/issue/APP-1");
        assert_eq!(row.weeks, vec![None, None, None]);

        let unassigned = layout.issue_rows().find(|row| row.title == "Title APP-4").unwrap();
        assert_eq!(unassigned.assignee, "");
    }

    #[test]
    fn test_summary() {
        let layout = SheetLayout::from_issues("t", &sample_issues(), start(), 3);
        let summary = layout.summary();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].name, "Jane");
        assert_eq!(summary[0].estimate_days, 2.5);
        assert_eq!(summary[1].name, "Omar");
        assert_eq!(summary[1].issues, 2);
        assert_eq!(summary[2].name, "Unassigned");
    }

    #[test]
    fn test_cell_value_as_number() {
        assert_eq!(CellValue::Number(1.5).as_number(), Some(1.5));
        assert_eq!(CellValue::Text(" 2 ".to_string()).as_number(), Some(2.0));
        assert_eq!(CellValue::Text("n/a".to_string()).as_number(), None);
        assert_eq!(CellValue::Formula("=A1".to_string()).as_number(), None);
    }
}
