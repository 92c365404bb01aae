//! Reading previously generated workbooks
//!
//! Every tab is loaded as a sparse grid of values and formulas. Tabs laid out
//! by this tool are recognised by their column header row and parsed back into
//! [`ExistingPlan`]s so a refresh can keep the hand-edited cells.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::constants::{
    CAPACITY_FIRST_ROW, CAPACITY_HEADER_ROW, COL_ASSIGNEE, COL_DESCRIPTION, COL_ESTIMATE,
    COL_FIRST_WEEK, COL_INITIATIVE, COL_ISSUE, COL_PROJECT, COL_TICKET, HEADER_ASSIGNEE,
    HEADER_INITIATIVE, TITLE_ROW,
};
use crate::layout::{CellValue, IssueRow};
use crate::{PlannerError, Result};

/// One tab of an existing workbook
#[derive(Debug, Clone, Default)]
pub struct ExistingSheet {
    pub name: String,
    /// Non-empty cells keyed by 0-based `(row, col)`
    pub cells: BTreeMap<(u32, u16), CellValue>,
}

impl ExistingSheet {
    pub fn new(name: &str) -> Self {
        ExistingSheet {
            name: name.to_string(),
            cells: BTreeMap::new(),
        }
    }

    pub fn get(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// Trimmed text content, numbers rendered as text
    pub fn text(&self, row: u32, col: u16) -> String {
        self.get(row, col)
            .map(|value| value.display().trim().to_string())
            .unwrap_or_default()
    }

    pub fn max_row(&self) -> Option<u32> {
        self.cells.keys().map(|(row, _)| *row).max()
    }

    fn date(&self, row: u32, col: u16) -> Option<NaiveDate> {
        match self.get(row, col)? {
            CellValue::Date(date) => Some(*date),
            CellValue::Number(serial) | CellValue::DateTime(serial) => serial_to_date(*serial),
            CellValue::Text(text) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// Row holding the `Initiative` ... `Assigned to` column headers
    pub fn find_header_row(&self) -> Option<u32> {
        self.cells
            .iter()
            .filter(|((_, col), value)| {
                *col == COL_INITIATIVE && value.as_text().map(str::trim) == Some(HEADER_INITIATIVE)
            })
            .map(|((row, _), _)| *row)
            .find(|row| self.text(*row, COL_ASSIGNEE) == HEADER_ASSIGNEE)
    }

    /// Parse a planning tab; `None` for tabs with another shape
    pub fn plan(&self) -> Option<ExistingPlan> {
        let header_row = self.find_header_row()?;

        // Week columns are the consecutive non-empty header cells after `Assigned to`
        let num_weeks = (COL_FIRST_WEEK..)
            .take_while(|col| self.get(header_row, *col).is_some())
            .count();
        let week_col = |i: usize| COL_FIRST_WEEK + i as u16;

        let week_dates = (0..num_weeks)
            .map(|i| self.date(CAPACITY_HEADER_ROW, week_col(i)))
            .collect();

        let mut capacity_per_week = BTreeMap::new();
        for row in CAPACITY_FIRST_ROW..header_row {
            let assignee = self.text(row, COL_ASSIGNEE);
            if assignee.is_empty() {
                continue;
            }
            if let Some(value) = self.get(row, week_col(num_weeks)) {
                capacity_per_week.insert(assignee, value.clone());
            }
        }

        let mut rows = Vec::new();
        let last_row = self.max_row().unwrap_or(header_row);
        for row in (header_row + 1)..=last_row {
            let fields: Vec<String> = [
                COL_INITIATIVE,
                COL_PROJECT,
                COL_ISSUE,
                COL_ESTIMATE,
                COL_DESCRIPTION,
                COL_TICKET,
                COL_ASSIGNEE,
            ]
            .iter()
            .map(|col| self.text(row, *col))
            .collect();
            // Separators and blank lines carry no issue fields
            if fields.iter().all(String::is_empty) {
                continue;
            }

            rows.push(IssueRow {
                initiative: self.text(row, COL_INITIATIVE),
                project: self.text(row, COL_PROJECT),
                title: self.text(row, COL_ISSUE),
                estimate: self.get(row, COL_ESTIMATE).and_then(CellValue::as_number),
                description: self.text(row, COL_DESCRIPTION),
                url: self.text(row, COL_TICKET),
                assignee: self.text(row, COL_ASSIGNEE),
                weeks: (0..num_weeks)
                    .map(|i| self.get(row, week_col(i)).cloned())
                    .collect(),
            });
        }

        let title = Some(self.text(TITLE_ROW, COL_INITIATIVE)).filter(|title| !title.is_empty());

        Some(ExistingPlan {
            sheet_name: self.name.clone(),
            title,
            week_dates,
            capacity_per_week,
            rows,
        })
    }
}

/// Planning tab read back from a workbook
#[derive(Debug, Clone)]
pub struct ExistingPlan {
    pub sheet_name: String,
    pub title: Option<String>,
    /// Date of each week column; `None` where the cell is unreadable
    pub week_dates: Vec<Option<NaiveDate>>,
    pub capacity_per_week: BTreeMap<String, CellValue>,
    pub rows: Vec<IssueRow>,
}

impl ExistingPlan {
    /// Week dates when every column carries one
    pub fn complete_week_dates(&self) -> Option<Vec<NaiveDate>> {
        if self.week_dates.is_empty() {
            return None;
        }
        self.week_dates.iter().copied().collect()
    }
}

/// All tabs of a workbook on disk
#[derive(Debug, Clone)]
pub struct ExistingWorkbook {
    pub path: PathBuf,
    pub sheets: Vec<ExistingSheet>,
}

impl ExistingWorkbook {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PlannerError::Workbook(format!("file not found: {}", path.display())));
        }

        let mut workbook = open_workbook_auto(path)?;
        let sheet_names = workbook.sheet_names().to_owned();
        let mut sheets = Vec::with_capacity(sheet_names.len());

        for sheet_name in sheet_names {
            let mut sheet = ExistingSheet::new(&sheet_name);

            let range = workbook.worksheet_range(&sheet_name)?;
            let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
            for (row, col, cell) in range.cells() {
                if let Some(value) = convert_cell(cell) {
                    sheet
                        .cells
                        .insert((row_offset + row as u32, (col_offset as usize + col) as u16), value);
                }
            }

            // Formula ranges may be absent for some formats
            if let Ok(formulas) = workbook.worksheet_formula(&sheet_name) {
                let (row_offset, col_offset) = formulas.start().unwrap_or((0, 0));
                for (row, col, formula) in formulas.cells() {
                    if formula.trim().is_empty() {
                        continue;
                    }
                    let formula = if formula.starts_with('=') {
                        formula.to_string()
                    } else {
                        format!("={}", formula)
                    };
                    sheet.cells.insert(
                        (row_offset + row as u32, (col_offset as usize + col) as u16),
                        CellValue::Formula(formula),
                    );
                }
            }

            debug!("Read tab '{}' ({} cells)", sheet.name, sheet.cells.len());
            sheets.push(sheet);
        }

        Ok(ExistingWorkbook {
            path: path.to_path_buf(),
            sheets,
        })
    }

    /// Last planning tab in workbook order, with its position
    pub fn latest_plan(&self) -> Option<(usize, ExistingPlan)> {
        self.sheets
            .iter()
            .enumerate()
            .rev()
            .find_map(|(idx, sheet)| sheet.plan().map(|plan| (idx, plan)))
    }
}

fn convert_cell(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        // Times of day are serials below 1; keep the raw value
        Data::DateTime(dt) => Some(CellValue::DateTime(dt.as_f64())),
        Data::DateTimeIso(s) => Some(iso_date(s).map(CellValue::Date).unwrap_or_else(|| CellValue::Text(s.clone()))),
        Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
    }
}

// Whole-day ISO values only; anything with a time of day stays text
fn iso_date(value: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .filter(|datetime| datetime.time() == NaiveTime::MIN)
        .map(|datetime| datetime.date())
}

/// Date of a 1900-system spreadsheet serial number
pub fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}
