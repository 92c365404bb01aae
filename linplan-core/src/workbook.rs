//! XLSX output for planning tabs
//!
//! `rust_xlsxwriter` cannot edit a file in place, so append and refresh runs
//! rebuild the whole workbook: untouched tabs are copied cell by cell from an
//! [`ExistingWorkbook`](crate::existing::ExistingWorkbook) and planning tabs are
//! rendered from a [`SheetLayout`].

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_xlsxwriter::{ExcelDateTime, Format, FormatBorder, Workbook, Worksheet};
use tracing::debug;

use crate::constants::{
    CAPACITY, CAPACITY_HEADER_ROW, CAPACITY_PER_WEEK, COLUMN_WIDTHS, COL_ASSIGNEE, COL_DESCRIPTION,
    COL_ESTIMATE, COL_INITIATIVE, COL_ISSUE, COL_PROJECT, COL_TICKET, GRAY, GREEN, HEADERS,
    DATETIME_FORMAT, SHEET_NAME_MAX_CHARS, TIME_FORMAT, TITLE_ROW, WEEK_COLUMN_WIDTH, WEEK_DATE_FORMAT,
    YELLOW,
};
use crate::existing::ExistingSheet;
use crate::layout::{CellValue, IssueRow, SheetLayout, SheetRow};
use crate::Result;

/// Cell formats shared by every tab of a workbook
struct PlanFormats {
    title: Format,
    yellow: Format,
    capacity_header: Format,
    week_date: Format,
    column_header: Format,
    estimate: Format,
    ticket: Format,
    separator: Format,
    date: Format,
    time: Format,
    datetime: Format,
}

impl PlanFormats {
    fn new() -> Self {
        let capacity_header = Format::new().set_bold().set_background_color(YELLOW);
        PlanFormats {
            title: Format::new().set_bold().set_font_size(14),
            yellow: Format::new().set_background_color(YELLOW),
            week_date: capacity_header.clone().set_num_format(WEEK_DATE_FORMAT),
            column_header: capacity_header.clone().set_border(FormatBorder::Thin),
            capacity_header,
            estimate: Format::new().set_background_color(GREEN),
            ticket: Format::new().set_text_wrap(),
            separator: Format::new().set_background_color(GRAY),
            date: Format::new().set_num_format(WEEK_DATE_FORMAT),
            time: Format::new().set_num_format(TIME_FORMAT),
            datetime: Format::new().set_num_format(DATETIME_FORMAT),
        }
    }

    /// Number format for a copied date/time serial
    fn for_serial(&self, serial: f64) -> &Format {
        if serial < 1.0 {
            &self.time
        } else if serial.fract() == 0.0 {
            &self.date
        } else {
            &self.datetime
        }
    }
}

/// Workbook being assembled in memory; written once by [`PlanWorkbook::save`]
pub struct PlanWorkbook {
    workbook: Workbook,
    formats: PlanFormats,
    // Excel compares sheet names case-insensitively
    used_names: HashSet<String>,
    sheet_names: Vec<String>,
}

impl Default for PlanWorkbook {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanWorkbook {
    pub fn new() -> Self {
        PlanWorkbook {
            workbook: Workbook::new(),
            formats: PlanFormats::new(),
            used_names: HashSet::new(),
            sheet_names: Vec::new(),
        }
    }

    /// Names of the tabs added so far, in order
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// Render a planning tab; returns the name it was given
    pub fn add_plan_sheet(&mut self, name: &str, layout: &SheetLayout) -> Result<String> {
        let name = self.claim_name(name);
        let mut worksheet = Worksheet::new();
        worksheet.set_name(&name)?;
        write_plan(&mut worksheet, layout, &self.formats)?;
        self.workbook.push_worksheet(worksheet);
        debug!("Added planning tab '{}' with {} rows", name, layout.rows.len());
        Ok(name)
    }

    /// Copy the values and formulas of an existing tab
    pub fn add_copied_sheet(&mut self, sheet: &ExistingSheet) -> Result<String> {
        let name = self.claim_name(&sheet.name);
        let mut worksheet = Worksheet::new();
        worksheet.set_name(&name)?;
        for (&(row, col), value) in &sheet.cells {
            write_cell(&mut worksheet, row, col, value, None, &self.formats)?;
        }
        self.workbook.push_worksheet(worksheet);
        debug!("Copied tab '{}' ({} cells)", name, sheet.cells.len());
        Ok(name)
    }

    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.workbook.save(path)?;
        Ok(())
    }

    fn claim_name(&mut self, requested: &str) -> String {
        let name = unique_sheet_name(&sanitize_sheet_name(requested), &self.used_names);
        self.used_names.insert(name.to_lowercase());
        self.sheet_names.push(name.clone());
        name
    }
}

fn illegal_sheet_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\[\]:*?/\\]").expect("static sheet name pattern"))
}

/// Make a string usable as an Excel sheet name
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned = illegal_sheet_chars().replace_all(name, "-");
    let cleaned = cleaned.trim().trim_matches('\'').trim();
    let truncated: String = cleaned.chars().take(SHEET_NAME_MAX_CHARS).collect();
    if truncated.is_empty() {
        "Sheet".to_string()
    } else {
        truncated
    }
}

/// `name`, or `name (2)`, `name (3)`, ... when taken; `used` holds lower-cased names
pub fn unique_sheet_name(name: &str, used: &HashSet<String>) -> String {
    if !used.contains(&name.to_lowercase()) {
        return name.to_string();
    }
    let mut n = 2;
    loop {
        let suffix = format!(" ({})", n);
        let room = SHEET_NAME_MAX_CHARS.saturating_sub(suffix.chars().count());
        let base: String = name.chars().take(room).collect();
        let candidate = format!("{}{}", base.trim_end(), suffix);
        if !used.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

fn excel_date(date: NaiveDate) -> Result<ExcelDateTime> {
    let year = u16::try_from(date.year())
        .map_err(|_| format!("date out of spreadsheet range: {}", date))?;
    Ok(ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8)?)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &CellValue,
    format: Option<&Format>,
    formats: &PlanFormats,
) -> Result<()> {
    match (value, format) {
        (CellValue::Number(n), Some(format)) => worksheet.write_number_with_format(row, col, *n, format)?,
        (CellValue::Number(n), None) => worksheet.write_number(row, col, *n)?,
        (CellValue::Text(s), _) if s.is_empty() => return Ok(()),
        (CellValue::Text(s), Some(format)) => worksheet.write_string_with_format(row, col, s, format)?,
        (CellValue::Text(s), None) => worksheet.write_string(row, col, s)?,
        (CellValue::Bool(b), _) => worksheet.write_boolean(row, col, *b)?,
        (CellValue::Date(d), Some(format)) => {
            worksheet.write_datetime_with_format(row, col, &excel_date(*d)?, format)?
        }
        (CellValue::Date(d), None) => {
            worksheet.write_datetime_with_format(row, col, &excel_date(*d)?, &formats.date)?
        }
        (CellValue::DateTime(serial), Some(format)) => {
            worksheet.write_number_with_format(row, col, *serial, format)?
        }
        (CellValue::DateTime(serial), None) => {
            worksheet.write_number_with_format(row, col, *serial, formats.for_serial(*serial))?
        }
        (CellValue::Formula(f), Some(format)) => {
            worksheet.write_formula_with_format(row, col, f.as_str(), format)?
        }
        (CellValue::Formula(f), None) => worksheet.write_formula(row, col, f.as_str())?,
    };
    Ok(())
}

fn write_text(worksheet: &mut Worksheet, row: u32, col: u16, text: &str) -> Result<()> {
    if !text.is_empty() {
        worksheet.write_string(row, col, text)?;
    }
    Ok(())
}

fn write_plan(worksheet: &mut Worksheet, layout: &SheetLayout, formats: &PlanFormats) -> Result<()> {
    // Title
    worksheet.merge_range(TITLE_ROW, COL_INITIATIVE, TITLE_ROW, COL_PROJECT, &layout.title, &formats.title)?;

    // Capacity header with one dated column per week
    worksheet.write_blank(CAPACITY_HEADER_ROW, COL_TICKET, &formats.yellow)?;
    worksheet.write_string_with_format(CAPACITY_HEADER_ROW, COL_ASSIGNEE, CAPACITY, &formats.capacity_header)?;
    for (i, date) in layout.week_dates.iter().enumerate() {
        worksheet.write_datetime_with_format(
            CAPACITY_HEADER_ROW,
            layout.week_col(i),
            &excel_date(*date)?,
            &formats.week_date,
        )?;
    }
    worksheet.write_string_with_format(
        CAPACITY_HEADER_ROW,
        layout.capacity_per_week_col(),
        CAPACITY_PER_WEEK,
        &formats.capacity_header,
    )?;

    // Capacity rows, summing each assignee's weekly allocations
    for (idx, assignee) in layout.assignees.iter().enumerate() {
        let row = layout.capacity_row(idx);
        worksheet.write_string(row, COL_ASSIGNEE, assignee)?;
        for i in 0..layout.week_dates.len() {
            worksheet.write_formula(row, layout.week_col(i), layout.sumif_formula(row, i).as_str())?;
        }
        if let Some(capacity) = layout.capacity_per_week.get(assignee) {
            write_cell(worksheet, row, layout.capacity_per_week_col(), capacity, None, formats)?;
        }
    }

    // Column headers
    let header_row = layout.header_row();
    for (col, text) in HEADERS {
        worksheet.write_string_with_format(header_row, col, text, &formats.column_header)?;
    }
    for i in 0..layout.week_dates.len() {
        worksheet.write_formula_with_format(
            header_row,
            layout.week_col(i),
            layout.week_header_formula(i).as_str(),
            &formats.column_header,
        )?;
    }

    // Issue rows
    let mut row = layout.data_start_row();
    for sheet_row in &layout.rows {
        match sheet_row {
            SheetRow::Separator => {
                for col in COL_INITIATIVE..=layout.last_week_col() {
                    worksheet.write_blank(row, col, &formats.separator)?;
                }
            }
            SheetRow::Issue(issue) => write_issue_row(worksheet, layout, row, issue, formats)?,
        }
        row += 1;
    }

    // Column widths
    for (col, width) in COLUMN_WIDTHS {
        worksheet.set_column_width(col, width)?;
    }
    for col in layout.week_col(0)..=layout.capacity_per_week_col() {
        worksheet.set_column_width(col, WEEK_COLUMN_WIDTH)?;
    }

    Ok(())
}

fn write_issue_row(
    worksheet: &mut Worksheet,
    layout: &SheetLayout,
    row: u32,
    issue: &IssueRow,
    formats: &PlanFormats,
) -> Result<()> {
    write_text(worksheet, row, COL_INITIATIVE, &issue.initiative)?;
    write_text(worksheet, row, COL_PROJECT, &issue.project)?;
    write_text(worksheet, row, COL_ISSUE, &issue.title)?;
    if let Some(estimate) = issue.estimate {
        worksheet.write_number_with_format(row, COL_ESTIMATE, estimate, &formats.estimate)?;
    }
    write_text(worksheet, row, COL_DESCRIPTION, &issue.description)?;
    if !issue.url.is_empty() {
        worksheet.write_string_with_format(row, COL_TICKET, &issue.url, &formats.ticket)?;
    }
    write_text(worksheet, row, COL_ASSIGNEE, &issue.assignee)?;
    for (i, value) in issue.weeks.iter().enumerate().take(layout.week_dates.len()) {
        if let Some(value) = value {
            write_cell(worksheet, row, layout.week_col(i), value, None, formats)?;
        }
    }
    Ok(())
}
