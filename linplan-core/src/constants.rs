// Constants used throughout Linplan

// Linear API
pub const LINEAR_API_URL: &str = "https://api.linear.app/graphql";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 250;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const INITIATIVES_LIMIT: u32 = 100;
pub const ARCHIVE_MARKER: &str = "[Archive]";
pub const CANCELED_STATE_TYPES: [&str; 2] = ["canceled", "cancelled"];
pub const USER_AGENT: &str = "linplan-rust/0.1";

// Planning defaults
pub const DEFAULT_WEEKS: u32 = 13;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const NO_PROJECT: &str = "No Project";
pub const NO_INITIATIVE: &str = "No Initiative";
pub const NO_CYCLE: &str = "No Cycle";
pub const UNASSIGNED: &str = "Unassigned";

// Sheet layout, 0-based rows and columns (row 0 is Excel row 1, col 0 is column A)
pub const TITLE_ROW: u32 = 1;
pub const CAPACITY_HEADER_ROW: u32 = 3;
pub const CAPACITY_FIRST_ROW: u32 = 4;
pub const HEADER_GAP_ROWS: u32 = 4;
pub const COL_INITIATIVE: u16 = 1;
pub const COL_PROJECT: u16 = 2;
pub const COL_ISSUE: u16 = 3;
pub const COL_ESTIMATE: u16 = 4;
pub const COL_DESCRIPTION: u16 = 5;
pub const COL_TICKET: u16 = 6;
pub const COL_ASSIGNEE: u16 = 7;
pub const COL_FIRST_WEEK: u16 = 8;

// Header labels
pub const CAPACITY: &str = "Capacity";
pub const CAPACITY_PER_WEEK: &str = "Capacity/week";
pub const HEADER_INITIATIVE: &str = "Initiative";
pub const HEADER_ASSIGNEE: &str = "Assigned to";
pub const HEADERS: [(u16, &str); 7] = [
    (COL_INITIATIVE, HEADER_INITIATIVE),
    (COL_PROJECT, "Projects"),
    (COL_ISSUE, "Issue"),
    (COL_ESTIMATE, "Estimate (days)"),
    (COL_DESCRIPTION, "Description"),
    (COL_TICKET, "Linear Ticket"),
    (COL_ASSIGNEE, HEADER_ASSIGNEE),
];

// Colours matching the hand-made planning sheets
pub const YELLOW: u32 = 0xFFF2CC;
pub const GREEN: u32 = 0xB7E1CD;
pub const GRAY: u32 = 0xD9D9D9;

// Column widths
pub const COLUMN_WIDTHS: [(u16, f64); 7] = [
    (COL_INITIATIVE, 30.0),
    (COL_PROJECT, 35.0),
    (COL_ISSUE, 50.0),
    (COL_ESTIMATE, 15.0),
    (COL_DESCRIPTION, 50.0),
    (COL_TICKET, 40.0),
    (COL_ASSIGNEE, 15.0),
];
pub const WEEK_COLUMN_WIDTH: f64 = 8.0;

// Excel limits
pub const SHEET_NAME_MAX_CHARS: usize = 31;
pub const WEEK_DATE_FORMAT: &str = "m/d";
pub const TIME_FORMAT: &str = "hh:mm:ss";
pub const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm";
// Last column is XFD; weeks start at column I and leave one column for Capacity/week
pub const MAX_WEEKS: u32 = 16_384 - COL_FIRST_WEEK as u32 - 1;
pub const SHEET_DATE_FORMAT: &str = "%d%m%Y";
