use std::fmt;

/// Custom error type for Linplan operations
#[derive(Debug)]
pub enum PlannerError {
    /// GraphQL errors or malformed responses from Linear
    Linear(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(std::io::Error),
    /// JSON parsing errors
    Json(serde_json::Error),
    /// HTTP request errors
    Http(reqwest::Error),
    /// Workbook writer errors
    Xlsx(rust_xlsxwriter::XlsxError),
    /// Errors reading an existing workbook or an unexpected sheet shape
    Workbook(String),
    /// Date parsing errors
    Time(chrono::ParseError),
    /// Generic errors with message
    Generic(String),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::Linear(msg) => write!(f, "Linear API error: {}", msg),
            PlannerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PlannerError::Io(err) => write!(f, "I/O error: {}", err),
            PlannerError::Json(err) => write!(f, "JSON error: {}", err),
            PlannerError::Http(err) => write!(f, "HTTP error: {}", err),
            PlannerError::Xlsx(err) => write!(f, "Excel writer error: {}", err),
            PlannerError::Workbook(msg) => write!(f, "Workbook error: {}", msg),
            PlannerError::Time(err) => write!(f, "Time parsing error: {}", err),
            PlannerError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::Io(err) => Some(err),
            PlannerError::Json(err) => Some(err),
            PlannerError::Http(err) => Some(err),
            PlannerError::Xlsx(err) => Some(err),
            PlannerError::Time(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlannerError {
    fn from(err: std::io::Error) -> Self {
        PlannerError::Io(err)
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(err: serde_json::Error) -> Self {
        PlannerError::Json(err)
    }
}

impl From<reqwest::Error> for PlannerError {
    fn from(err: reqwest::Error) -> Self {
        PlannerError::Http(err)
    }
}

impl From<rust_xlsxwriter::XlsxError> for PlannerError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        PlannerError::Xlsx(err)
    }
}

impl From<calamine::Error> for PlannerError {
    fn from(err: calamine::Error) -> Self {
        PlannerError::Workbook(err.to_string())
    }
}

impl From<chrono::ParseError> for PlannerError {
    fn from(err: chrono::ParseError) -> Self {
        PlannerError::Time(err)
    }
}

impl From<reqwest::header::InvalidHeaderValue> for PlannerError {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        PlannerError::Config(err.to_string())
    }
}

impl From<regex::Error> for PlannerError {
    fn from(err: regex::Error) -> Self {
        PlannerError::Generic(err.to_string())
    }
}

impl From<String> for PlannerError {
    fn from(err: String) -> Self {
        PlannerError::Generic(err)
    }
}

impl From<anyhow::Error> for PlannerError {
    fn from(err: anyhow::Error) -> Self {
        PlannerError::Generic(err.to_string())
    }
}

/// Result type alias for Linplan operations
pub type Result<T> = std::result::Result<T, PlannerError>;
