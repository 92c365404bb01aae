//! Linplan Core Library
//!
//! Turns the issues of a Linear team into capacity-planning workbooks. It
//! provides the GraphQL client, the planning sheet model, the XLSX writer and
//! the reader used to refresh or extend previously generated workbooks.

pub mod client;
pub mod constants;
pub mod context;
pub mod error;
pub mod existing;
pub mod export;
pub mod layout;
pub mod linear;
pub mod plan;
pub mod refresh;
pub mod workbook;

// Re-export commonly used items
pub use client::LinearClient;
pub use context::Context;
pub use error::{PlannerError, Result};
pub use existing::{ExistingPlan, ExistingWorkbook};
pub use layout::SheetLayout;
pub use workbook::PlanWorkbook;
