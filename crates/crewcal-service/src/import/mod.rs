//! Team member import from spreadsheets.
//!
//! The pipeline is strictly sequential:
//!
//! 1. [`sheet::read_sheet`] turns CSV / XLSX / XLS bytes into header-keyed rows
//! 2. `crewcal_core::process_rows` validates and types them
//! 3. [`departments::reconcile_departments`] creates missing departments in one batch
//! 4. [`orchestrator::import_team_members`] inserts members one at a time and
//!    counts failures
//!
//! [`sheet::write_csv`] goes the other way, writing an export in the column
//! layout the importer reads.

pub mod departments;
pub mod orchestrator;
pub mod sheet;

pub use departments::reconcile_departments;
pub use orchestrator::{import_team_members, ImportSummary, MemberSink, StoreSink};
pub use sheet::{read_sheet, write_csv};

use crewcal_store::StoreError;

/// Errors that abort an import.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// File extension is not one we can parse.
    #[error("Unsupported file format. Please use CSV, XLS, or XLSX files.")]
    UnsupportedFormat,

    /// A workbook without any worksheet.
    #[error("The file contains no sheets.")]
    NoSheets,

    /// The parser rejected the file contents.
    #[error("Could not read the file: {0}")]
    Unreadable(String),

    /// No data rows.
    #[error("No data found in the file.")]
    NoData,

    /// Rows exist but none has every required field.
    #[error(
        "No valid data found. Please ensure your file has all required fields: name, email, birthday, and start date."
    )]
    NoValidRows,

    /// Every valid row failed to insert.
    #[error("Failed to import any team members. Please check required fields and try again.")]
    NothingImported,

    /// Storage failure outside the per-row inserts.
    #[error(transparent)]
    Store(#[from] StoreError),
}
