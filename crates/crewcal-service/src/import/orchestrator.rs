//! Import orchestration: file bytes in, counts out.

use serde::Serialize;

use crewcal_core::{process_rows, ImportedMember, SystemAccountId, TeamMember};
use crewcal_store::Store;

use super::departments::reconcile_departments;
use super::sheet::read_sheet;
use super::ImportError;

/// Destination for imported members, one row at a time.
pub trait MemberSink: Send + Sync {
    /// Store one member. Returns `false` if the row could not be stored.
    fn add_team_member(&self, account: &SystemAccountId, member: &ImportedMember) -> bool;
}

/// Inserts members straight into the store.
pub struct StoreSink<'a> {
    store: &'a dyn Store,
}

impl<'a> StoreSink<'a> {
    /// Sink writing to `store`.
    #[must_use]
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }
}

impl MemberSink for StoreSink<'_> {
    fn add_team_member(&self, account: &SystemAccountId, member: &ImportedMember) -> bool {
        match self
            .store
            .insert_team_member(&TeamMember::from_import(*account, member))
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, email = %member.email, "Failed to insert team member");
                false
            }
        }
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Non-blank data rows in the file.
    pub total_rows: usize,
    /// Rows with every required field.
    pub valid_rows: usize,
    /// Members stored.
    pub imported: usize,
    /// Valid rows that failed to store.
    pub failed: usize,
    /// Departments created for this import.
    pub departments_created: usize,
}

/// Import a spreadsheet of team members into `account`.
///
/// Rows are inserted individually, so a failure part-way leaves the earlier
/// rows in place. Re-importing a file adds its members again.
///
/// # Errors
///
/// Fails when the file cannot be read, has no data or no valid rows, or when
/// not a single valid row could be stored.
pub fn import_team_members(
    store: &dyn Store,
    sink: &dyn MemberSink,
    account: &SystemAccountId,
    filename: &str,
    bytes: &[u8],
) -> Result<ImportSummary, ImportError> {
    let rows = read_sheet(filename, bytes)?;
    if rows.is_empty() {
        return Err(ImportError::NoData);
    }

    let members = process_rows(&rows);
    if members.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    let departments = members.iter().filter_map(|m| m.department.as_deref());
    let departments_created = match reconcile_departments(store, account, departments) {
        Ok(created) => created.len(),
        Err(e) => {
            tracing::error!(error = %e, system_account_id = %account, "Department reconciliation failed; continuing");
            0
        }
    };

    let imported = members
        .iter()
        .filter(|member| sink.add_team_member(account, member))
        .count();

    if imported == 0 {
        return Err(ImportError::NothingImported);
    }

    let summary = ImportSummary {
        total_rows: rows.len(),
        valid_rows: members.len(),
        imported,
        failed: members.len() - imported,
        departments_created,
    };

    tracing::info!(
        system_account_id = %account,
        filename = %filename,
        total_rows = summary.total_rows,
        imported = summary.imported,
        failed = summary.failed,
        "Team members imported"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crewcal_store::RocksStore;
    use tempfile::TempDir;

    const HEADER: &str = "Name,Email,Department,Birthday,Start Date,Gender\n";

    /// Accepts every other row.
    struct FlakySink {
        calls: AtomicUsize,
    }

    impl MemberSink for FlakySink {
        fn add_team_member(&self, _account: &SystemAccountId, _member: &ImportedMember) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0
        }
    }

    struct RejectingSink;

    impl MemberSink for RejectingSink {
        fn add_team_member(&self, _account: &SystemAccountId, _member: &ImportedMember) -> bool {
            false
        }
    }

    fn store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        (RocksStore::open(dir.path()).unwrap(), dir)
    }

    #[test]
    fn imports_valid_rows_and_creates_departments() {
        let (store, _dir) = store();
        let account = SystemAccountId::generate();
        let csv = format!(
            "{HEADER}Ada,ada@example.com,Engineering,1990-05-01,2020-01-15,female\n\
             Bob,bob@example.com,engineering,15/03/1985,01/02/2019,\n\
             NoDates,nd@example.com,Sales,,,\n"
        );

        let summary =
            import_team_members(&store, &StoreSink::new(&store), &account, "team.csv", csv.as_bytes())
                .unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                total_rows: 3,
                valid_rows: 2,
                imported: 2,
                failed: 0,
                departments_created: 1,
            }
        );
        let mut names: Vec<_> = store
            .list_team_members(&account)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Ada", "Bob"]);
    }

    #[test]
    fn partial_failures_are_counted() {
        let (store, _dir) = store();
        let account = SystemAccountId::generate();
        let csv = format!(
            "{HEADER}A,a@example.com,,1990-01-01,2020-01-01,\n\
             B,b@example.com,,1990-01-01,2020-01-01,\n\
             C,c@example.com,,1990-01-01,2020-01-01,\n"
        );
        let sink = FlakySink {
            calls: AtomicUsize::new(0),
        };

        let summary =
            import_team_members(&store, &sink, &account, "team.csv", csv.as_bytes()).unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn all_rows_failing_is_an_error() {
        let (store, _dir) = store();
        let csv = format!("{HEADER}A,a@example.com,,1990-01-01,2020-01-01,\n");
        let result = import_team_members(
            &store,
            &RejectingSink,
            &SystemAccountId::generate(),
            "team.csv",
            csv.as_bytes(),
        );
        assert!(matches!(result, Err(ImportError::NothingImported)));
    }

    #[test]
    fn empty_and_invalid_files_are_rejected() {
        let (store, _dir) = store();
        let account = SystemAccountId::generate();
        let sink = StoreSink::new(&store);

        let empty = import_team_members(&store, &sink, &account, "team.csv", HEADER.as_bytes());
        assert!(matches!(empty, Err(ImportError::NoData)));

        let csv = format!("{HEADER}A,a@example.com,,,2020-01-01,\n");
        let invalid = import_team_members(&store, &sink, &account, "team.csv", csv.as_bytes());
        assert!(matches!(invalid, Err(ImportError::NoValidRows)));
        assert_eq!(
            invalid.unwrap_err().to_string(),
            "No valid data found. Please ensure your file has all required fields: name, email, birthday, and start date."
        );
    }
}
