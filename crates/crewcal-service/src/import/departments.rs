//! Department reconciliation for imports.

use std::collections::HashSet;

use crewcal_core::{Department, SystemAccountId};
use crewcal_store::{Store, StoreError};

/// Create every department in `candidates` the account does not have yet.
///
/// Names are matched case-insensitively against existing departments and
/// against each other; the first spelling seen in the batch is the one
/// stored. All new departments are written in a single batch. Returns the
/// names created.
///
/// Two imports for the same account running at once can still both create
/// a department; nothing serialises them.
///
/// # Errors
///
/// Returns an error if listing or inserting departments fails.
pub fn reconcile_departments<'a>(
    store: &dyn Store,
    account: &SystemAccountId,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<String>, StoreError> {
    let mut known: HashSet<String> = store
        .list_departments(account)?
        .into_iter()
        .map(|d| d.name.to_lowercase())
        .collect();

    let missing: Vec<Department> = candidates
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| known.insert(name.to_lowercase()))
        .map(|name| Department::new(*account, name))
        .collect();

    if missing.is_empty() {
        return Ok(Vec::new());
    }

    store.insert_departments(&missing)?;
    tracing::info!(
        system_account_id = %account,
        created = missing.len(),
        "Departments created"
    );

    Ok(missing.into_iter().map(|d| d.name).collect())
}
