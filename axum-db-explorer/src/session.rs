//! Row edit session
//!
//! Tracks the grid-editing lifecycle for one table: buffered cell edits,
//! row selection for deletion and the insert draft. Nothing reaches the
//! database until [`RowEditSession::save`], [`RowEditSession::delete_selected`]
//! or [`RowEditSession::insert_row`] is called with an adapter.
//!
//! ```text
//! Viewing --enter_edit--> Editing --save--> Saving --ok--> Viewing
//!                            ^                 |
//!                            +-----failure-----+
//! Viewing | Editing --begin_insert--> Inserting --insert_row | cancel_insert--> back
//! ```

use crate::database::traits::{DatabaseAdapter, DatabaseError};
use crate::identifier::TableTarget;
use crate::literal::coerce_insert_text;
use crate::schema::{TableMetadata, UpdateRowRequest};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Where the session is in the editing lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Viewing,
    Editing,
    Saving,
    Inserting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Viewing => "viewing",
            SessionState::Editing => "editing",
            SessionState::Saving => "saving",
            SessionState::Inserting => "inserting",
        })
    }
}

/// Buffered changes for one row, keyed by its primary key value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRow {
    pub key: Value,
    /// Column name to new value, in the order first edited
    pub changes: Vec<(String, Value)>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Table has no primary key, rows cannot be edited")]
    NoPrimaryKey,

    #[error("Composite primary keys are not supported for row editing")]
    CompositePrimaryKey,

    #[error("Row has no value for key column {0}")]
    MissingKeyValue(String),

    #[error("Cannot {action} while {state}")]
    InvalidState { action: &'static str, state: SessionState },

    #[error("No rows selected")]
    NothingSelected,

    #[error("Deletion was not confirmed")]
    NotConfirmed,

    #[error("Insert draft has no values")]
    EmptyDraft,

    /// Rows before `failed_at` were written; the rest are still pending
    #[error("Failed at operation {failed_at} of {total}: {message}")]
    PartialFailure {
        failed_at: usize,
        total: usize,
        applied: usize,
        message: String,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Editing state for the table currently shown in the grid
#[derive(Debug, Clone)]
pub struct RowEditSession {
    target: TableTarget,
    primary_key: Option<Vec<String>>,
    state: SessionState,
    /// State to return to when an insert ends
    before_insert: SessionState,
    pending: Vec<PendingRow>,
    selected: Vec<Value>,
    draft: Vec<(String, String)>,
    refetch: bool,
}

impl RowEditSession {
    pub fn new(metadata: &TableMetadata) -> Self {
        Self {
            target: TableTarget::new(metadata.database.clone(), metadata.schema.clone(), metadata.name.clone()),
            primary_key: metadata.primary_key.clone(),
            state: SessionState::Viewing,
            before_insert: SessionState::Viewing,
            pending: Vec::new(),
            selected: Vec::new(),
            draft: Vec::new(),
            refetch: false,
        }
    }

    /// Drop everything and start over on another table
    pub fn reset(&mut self, metadata: &TableMetadata) {
        *self = Self::new(metadata);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target(&self) -> &TableTarget {
        &self.target
    }

    pub fn pending(&self) -> &[PendingRow] {
        &self.pending
    }

    pub fn selected(&self) -> &[Value] {
        &self.selected
    }

    pub fn draft(&self) -> &[(String, String)] {
        &self.draft
    }

    /// The single key column edits are addressed by
    pub fn key_column(&self) -> Result<&str, SessionError> {
        match self.primary_key.as_deref() {
            Some([column]) => Ok(column.as_str()),
            Some([_, _, ..]) => Err(SessionError::CompositePrimaryKey),
            _ => Err(SessionError::NoPrimaryKey),
        }
    }

    /// Returns true once after any write that changed table contents
    pub fn take_refetch(&mut self) -> bool {
        std::mem::take(&mut self.refetch)
    }

    fn expect_state(&self, action: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    fn row_key(&self, row: &Value) -> Result<Value, SessionError> {
        let column = self.key_column()?;
        match row.get(column) {
            Some(value) if !value.is_null() => Ok(value.clone()),
            _ => Err(SessionError::MissingKeyValue(column.to_string())),
        }
    }

    pub fn enter_edit(&mut self) -> Result<(), SessionError> {
        self.expect_state("enter edit mode", &[SessionState::Viewing, SessionState::Editing])?;
        self.key_column()?;
        self.state = SessionState::Editing;
        Ok(())
    }

    /// Buffer a new value for one cell of `row`
    ///
    /// A second change to the same cell replaces the first.
    pub fn cell_change(&mut self, row: &Value, column: &str, value: Value) -> Result<(), SessionError> {
        self.expect_state("change a cell", &[SessionState::Editing])?;
        let key = self.row_key(row)?;

        let index = match self.pending.iter().position(|pending| same_key(&pending.key, &key)) {
            Some(index) => index,
            None => {
                self.pending.push(PendingRow {
                    key,
                    changes: Vec::new(),
                });
                self.pending.len() - 1
            }
        };

        let changes = &mut self.pending[index].changes;
        match changes.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = value,
            None => changes.push((column.to_string(), value)),
        }

        Ok(())
    }

    /// Leave edit mode and discard every buffered change
    pub fn cancel_edit(&mut self) -> Result<(), SessionError> {
        self.expect_state("cancel editing", &[SessionState::Editing])?;
        self.pending.clear();
        self.state = SessionState::Viewing;
        Ok(())
    }

    /// Write buffered rows one at a time, in the order they were first edited
    ///
    /// Each row leaves the buffer as soon as it is written. The first failing
    /// row stops the save; it and everything after it stay pending and the
    /// session returns to Editing. Dropping the returned future part way
    /// also returns to Editing with only the unwritten rows pending.
    pub async fn save(&mut self, adapter: &dyn DatabaseAdapter) -> Result<usize, SessionError> {
        self.expect_state("save", &[SessionState::Editing])?;
        let key_column = self.key_column()?.to_string();
        let total = self.pending.len();

        let mut saving = SaveInProgress::start(self);
        let session = &mut *saving.session;

        for index in 0..total {
            let Some(row) = session.pending.first() else {
                break;
            };
            let request = UpdateRowRequest {
                database: session.target.database.clone(),
                schema: session.target.schema.clone(),
                table: session.target.table.clone(),
                pk_column: key_column.clone(),
                pk_value: row.key.clone(),
                updates: row.changes.clone(),
            };

            debug!(row = index + 1, total, key = %request.pk_value, "saving row");
            if let Err(error) = adapter.update_row(&request).await {
                warn!(row = index + 1, total, %error, "save stopped");
                session.state = SessionState::Editing;
                return Err(SessionError::PartialFailure {
                    failed_at: index + 1,
                    total,
                    applied: index,
                    message: error.to_string(),
                });
            }

            session.pending.remove(0);
            session.refetch = true;
        }

        session.state = SessionState::Viewing;
        Ok(total)
    }

    /// Select the row if it is not selected, unselect it otherwise
    pub fn toggle_row_selection(&mut self, row: &Value) -> Result<(), SessionError> {
        let key = self.row_key(row)?;
        match self.selected.iter().position(|selected| same_key(selected, &key)) {
            Some(index) => {
                self.selected.remove(index);
            }
            None => self.selected.push(key),
        }
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Delete every selected row with a single statement
    pub async fn delete_selected(&mut self, adapter: &dyn DatabaseAdapter, confirmed: bool) -> Result<u64, SessionError> {
        self.expect_state("delete rows", &[SessionState::Viewing, SessionState::Editing])?;
        let key_column = self.key_column()?;

        if self.selected.is_empty() {
            return Err(SessionError::NothingSelected);
        }
        if !confirmed {
            return Err(SessionError::NotConfirmed);
        }

        let deleted = adapter.delete_rows(&self.target, key_column, &self.selected).await?;

        let selected = std::mem::take(&mut self.selected);
        self.pending.retain(|row| !selected.iter().any(|key| same_key(key, &row.key)));
        self.refetch = true;
        Ok(deleted)
    }

    pub fn begin_insert(&mut self) -> Result<(), SessionError> {
        self.expect_state("start an insert", &[SessionState::Viewing, SessionState::Editing])?;
        self.before_insert = self.state;
        self.state = SessionState::Inserting;
        self.draft.clear();
        Ok(())
    }

    pub fn set_draft_field(&mut self, column: &str, raw: impl Into<String>) -> Result<(), SessionError> {
        self.expect_state("edit the insert draft", &[SessionState::Inserting])?;
        let raw = raw.into();
        match self.draft.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = raw,
            None => self.draft.push((column.to_string(), raw)),
        }
        Ok(())
    }

    pub fn cancel_insert(&mut self) -> Result<(), SessionError> {
        self.expect_state("cancel the insert", &[SessionState::Inserting])?;
        self.draft.clear();
        self.state = self.before_insert;
        Ok(())
    }

    /// Insert the draft as one row
    ///
    /// Empty fields are left out so the column default applies. On failure
    /// the draft is kept and the session stays in Inserting.
    pub async fn insert_row(&mut self, adapter: &dyn DatabaseAdapter) -> Result<u64, SessionError> {
        self.expect_state("insert a row", &[SessionState::Inserting])?;

        let values: Vec<_> = self
            .draft
            .iter()
            .filter(|(_, raw)| !raw.is_empty())
            .map(|(column, raw)| (column.clone(), coerce_insert_text(raw)))
            .collect();

        if values.is_empty() {
            return Err(SessionError::EmptyDraft);
        }

        let inserted = adapter.insert_row(&self.target, &values).await?;

        self.draft.clear();
        self.state = self.before_insert;
        self.refetch = true;
        Ok(inserted)
    }
}

/// Holds a session in Saving, falling back to Editing if the save never finishes
struct SaveInProgress<'a> {
    session: &'a mut RowEditSession,
}

impl<'a> SaveInProgress<'a> {
    fn start(session: &'a mut RowEditSession) -> Self {
        session.state = SessionState::Saving;
        Self { session }
    }
}

impl Drop for SaveInProgress<'_> {
    fn drop(&mut self) {
        if self.session.state == SessionState::Saving {
            self.session.state = SessionState::Editing;
        }
    }
}

/// Rows are identified by the text form of their key, so `7` and `"7"` match
fn same_key(left: &Value, right: &Value) -> bool {
    fn text(value: &Value) -> std::borrow::Cow<'_, str> {
        match value {
            Value::String(text) => text.as_str().into(),
            other => other.to_string().into(),
        }
    }
    text(left) == text(right)
}
