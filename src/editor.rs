//! Add/edit form sessions.
//!
//! An `EditSession` exists only while its modal is open. It carries its own
//! mode, so sessions of different entity types never share edit state.

use tracing::debug;

use crate::error::{FormError, PanelError, ValidationError};
use crate::models::{Entity, FieldValue, Mode};
use crate::store::EntityStore;

/// Working copy of one entity plus the mode it was opened in.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession<E: Entity> {
    mode: Mode,
    working: E,
}

impl<E: Entity> EditSession<E> {
    /// Open for create with a blank template.
    pub fn create() -> Self {
        debug!(kind = %E::KIND, "form opened for create");
        Self {
            mode: Mode::Create,
            working: E::blank(),
        }
    }

    /// Open seeded with a row. Edit iff the row has an id.
    pub fn edit(row: E) -> Self {
        let mode = Mode::for_id(row.id());
        debug!(kind = %E::KIND, id = ?row.id(), ?mode, "form opened for edit");
        Self { mode, working: row }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn working(&self) -> &E {
        &self.working
    }

    /// Merge one value into the working copy; other fields are untouched.
    pub fn set_field(
        &mut self,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), FormError> {
        self.working.set_field(field, value.into())
    }

    pub fn payload(&self) -> Result<E::Payload, ValidationError> {
        self.working.to_payload(self.mode)
    }

    /// Validate, then create or update through `store`.
    ///
    /// The session is left as it was on any failure, so the caller can keep
    /// the form open for a retry.
    pub async fn submit(&self, store: &dyn EntityStore<E>) -> Result<E, PanelError> {
        let payload = self.payload()?;
        let saved = match self.mode {
            Mode::Create => store.create(payload).await?,
            Mode::Edit => store.update(payload).await?,
        };
        Ok(saved)
    }

    pub fn title(&self) -> String {
        match self.mode {
            Mode::Create => format!("Add {}", E::KIND),
            Mode::Edit => format!("Edit {}", E::KIND),
        }
    }

    pub fn submit_label(&self) -> String {
        match self.mode {
            Mode::Create => format!("Add {}", E::KIND),
            Mode::Edit => format!("Update {}", E::KIND),
        }
    }
}
