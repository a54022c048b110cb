//! Admin panel: list views and the add/edit modal for dates, doctors and
//! availability.
//!
//! At most one modal is open at a time. `ActiveModal` owns the open form
//! session, so opening a second modal necessarily discards the first one's
//! working copy, and each session keeps its own create/edit mode.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{ApiClient, RestStore, UserDirectory};
use crate::editor::EditSession;
use crate::error::{PanelError, StoreError};
use crate::models::{
    Appointment, AvailabilitySlot, Doctor, Entity, EntityId, EntityKind, FieldValue, UserSummary,
};
use crate::store::{EntityStore, StoreSnapshot};
use crate::ui::Notifier;

/// Which modal is open, together with its form session.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveModal {
    None,
    Date(EditSession<Appointment>),
    Doctor(EditSession<Doctor>),
    Availability(EditSession<AvailabilitySlot>),
}

impl ActiveModal {
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            ActiveModal::None => None,
            ActiveModal::Date(_) => Some(EntityKind::Date),
            ActiveModal::Doctor(_) => Some(EntityKind::Doctor),
            ActiveModal::Availability(_) => Some(EntityKind::Availability),
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, ActiveModal::None)
    }
}

/// Binds an entity type to its store and its `ActiveModal` variant.
pub trait PanelEntity: Entity {
    fn store(panel: &AdminPanel) -> Arc<dyn EntityStore<Self>>;

    fn wrap(session: EditSession<Self>) -> ActiveModal;

    fn session(modal: &ActiveModal) -> Option<&EditSession<Self>>;

    fn session_mut(modal: &mut ActiveModal) -> Option<&mut EditSession<Self>>;
}

impl PanelEntity for Appointment {
    fn store(panel: &AdminPanel) -> Arc<dyn EntityStore<Self>> {
        Arc::clone(&panel.dates)
    }

    fn wrap(session: EditSession<Self>) -> ActiveModal {
        ActiveModal::Date(session)
    }

    fn session(modal: &ActiveModal) -> Option<&EditSession<Self>> {
        match modal {
            ActiveModal::Date(session) => Some(session),
            _ => None,
        }
    }

    fn session_mut(modal: &mut ActiveModal) -> Option<&mut EditSession<Self>> {
        match modal {
            ActiveModal::Date(session) => Some(session),
            _ => None,
        }
    }
}

impl PanelEntity for Doctor {
    fn store(panel: &AdminPanel) -> Arc<dyn EntityStore<Self>> {
        Arc::clone(&panel.doctors)
    }

    fn wrap(session: EditSession<Self>) -> ActiveModal {
        ActiveModal::Doctor(session)
    }

    fn session(modal: &ActiveModal) -> Option<&EditSession<Self>> {
        match modal {
            ActiveModal::Doctor(session) => Some(session),
            _ => None,
        }
    }

    fn session_mut(modal: &mut ActiveModal) -> Option<&mut EditSession<Self>> {
        match modal {
            ActiveModal::Doctor(session) => Some(session),
            _ => None,
        }
    }
}

impl PanelEntity for AvailabilitySlot {
    fn store(panel: &AdminPanel) -> Arc<dyn EntityStore<Self>> {
        Arc::clone(&panel.availability)
    }

    fn wrap(session: EditSession<Self>) -> ActiveModal {
        ActiveModal::Availability(session)
    }

    fn session(modal: &ActiveModal) -> Option<&EditSession<Self>> {
        match modal {
            ActiveModal::Availability(session) => Some(session),
            _ => None,
        }
    }

    fn session_mut(modal: &mut ActiveModal) -> Option<&mut EditSession<Self>> {
        match modal {
            ActiveModal::Availability(session) => Some(session),
            _ => None,
        }
    }
}

/// Message shown when a submit fails.
fn alert_message(kind: EntityKind, error: &PanelError) -> String {
    match error {
        PanelError::Store(e) => format!(
            "There was an error creating or updating the {}: {}",
            kind.label().to_lowercase(),
            e
        ),
        other => other.to_string(),
    }
}

pub struct AdminPanel {
    dates: Arc<dyn EntityStore<Appointment>>,
    doctors: Arc<dyn EntityStore<Doctor>>,
    availability: Arc<dyn EntityStore<AvailabilitySlot>>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn Notifier>,
    modal: ActiveModal,
    users: Vec<UserSummary>,
}

impl AdminPanel {
    pub fn new(
        dates: Arc<dyn EntityStore<Appointment>>,
        doctors: Arc<dyn EntityStore<Doctor>>,
        availability: Arc<dyn EntityStore<AvailabilitySlot>>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        AdminPanel {
            dates,
            doctors,
            availability,
            directory,
            notifier,
            modal: ActiveModal::None,
            users: Vec::new(),
        }
    }

    /// Panel wired to the REST backend behind `api`.
    pub fn connect(api: Arc<ApiClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            Arc::new(RestStore::<Appointment>::new(Arc::clone(&api))),
            Arc::new(RestStore::<Doctor>::new(Arc::clone(&api))),
            Arc::new(RestStore::<AvailabilitySlot>::new(Arc::clone(&api))),
            api,
            notifier,
        )
    }

    /// Load the three lists and the user selector.
    ///
    /// List failures stay on the owning store (`StoreSnapshot::error`).
    pub async fn mount(&mut self) {
        if let Err(e) = self.dates.refresh().await {
            warn!(error = %e, "loading dates failed");
        }
        if let Err(e) = self.doctors.refresh().await {
            warn!(error = %e, "loading doctors failed");
        }
        if let Err(e) = self.availability.refresh().await {
            warn!(error = %e, "loading availability failed");
        }
        self.load_users().await;
    }

    /// Fetch the user list once. Failures are logged and leave the selector
    /// empty. Dropping the future before it completes leaves the panel
    /// untouched.
    pub async fn load_users(&mut self) {
        match self.directory.fetch_users().await {
            Ok(users) => {
                debug!(count = users.len(), "users loaded");
                self.users = users;
            }
            Err(e) => warn!(error = %e, "error fetching users"),
        }
    }

    pub fn users(&self) -> &[UserSummary] {
        &self.users
    }

    /// `(value, label)` pairs for the appointment user selector.
    pub fn user_options(&self) -> Vec<(String, String)> {
        self.users
            .iter()
            .map(|user| (user.id.clone(), user.label()))
            .collect()
    }

    /// `(value, label)` pairs for doctor selectors.
    pub fn doctor_options(&self) -> Vec<(String, String)> {
        self.doctors
            .list()
            .into_iter()
            .filter_map(|doctor| {
                doctor
                    .id
                    .map(|id| (id.to_string(), doctor.name.clone()))
            })
            .collect()
    }

    /// Display name for a doctor reference, as shown in the availability
    /// table.
    pub fn doctor_name(&self, reference: &str) -> Option<String> {
        let id: EntityId = reference.trim().parse().ok()?;
        self.doctors
            .list()
            .into_iter()
            .find(|doctor| doctor.id == Some(id))
            .map(|doctor| doctor.full_name())
    }

    pub fn list<E: PanelEntity>(&self) -> StoreSnapshot<E> {
        E::store(self).snapshot()
    }

    pub fn active_modal(&self) -> &ActiveModal {
        &self.modal
    }

    pub fn session<E: PanelEntity>(&self) -> Option<&EditSession<E>> {
        E::session(&self.modal)
    }

    fn open(&mut self, modal: ActiveModal) {
        if let Some(previous) = self.modal.kind() {
            debug!(%previous, "discarding open form");
        }
        self.modal = modal;
    }

    /// "Add X": blank template, create mode.
    pub fn open_create<E: PanelEntity>(&mut self) {
        self.open(E::wrap(EditSession::create()));
    }

    /// "Edit X" on a row: working copy seeded from the row.
    pub fn open_edit<E: PanelEntity>(&mut self, row: E) {
        self.open(E::wrap(EditSession::edit(row)));
    }

    /// Cancel/dismiss. Never calls a store.
    pub fn close_modal(&mut self) {
        self.modal = ActiveModal::None;
    }

    pub fn edit_field<E: PanelEntity>(
        &mut self,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), PanelError> {
        let session = E::session_mut(&mut self.modal).ok_or(PanelError::NotOpen(E::KIND))?;
        session.set_field(field, value)?;
        Ok(())
    }

    /// Submit the open `E` form. Closes the modal on success; on failure the
    /// user is alerted and the form stays open with its working copy.
    pub async fn submit<E: PanelEntity>(&mut self) -> Result<E, PanelError> {
        let store = E::store(self);
        let session = E::session(&self.modal).ok_or(PanelError::NotOpen(E::KIND))?;

        let result = session.submit(store.as_ref()).await;

        match result {
            Ok(saved) => {
                info!(kind = %E::KIND, id = ?saved.id(), "form submitted");
                self.modal = ActiveModal::None;
                Ok(saved)
            }
            Err(e) => {
                warn!(kind = %E::KIND, error = %e, "form submit failed");
                self.notifier.alert(&alert_message(E::KIND, &e));
                Err(e)
            }
        }
    }

    /// Row delete: one `remove` call, no confirmation.
    pub async fn remove<E: PanelEntity>(&self, id: EntityId) -> Result<(), StoreError> {
        let result = E::store(self).remove(id).await;
        if let Err(e) = &result {
            warn!(kind = %E::KIND, id, error = %e, "delete failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{ApiError, ValidationError};
    use crate::models::Mode;
    use crate::store::testing::ScriptedStore;
    use crate::ui::testing::RecordingUi;

    enum Users {
        Ok(Vec<UserSummary>),
        Fails,
        Slow,
    }

    #[async_trait]
    impl UserDirectory for Users {
        async fn fetch_users(&self) -> Result<Vec<UserSummary>, ApiError> {
            match self {
                Users::Ok(users) => Ok(users.clone()),
                Users::Fails => Err(ApiError::Status {
                    status: 500,
                    body: "boom".to_string(),
                }),
                Users::Slow => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(vec![user("99")])
                }
            }
        }
    }

    fn user(id: &str) -> UserSummary {
        UserSummary {
            id: id.to_string(),
            name: "Luis".to_string(),
            last_name: "Pérez".to_string(),
        }
    }

    fn doctor(id: i64, name: &str) -> Doctor {
        Doctor {
            id: Some(id),
            name: name.to_string(),
            email: format!("{}@clinic.test", name.to_lowercase()),
            speciality: "Retina".to_string(),
            ..Doctor::blank()
        }
    }

    fn date(id: i64) -> Appointment {
        Appointment {
            id: Some(id),
            speciality: "Retina".to_string(),
            doctor: "1".to_string(),
            datetime: "2024-05-01T10:30:00.000Z".to_string(),
            reason_for_appointment: "Check-up".to_string(),
            date_type: "control".to_string(),
            user_id: "3".to_string(),
        }
    }

    fn slot(id: i64) -> AvailabilitySlot {
        AvailabilitySlot {
            id: Some(id),
            doctor_id: "1".to_string(),
            date: "2024-05-02".to_string(),
            start_time: "08:00".to_string(),
            end_time: "12:00".to_string(),
            is_available: true,
        }
    }

    struct Fixture {
        panel: AdminPanel,
        dates: Arc<ScriptedStore<Appointment>>,
        doctors: Arc<ScriptedStore<Doctor>>,
        availability: Arc<ScriptedStore<AvailabilitySlot>>,
        ui: Arc<RecordingUi>,
    }

    fn fixture(users: Users) -> Fixture {
        let dates = Arc::new(ScriptedStore::with_items(vec![date(1)]));
        let doctors = Arc::new(ScriptedStore::with_items(vec![
            doctor(1, "Ana"),
            doctor(2, "Bruno"),
        ]));
        let availability = Arc::new(ScriptedStore::with_items(vec![slot(3)]));
        let ui = Arc::new(RecordingUi::default());
        let panel = AdminPanel::new(
            dates.clone(),
            doctors.clone(),
            availability.clone(),
            Arc::new(users),
            ui.clone(),
        );
        Fixture {
            panel,
            dates,
            doctors,
            availability,
            ui,
        }
    }

    #[test]
    fn add_opens_blank_create_form_for_each_kind() {
        let mut f = fixture(Users::Ok(vec![]));

        f.panel.open_create::<Appointment>();
        let session = f.panel.session::<Appointment>().unwrap();
        assert_eq!(session.mode(), Mode::Create);
        assert_eq!(session.working(), &Appointment::blank());

        f.panel.open_create::<Doctor>();
        let session = f.panel.session::<Doctor>().unwrap();
        assert_eq!(session.mode(), Mode::Create);
        assert_eq!(session.working(), &Doctor::blank());

        f.panel.open_create::<AvailabilitySlot>();
        let session = f.panel.session::<AvailabilitySlot>().unwrap();
        assert_eq!(session.mode(), Mode::Create);
        assert_eq!(session.working(), &AvailabilitySlot::blank());
    }

    #[test]
    fn edit_opens_row_copy_in_edit_mode() {
        let mut f = fixture(Users::Ok(vec![]));
        let row = doctor(2, "Bruno");

        f.panel.open_edit(row.clone());
        let session = f.panel.session::<Doctor>().unwrap();
        assert_eq!(session.mode(), Mode::Edit);
        assert_eq!(session.working(), &row);
        assert_eq!(f.panel.active_modal().kind(), Some(EntityKind::Doctor));
    }

    #[test]
    fn opening_second_modal_replaces_first_without_leaking_mode() {
        let mut f = fixture(Users::Ok(vec![]));

        f.panel.open_edit(date(1));
        assert_eq!(f.panel.session::<Appointment>().unwrap().mode(), Mode::Edit);

        f.panel.open_create::<AvailabilitySlot>();
        assert!(f.panel.session::<Appointment>().is_none());
        assert_eq!(
            f.panel.session::<AvailabilitySlot>().unwrap().mode(),
            Mode::Create
        );
        assert_eq!(
            f.panel.active_modal().kind(),
            Some(EntityKind::Availability)
        );
    }

    #[test]
    fn editing_a_closed_form_is_rejected() {
        let mut f = fixture(Users::Ok(vec![]));
        f.panel.open_create::<Doctor>();

        let err = f
            .panel
            .edit_field::<Appointment>("speciality", "Retina")
            .unwrap_err();
        assert!(matches!(err, PanelError::NotOpen(EntityKind::Date)));
    }

    #[test]
    fn cancel_closes_without_store_calls() {
        let mut f = fixture(Users::Ok(vec![]));
        f.panel.open_edit(doctor(1, "Ana"));
        f.panel.edit_field::<Doctor>("name", "Changed").unwrap();

        f.panel.close_modal();
        assert_eq!(f.panel.active_modal(), &ActiveModal::None);
        assert!(f.doctors.calls().is_empty());
        assert_eq!(f.panel.list::<Doctor>().items[0].name, "Ana");
    }

    #[tokio::test]
    async fn successful_submit_closes_modal_and_list_reflects_it() {
        let mut f = fixture(Users::Ok(vec![]));
        f.panel.open_create::<AvailabilitySlot>();
        for (field, value) in [
            ("doctor_id", "2"),
            ("date", "2024-05-01"),
            ("start_time", "09:00"),
            ("end_time", "11:00"),
        ] {
            f.panel
                .edit_field::<AvailabilitySlot>(field, value)
                .unwrap();
        }
        f.panel
            .edit_field::<AvailabilitySlot>("is_available", false)
            .unwrap();

        let saved = f.panel.submit::<AvailabilitySlot>().await.unwrap();

        assert!(!f.panel.active_modal().is_open());
        assert!(!saved.is_available);
        assert_eq!(f.availability.calls(), vec!["create"]);
        let rows = f.panel.list::<AvailabilitySlot>().items;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.last(), Some(&saved));
        assert!(f.ui.alerts().is_empty());
    }

    #[tokio::test]
    async fn failed_submit_alerts_and_keeps_form_open() {
        let mut f = fixture(Users::Ok(vec![]));
        f.dates.fail_with("503 Service Unavailable");
        f.panel.open_edit(date(1));
        f.panel
            .edit_field::<Appointment>("reason_for_appointment", "Follow-up")
            .unwrap();

        let err = f.panel.submit::<Appointment>().await.unwrap_err();
        assert!(matches!(err, PanelError::Store(_)));

        let session = f.panel.session::<Appointment>().unwrap();
        assert_eq!(session.mode(), Mode::Edit);
        assert_eq!(session.working().reason_for_appointment, "Follow-up");
        assert_eq!(f.dates.calls(), vec!["update:1"]);

        let alerts = f.ui.alerts();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].starts_with("There was an error creating or updating the date"));
    }

    #[tokio::test]
    async fn availability_edit_submits_one_update() {
        let mut f = fixture(Users::Ok(vec![]));
        f.panel.open_edit(slot(3));
        f.panel
            .edit_field::<AvailabilitySlot>("is_available", false)
            .unwrap();

        let saved = f.panel.submit::<AvailabilitySlot>().await.unwrap();

        assert_eq!(f.availability.calls(), vec!["update:3"]);
        assert_eq!(saved.id, Some(3));
        assert!(!saved.is_available);
        assert_eq!(saved.start_time, "08:00");
        assert_eq!(f.panel.list::<AvailabilitySlot>().items, vec![saved]);
        assert!(!f.panel.active_modal().is_open());
    }

    #[tokio::test]
    async fn appointment_with_missing_field_never_reaches_store() {
        let mut f = fixture(Users::Ok(vec![user("3")]));
        f.panel.open_create::<Appointment>();
        for (field, value) in [
            ("speciality", "Retina"),
            ("doctor", "1"),
            ("datetime", "2024-05-01T10:30"),
            ("date_type", "first visit"),
            ("user_id", "3"),
        ] {
            f.panel.edit_field::<Appointment>(field, value).unwrap();
        }

        let err = f.panel.submit::<Appointment>().await.unwrap_err();
        match err {
            PanelError::Validation(ValidationError::MissingFields { fields, .. }) => {
                assert_eq!(fields, vec!["reason_for_appointment"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(f.dates.calls().is_empty());
        assert_eq!(f.ui.alerts().len(), 1);
        assert!(f.panel.active_modal().is_open());
    }

    #[tokio::test]
    async fn doctor_without_password_is_blocked_before_network() {
        let mut f = fixture(Users::Ok(vec![]));
        f.panel.open_create::<Doctor>();
        f.panel.edit_field::<Doctor>("name", "Carla").unwrap();
        f.panel
            .edit_field::<Doctor>("email", "carla@clinic.test")
            .unwrap();
        f.panel.edit_field::<Doctor>("speciality", "Cornea").unwrap();

        let err = f.panel.submit::<Doctor>().await.unwrap_err();
        assert!(matches!(
            err,
            PanelError::Validation(ValidationError::PasswordRequired)
        ));
        assert!(f.doctors.calls().is_empty());
        assert_eq!(f.ui.alerts(), vec!["Password is required for new doctors!"]);
        assert!(f.panel.active_modal().is_open());
    }

    #[tokio::test]
    async fn appointment_is_sent_as_absolute_instant() {
        let mut f = fixture(Users::Ok(vec![user("3")]));
        f.panel.open_create::<Appointment>();
        for (field, value) in [
            ("speciality", "Retina"),
            ("doctor", "1"),
            ("datetime", "2024-05-01T10:30"),
            ("reason_for_appointment", "Check-up"),
            ("date_type", "first visit"),
            ("user_id", "3"),
        ] {
            f.panel.edit_field::<Appointment>(field, value).unwrap();
        }

        let saved = f.panel.submit::<Appointment>().await.unwrap();
        assert!(saved.datetime.ends_with('Z'));
        assert_eq!(saved.datetime.len(), "2024-05-01T08:30:00.000Z".len());
        assert_eq!(saved.doctor, "1");
    }

    #[tokio::test]
    async fn delete_calls_remove_once_without_alert() {
        let f = fixture(Users::Ok(vec![]));

        f.panel.remove::<Doctor>(2).await.unwrap();
        assert_eq!(f.doctors.calls(), vec!["remove:2"]);
        assert_eq!(f.panel.list::<Doctor>().items.len(), 1);

        f.doctors.fail_with("gone");
        assert!(f.panel.remove::<Doctor>(1).await.is_err());
        assert!(f.ui.alerts().is_empty());
    }

    #[tokio::test]
    async fn users_load_into_selector() {
        let mut f = fixture(Users::Ok(vec![user("3")]));
        f.panel.mount().await;

        assert_eq!(
            f.panel.user_options(),
            vec![("3".to_string(), "Luis Pérez (ID: 3)".to_string())]
        );
    }

    #[tokio::test]
    async fn user_fetch_failure_is_silent() {
        let mut f = fixture(Users::Fails);
        f.panel.load_users().await;

        assert!(f.panel.users().is_empty());
        assert!(f.ui.alerts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_user_fetch_leaves_panel_untouched() {
        let mut f = fixture(Users::Slow);

        let result =
            tokio::time::timeout(Duration::from_millis(10), f.panel.load_users()).await;
        assert!(result.is_err());

        assert!(f.panel.users().is_empty());
        assert!(f.ui.alerts().is_empty());
    }

    #[test]
    fn doctor_selectors_and_names() {
        let f = fixture(Users::Ok(vec![]));
        assert_eq!(
            f.panel.doctor_options(),
            vec![
                ("1".to_string(), "Ana".to_string()),
                ("2".to_string(), "Bruno".to_string())
            ]
        );
        assert_eq!(f.panel.doctor_name("2").as_deref(), Some("Bruno"));
        assert_eq!(f.panel.doctor_name("42"), None);
        assert_eq!(f.panel.doctor_name(""), None);
    }
}
