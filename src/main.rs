/// Command-line front end for the clinic admin panel.
///
/// Logs a user in against the booking backend and, for doctors, offers the
/// list/add/edit/delete screens for dates, doctors and availability. An
/// offline demo runs the same screens against in-memory stores.
use std::error::Error;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use easyappoint_admin::{
    AdminConfig, AdminPanel, ApiClient, ApiError, Appointment, AuthService, AvailabilitySlot,
    Doctor, Entity, EntityId, FieldValue, FileTokenStore, LoginError, LoginFlow, MemoryStore,
    Mode, Navigator, Notifier, PanelEntity, RestAuthService, Role, Route, StaticAuthService,
    UserDirectory, UserSummary,
};

const DEMO_EMAIL: &str = "demo@clinic.test";
const DEMO_PASSWORD: &str = "demo";

/// Alerts, overlay and navigation rendered on stdout.
#[derive(Default)]
struct ConsoleUi {
    route: Mutex<Option<Route>>,
}

impl ConsoleUi {
    fn route(&self) -> Option<Route> {
        *self.route.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Notifier for ConsoleUi {
    fn alert(&self, message: &str) {
        println!("\n[!] {}", message);
    }

    fn show_overlay(&self, title: &str, message: &str) {
        println!("\n{}", "*".repeat(60));
        println!("  {}", title);
        println!("  {}", message);
        println!("{}", "*".repeat(60));
    }

    fn dismiss_overlay(&self) {}
}

impl Navigator for ConsoleUi {
    fn navigate(&self, route: Route) {
        println!("\n-> {}", route.path());
        *self.route.lock().unwrap_or_else(|e| e.into_inner()) = Some(route);
    }
}

/// Fixed user list for the offline demo.
struct DemoUsers(Vec<UserSummary>);

#[async_trait]
impl UserDirectory for DemoUsers {
    async fn fetch_users(&self) -> Result<Vec<UserSummary>, ApiError> {
        Ok(self.0.clone())
    }
}

/// How an entity is shown and prompted for on the console.
trait ConsoleRow: PanelEntity {
    const FIELDS: &'static [&'static str];

    fn value(&self, field: &str) -> String;

    fn describe(&self, panel: &AdminPanel) -> String;

    fn parse(_field: &str, raw: String) -> FieldValue {
        FieldValue::from(raw)
    }
}

impl ConsoleRow for Appointment {
    const FIELDS: &'static [&'static str] = &[
        "speciality",
        "doctor",
        "datetime",
        "reason_for_appointment",
        "date_type",
        "user_id",
    ];

    fn value(&self, field: &str) -> String {
        match field {
            "speciality" => self.speciality.clone(),
            "doctor" => self.doctor.clone(),
            "datetime" => self.datetime.clone(),
            "reason_for_appointment" => self.reason_for_appointment.clone(),
            "date_type" => self.date_type.clone(),
            "user_id" => self.user_id.clone(),
            _ => String::new(),
        }
    }

    fn describe(&self, panel: &AdminPanel) -> String {
        let doctor = panel
            .doctor_name(&self.doctor)
            .unwrap_or_else(|| self.doctor.clone());
        format!(
            "{} | {} | {} | {} | {} | user {}",
            self.datetime, self.speciality, doctor, self.date_type, self.reason_for_appointment,
            self.user_id
        )
    }
}

impl ConsoleRow for Doctor {
    const FIELDS: &'static [&'static str] = &[
        "name",
        "last_name",
        "email",
        "speciality",
        "document_type",
        "document_number",
        "address",
        "phone",
        "password",
    ];

    fn value(&self, field: &str) -> String {
        match field {
            "name" => self.name.clone(),
            "last_name" => self.last_name.clone(),
            "email" => self.email.clone(),
            "speciality" => self.speciality.clone(),
            "document_type" => self.document_type.clone(),
            "document_number" => self.document_number.clone(),
            "address" => self.address.clone(),
            "phone" => self.phone.clone(),
            _ => String::new(),
        }
    }

    fn describe(&self, _panel: &AdminPanel) -> String {
        format!("{} | {} | {}", self.full_name(), self.email, self.speciality)
    }
}

impl ConsoleRow for AvailabilitySlot {
    const FIELDS: &'static [&'static str] =
        &["doctor_id", "date", "start_time", "end_time", "is_available"];

    fn value(&self, field: &str) -> String {
        match field {
            "doctor_id" => self.doctor_id.clone(),
            "date" => self.date.clone(),
            "start_time" => self.start_time.clone(),
            "end_time" => self.end_time.clone(),
            "is_available" => (if self.is_available { "y" } else { "n" }).to_string(),
            _ => String::new(),
        }
    }

    fn describe(&self, panel: &AdminPanel) -> String {
        let doctor = panel
            .doctor_name(&self.doctor_id)
            .unwrap_or_else(|| self.doctor_id.clone());
        format!(
            "{} | {} {}-{} | {}",
            doctor,
            self.date,
            self.start_time,
            self.end_time,
            if self.is_available { "available" } else { "unavailable" }
        )
    }

    fn parse(field: &str, raw: String) -> FieldValue {
        if field == "is_available" {
            FieldValue::Flag(raw.eq_ignore_ascii_case("y"))
        } else {
            FieldValue::from(raw)
        }
    }
}

struct AdminCLI {
    config: AdminConfig,
    ui: Arc<ConsoleUi>,
    auth: Arc<dyn AuthService>,
    panel: AdminPanel,
    running: bool,
}

impl AdminCLI {
    fn connect(config: AdminConfig) -> Self {
        let ui = Arc::new(ConsoleUi::default());
        let tokens = Arc::new(FileTokenStore::new(config.token_path.clone()));
        info!(path = %tokens.path().display(), "session token file");
        let api = Arc::new(ApiClient::from_config(&config, tokens));
        let auth: Arc<dyn AuthService> = Arc::new(RestAuthService::new(Arc::clone(&api)));
        let panel = AdminPanel::connect(api, ui.clone());
        AdminCLI {
            config,
            ui,
            auth,
            panel,
            running: true,
        }
    }

    fn print_header(&self) {
        println!("\n{}", "=".repeat(60));
        println!("       CLINIC ADMIN PANEL");
        println!("       backend: {}", self.config.backend_url);
        println!("{}", "=".repeat(60));
    }

    fn print_menu(&self) {
        println!("\n--- Main Menu ---");
        println!(" 1. Log in");
        println!(" 2. List dates         3. Add date         4. Edit date         5. Delete date");
        println!(" 6. List doctors       7. Add doctor       8. Edit doctor       9. Delete doctor");
        println!("10. List availability 11. Add availability 12. Edit availability 13. Delete availability");
        println!("14. Switch to offline demo");
        println!("15. Exit");
        println!("{}", "-".repeat(20));
    }

    fn get_input(&self, prompt: &str, default: Option<&str>) -> io::Result<String> {
        match default {
            Some(def) if !def.is_empty() => print!("{} [{}]: ", prompt, def),
            _ => print!("{}: ", prompt),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let input = input.trim();

        if input.is_empty() {
            Ok(default.unwrap_or("").to_string())
        } else {
            Ok(input.to_string())
        }
    }

    fn get_int_input(&self, prompt: &str, default: Option<i64>) -> io::Result<i64> {
        loop {
            let default_str = default.map(|d| d.to_string());
            let input = self.get_input(prompt, default_str.as_deref())?;

            if let Ok(value) = input.parse::<i64>() {
                return Ok(value);
            }
            println!("Please enter a valid number");
        }
    }

    fn require_admin(&self) -> bool {
        if self.ui.route() == Some(Route::Admin) {
            return true;
        }
        println!("\nPlease log in as a doctor first (option 1)");
        false
    }

    async fn login(&mut self) -> io::Result<()> {
        println!("\n--- Log In ---");
        let mut flow = LoginFlow::new(self.auth.clone(), self.ui.clone(), self.ui.clone())
            .with_redirect_delay(self.config.redirect_delay);
        flow.set_email(&self.get_input("Email", None)?);
        flow.set_password(&self.get_input("Password", None)?);

        match flow.submit().await {
            Ok(Route::Admin) => {
                self.panel.mount().await;
                println!("\nAdmin panel loaded");
            }
            Ok(Route::Dashboard) => {
                println!("\nThe admin panel is only available to doctors");
            }
            Err(LoginError::MissingCredentials) => {
                println!("\n{}", LoginError::MissingCredentials);
            }
            Err(e) => info!(error = %e, "login did not complete"),
        }
        Ok(())
    }

    fn list<E: ConsoleRow>(&self) {
        let snapshot = self.panel.list::<E>();
        println!("\n--- {} list ---", E::KIND);
        if snapshot.loading {
            println!("Loading...");
        }
        if let Some(error) = &snapshot.error {
            println!("Error: {}", error);
        }
        if snapshot.items.is_empty() {
            println!("No records");
        }
        for row in &snapshot.items {
            let id = row.id().map(|id| id.to_string()).unwrap_or_default();
            println!("#{:<4} {}", id, row.describe(&self.panel));
        }
    }

    fn print_options(&self, field: &str) {
        let options = match field {
            "doctor" | "doctor_id" => self.panel.doctor_options(),
            "user_id" => self.panel.user_options(),
            _ => return,
        };
        for (value, label) in options {
            println!("    {} = {}", value, label);
        }
    }

    /// Prompt for every field of the open form, defaulting to its current
    /// value.
    fn fill_form<E: ConsoleRow>(&mut self) -> io::Result<()> {
        let Some(session) = self.panel.session::<E>() else {
            return Ok(());
        };
        let mode = session.mode();
        let working = session.working().clone();

        for &field in E::FIELDS {
            if field == "password" && mode == Mode::Edit {
                continue;
            }
            self.print_options(field);
            let current = working.value(field);
            let raw = self.get_input(field, Some(&current))?;
            if let Err(e) = self.panel.edit_field::<E>(field, E::parse(field, raw)) {
                println!("{}", e);
            }
        }
        Ok(())
    }

    async fn edit_form<E: ConsoleRow>(&mut self) -> io::Result<()> {
        loop {
            if let Some(session) = self.panel.session::<E>() {
                println!("\n--- {} ---", session.title());
            }
            self.fill_form::<E>()?;

            let label = self
                .panel
                .session::<E>()
                .map(|session| session.submit_label())
                .unwrap_or_default();
            let confirm = self.get_input(&format!("{}? (y/n)", label), Some("y"))?;
            if !confirm.eq_ignore_ascii_case("y") {
                self.panel.close_modal();
                println!("Cancelled");
                return Ok(());
            }

            match self.panel.submit::<E>().await {
                Ok(saved) => {
                    let id = saved.id().map(|id| id.to_string()).unwrap_or_default();
                    println!("\n{} saved (#{})", E::KIND, id);
                    return Ok(());
                }
                Err(_) => {
                    let again = self.get_input("Keep editing? (y/n)", Some("y"))?;
                    if !again.eq_ignore_ascii_case("y") {
                        self.panel.close_modal();
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn add<E: ConsoleRow>(&mut self) -> io::Result<()> {
        self.panel.open_create::<E>();
        self.edit_form::<E>().await
    }

    async fn edit<E: ConsoleRow>(&mut self) -> io::Result<()> {
        self.list::<E>();
        let id: EntityId = self.get_int_input(&format!("{} ID", E::KIND), None)?;
        let row = self
            .panel
            .list::<E>()
            .items
            .into_iter()
            .find(|row| row.id() == Some(id));

        match row {
            Some(row) => {
                self.panel.open_edit(row);
                self.edit_form::<E>().await
            }
            None => {
                println!("{} #{} not found", E::KIND, id);
                Ok(())
            }
        }
    }

    async fn delete<E: ConsoleRow>(&mut self) -> io::Result<()> {
        self.list::<E>();
        let id: EntityId = self.get_int_input(&format!("{} ID", E::KIND), None)?;
        match self.panel.remove::<E>(id).await {
            Ok(()) => println!("{} #{} deleted", E::KIND, id),
            Err(e) => println!("Error deleting {} #{}: {}", E::KIND, id, e),
        }
        Ok(())
    }

    fn switch_to_demo(&mut self) {
        println!("\n--- Offline Demo ---");

        let doctors = vec![
            Doctor {
                id: Some(1),
                name: "Ana".to_string(),
                last_name: "Gómez".to_string(),
                email: "ana@clinic.test".to_string(),
                speciality: "Retina".to_string(),
                ..Doctor::blank()
            },
            Doctor {
                id: Some(2),
                name: "Bruno".to_string(),
                last_name: "Díaz".to_string(),
                email: "bruno@clinic.test".to_string(),
                speciality: "Glaucoma".to_string(),
                ..Doctor::blank()
            },
        ];
        let dates = vec![Appointment {
            id: Some(1),
            speciality: "Retina".to_string(),
            doctor: "1".to_string(),
            datetime: "2030-03-04T14:00:00.000Z".to_string(),
            reason_for_appointment: "Annual checkup".to_string(),
            date_type: "control".to_string(),
            user_id: "10".to_string(),
        }];
        let slots = vec![AvailabilitySlot {
            id: Some(1),
            doctor_id: "2".to_string(),
            date: "2030-03-05".to_string(),
            start_time: "09:00".to_string(),
            end_time: "12:00".to_string(),
            is_available: true,
        }];
        let users = DemoUsers(vec![UserSummary {
            id: "10".to_string(),
            name: "Luis".to_string(),
            last_name: "Pérez".to_string(),
        }]);

        self.panel = AdminPanel::new(
            Arc::new(MemoryStore::with_items(dates)),
            Arc::new(MemoryStore::with_items(doctors)),
            Arc::new(MemoryStore::with_items(slots)),
            Arc::new(users),
            self.ui.clone(),
        );
        self.auth = Arc::new(
            StaticAuthService::new().with_account(DEMO_EMAIL, DEMO_PASSWORD, Role::Doctor),
        );
        *self.ui.route.lock().unwrap_or_else(|e| e.into_inner()) = None;

        info!("switched to offline demo");
        println!("Log in with {} / {}", DEMO_EMAIL, DEMO_PASSWORD);
    }

    async fn dispatch(&mut self, choice: i64) -> io::Result<()> {
        if (2..=13).contains(&choice) && !self.require_admin() {
            return Ok(());
        }
        match choice {
            1 => self.login().await?,
            2 => self.list::<Appointment>(),
            3 => self.add::<Appointment>().await?,
            4 => self.edit::<Appointment>().await?,
            5 => self.delete::<Appointment>().await?,
            6 => self.list::<Doctor>(),
            7 => self.add::<Doctor>().await?,
            8 => self.edit::<Doctor>().await?,
            9 => self.delete::<Doctor>().await?,
            10 => self.list::<AvailabilitySlot>(),
            11 => self.add::<AvailabilitySlot>().await?,
            12 => self.edit::<AvailabilitySlot>().await?,
            13 => self.delete::<AvailabilitySlot>().await?,
            14 => self.switch_to_demo(),
            15 => {
                self.running = false;
                println!("\nGoodbye!");
            }
            _ => println!("Invalid choice"),
        }
        Ok(())
    }

    async fn run(&mut self) -> io::Result<()> {
        self.print_header();

        while self.running {
            self.print_menu();
            let choice = self.get_int_input("Enter choice", Some(1))?;
            self.dispatch(choice).await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = AdminConfig::from_env()?;
    info!(backend = %config.backend_url, "starting");

    let mut cli = AdminCLI::connect(config);
    match cli.run().await {
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            warn!("stdin closed");
            Ok(())
        }
        other => Ok(other?),
    }
}
