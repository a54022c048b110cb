//! Login screen flow.
//!
//! `Idle -> Submitting -> RedirectPending -> Redirected` on success,
//! `Submitting -> Idle` on failure. `RedirectPending` is the success state:
//! the welcome overlay is up and the redirect target, computed from the
//! profile the login call returned, is fixed. Transitions are published on a
//! watch channel so a view can follow them while `submit` runs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::{AuthProfile, AuthService};
use crate::config::REDIRECT_DELAY;
use crate::error::LoginError;
use crate::ui::{Navigator, Notifier, Route};

const WELCOME_TITLE: &str = "Welcome to the clinic!";
const WELCOME_MESSAGE: &str = "You will be redirected to your panel shortly...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    Submitting,
    RedirectPending(Route),
    Redirected(Route),
}

/// Credentials as typed. Kept as-is after a failed attempt.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct LoginFlow {
    auth: Arc<dyn AuthService>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    redirect_delay: Duration,
    state: watch::Sender<LoginState>,
    form: LoginForm,
    profile: Option<AuthProfile>,
}

impl LoginFlow {
    pub fn new(
        auth: Arc<dyn AuthService>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(LoginState::Idle);
        LoginFlow {
            auth,
            notifier,
            navigator,
            redirect_delay: REDIRECT_DELAY,
            state,
            form: LoginForm::default(),
            profile: None,
        }
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    pub fn state(&self) -> LoginState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: LoginState) {
        self.state.send_replace(state);
    }

    pub fn form(&self) -> &LoginForm {
        &self.form
    }

    /// Profile of the last successful login.
    pub fn profile(&self) -> Option<&AuthProfile> {
        self.profile.as_ref()
    }

    pub fn set_email(&mut self, email: &str) {
        self.form.email = email.to_string();
    }

    pub fn set_password(&mut self, password: &str) {
        self.form.password = password.to_string();
    }

    /// Run one login attempt to completion, including the redirect delay.
    pub async fn submit(&mut self) -> Result<Route, LoginError> {
        if self.form.email.trim().is_empty() || self.form.password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        self.set_state(LoginState::Submitting);
        info!(email = %self.form.email, "logging in");

        let outcome = self
            .auth
            .login(&self.form.email, &self.form.password)
            .await;

        let profile = match outcome {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                self.set_state(LoginState::Idle);
                let err = LoginError::InvalidCredentials;
                warn!("login rejected");
                self.notifier.alert(&err.to_string());
                return Err(err);
            }
            Err(e) => {
                self.set_state(LoginState::Idle);
                warn!(error = %e, "login failed");
                self.notifier.alert(&format!("Could not log in: {}", e));
                return Err(e.into());
            }
        };

        let route = Route::for_role(&profile.role);
        self.profile = Some(profile);
        self.notifier.show_overlay(WELCOME_TITLE, WELCOME_MESSAGE);
        self.set_state(LoginState::RedirectPending(route));
        tokio::time::sleep(self.redirect_delay).await;

        self.navigator.navigate(route);
        self.notifier.dismiss_overlay();
        self.set_state(LoginState::Redirected(route));
        info!(%route, "redirected");
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::auth::{Role, StaticAuthService};
    use crate::error::AuthError;
    use crate::ui::testing::RecordingUi;

    struct Unreachable {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthService for Unreachable {
        async fn login(&self, _: &str, _: &str) -> Result<Option<AuthProfile>, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::Network("connection refused".to_string()))
        }
    }

    fn accounts() -> Arc<StaticAuthService> {
        Arc::new(
            StaticAuthService::new()
                .with_account("doc@clinic.test", "pw", Role::Doctor)
                .with_account("pat@clinic.test", "pw", Role::Other("patient".to_string())),
        )
    }

    fn flow(auth: Arc<dyn AuthService>, ui: &Arc<RecordingUi>) -> LoginFlow {
        LoginFlow::new(auth, ui.clone(), ui.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn doctor_is_redirected_to_admin_after_three_seconds() {
        let ui = Arc::new(RecordingUi::default());
        let mut login = flow(accounts(), &ui);
        login.set_email("doc@clinic.test");
        login.set_password("pw");

        let task = tokio::spawn(async move {
            let route = login.submit().await;
            (login, route)
        });

        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(ui.routes().is_empty());
        assert!(ui.overlay_visible());

        let (login, route) = task.await.unwrap();
        assert_eq!(route.unwrap(), Route::Admin);
        assert_eq!(ui.routes(), vec![Route::Admin]);
        assert!(!ui.overlay_visible());
        assert_eq!(login.state(), LoginState::Redirected(Route::Admin));
        assert_eq!(login.profile().unwrap().role, Role::Doctor);
    }

    struct SlowAuth;

    #[async_trait]
    impl AuthService for SlowAuth {
        async fn login(&self, _: &str, _: &str) -> Result<Option<AuthProfile>, AuthError> {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(Some(AuthProfile {
                id: Some(1),
                email: "doc@clinic.test".to_string(),
                name: "doc".to_string(),
                role: Role::Doctor,
            }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transitions_are_observable_while_submitting() {
        let ui = Arc::new(RecordingUi::default());
        let mut login = flow(Arc::new(SlowAuth), &ui);
        login.set_email("doc@clinic.test");
        login.set_password("pw");
        let states = login.subscribe();
        assert_eq!(*states.borrow(), LoginState::Idle);

        let task = tokio::spawn(async move {
            let route = login.submit().await;
            (login, route)
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*states.borrow(), LoginState::Submitting);
        assert!(!ui.overlay_visible());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(*states.borrow(), LoginState::RedirectPending(Route::Admin));
        assert!(ui.overlay_visible());

        let (login, route) = task.await.unwrap();
        assert_eq!(route.unwrap(), Route::Admin);
        assert_eq!(*states.borrow(), LoginState::Redirected(Route::Admin));
        assert_eq!(login.state(), LoginState::Redirected(Route::Admin));
    }

    #[tokio::test(start_paused = true)]
    async fn other_roles_go_to_dashboard() {
        let ui = Arc::new(RecordingUi::default());
        let mut login = flow(accounts(), &ui);
        login.set_email("pat@clinic.test");
        login.set_password("pw");

        assert_eq!(login.submit().await.unwrap(), Route::Dashboard);
        assert_eq!(ui.routes(), vec![Route::Dashboard]);
        assert!(ui.alerts().is_empty());
    }

    #[tokio::test]
    async fn bad_credentials_alert_and_keep_form() {
        let ui = Arc::new(RecordingUi::default());
        let mut login = flow(accounts(), &ui);
        login.set_email("doc@clinic.test");
        login.set_password("wrong");

        let err = login.submit().await.unwrap_err();
        assert!(matches!(err, LoginError::InvalidCredentials));
        assert_eq!(login.state(), LoginState::Idle);
        assert_eq!(login.form().email, "doc@clinic.test");
        assert_eq!(login.form().password, "wrong");
        assert!(ui.routes().is_empty());
        assert_eq!(
            ui.alerts(),
            vec!["Login failed, please check your credentials."]
        );
    }

    #[tokio::test]
    async fn network_failure_has_its_own_message() {
        let ui = Arc::new(RecordingUi::default());
        let auth = Arc::new(Unreachable {
            calls: AtomicUsize::new(0),
        });
        let mut login = flow(auth.clone(), &ui);
        login.set_email("doc@clinic.test");
        login.set_password("pw");

        let err = login.submit().await.unwrap_err();
        assert!(matches!(err, LoginError::Auth(AuthError::Network(_))));
        assert_eq!(login.state(), LoginState::Idle);
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);

        let alerts = ui.alerts();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].contains("Could not reach the server"));
    }

    #[tokio::test]
    async fn missing_fields_never_call_the_service() {
        let ui = Arc::new(RecordingUi::default());
        let auth = Arc::new(Unreachable {
            calls: AtomicUsize::new(0),
        });
        let mut login = flow(auth.clone(), &ui);
        login.set_email("doc@clinic.test");

        let err = login.submit().await.unwrap_err();
        assert!(matches!(err, LoginError::MissingCredentials));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 0);
        assert_eq!(login.state(), LoginState::Idle);
    }

    #[test]
    fn form_debug_hides_password() {
        let form = LoginForm {
            email: "a@b.c".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{form:?}").contains("hunter2"));
    }
}
