//! Presentation boundary: alerts, the login confirmation overlay, and
//! navigation. The console binary and the tests provide implementations.

use std::fmt;

use crate::auth::Role;

/// Routes the login flow can redirect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Admin,
    Dashboard,
}

impl Route {
    /// Doctors land on the admin panel, everyone else on the dashboard.
    pub fn for_role(role: &Role) -> Self {
        match role {
            Role::Doctor => Route::Admin,
            Role::Other(_) => Route::Dashboard,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Admin => "/admin",
            Route::Dashboard => "/dashboard",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// User-facing messages.
pub trait Notifier: Send + Sync {
    /// Blocking alert the user has to acknowledge.
    fn alert(&self, message: &str);

    /// Transient confirmation overlay.
    fn show_overlay(&self, title: &str, message: &str);

    fn dismiss_overlay(&self);
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every call for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingUi {
        pub alerts: Mutex<Vec<String>>,
        pub overlays: Mutex<Vec<String>>,
        pub overlay_visible: Mutex<bool>,
        pub routes: Mutex<Vec<Route>>,
    }

    impl RecordingUi {
        pub(crate) fn alerts(&self) -> Vec<String> {
            self.alerts.lock().unwrap().clone()
        }

        pub(crate) fn routes(&self) -> Vec<Route> {
            self.routes.lock().unwrap().clone()
        }

        pub(crate) fn overlay_visible(&self) -> bool {
            *self.overlay_visible.lock().unwrap()
        }
    }

    impl Notifier for RecordingUi {
        fn alert(&self, message: &str) {
            self.alerts.lock().unwrap().push(message.to_string());
        }

        fn show_overlay(&self, title: &str, _message: &str) {
            self.overlays.lock().unwrap().push(title.to_string());
            *self.overlay_visible.lock().unwrap() = true;
        }

        fn dismiss_overlay(&self) {
            *self.overlay_visible.lock().unwrap() = false;
        }
    }

    impl Navigator for RecordingUi {
        fn navigate(&self, route: Route) {
            self.routes.lock().unwrap().push(route);
        }
    }
}
