//! How a front end reacts to session events.
//!
//! The API client never navigates by itself; it emits
//! [`SessionEvent::Expired`]. A front end owns a [`Navigator`] and feeds the
//! events through a [`Redirector`], which decides where to go.

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::auth::SessionEvent;

pub const LOGIN_VIEW: &str = "/login";
pub const REGISTER_VIEW: &str = "/register";
pub const DASHBOARD_VIEW: &str = "/dashboard";

pub trait Navigator {
    fn current_path(&self) -> String;
    fn navigate(&mut self, path: &str);
}

/// Where to go after `event`, if anywhere.
///
/// An expired session goes to the login view unless already there. A
/// successful login from the login or register view goes to the dashboard.
pub fn route_for(event: &SessionEvent, current_path: &str) -> Option<&'static str> {
    match event {
        SessionEvent::Expired if !current_path.contains(LOGIN_VIEW) => Some(LOGIN_VIEW),
        SessionEvent::LoggedIn(_) if current_path == LOGIN_VIEW || current_path == REGISTER_VIEW => {
            Some(DASHBOARD_VIEW)
        }
        _ => None,
    }
}

pub struct Redirector<N> {
    navigator: N,
}

impl<N: Navigator> Redirector<N> {
    pub fn new(navigator: N) -> Self {
        Self { navigator }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Apply one event; returns the path navigated to.
    pub fn handle(&mut self, event: &SessionEvent) -> Option<&'static str> {
        let target = route_for(event, &self.navigator.current_path())?;
        debug!(path = target, "Navigating after session event");
        self.navigator.navigate(target);
        Some(target)
    }

    /// Apply every event already queued on `rx` without waiting.
    pub fn drain(&mut self, rx: &mut broadcast::Receiver<SessionEvent>) -> usize {
        let mut navigations = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    if self.handle(&event).is_some() {
                        navigations += 1;
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session events lagged");
                }
                Err(_) => return navigations,
            }
        }
    }

    /// Apply events until the channel closes.
    pub async fn run(mut self, mut rx: broadcast::Receiver<SessionEvent>) -> N {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    self.handle(&event);
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Session events lagged"),
                Err(RecvError::Closed) => return self.navigator,
            }
        }
    }
}
