//! Route guard policy.
//!
//! Guards are pure consumers of session state: they read it and decide
//! whether a view renders, waits, or redirects. They never mutate it.

use serde::Serialize;

use crate::Role;

/// Landing view for unauthenticated users.
pub const LOGIN_PATH: &str = "/login";

/// Landing view for authenticated users.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Read-only view of session state needed by guards.
pub trait SessionView {
    fn is_loading(&self) -> bool;
    fn is_authenticated(&self) -> bool;
    fn is_logging_out(&self) -> bool;
    fn role(&self) -> Option<&Role>;
}

/// Access class of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAccess {
    /// Login/registration views; authenticated users are sent to the dashboard.
    Public,
    /// Requires an authenticated session.
    Private,
    /// Requires an authenticated session with the admin role.
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    NotAuthenticated,
    AccessDenied,
    AlreadyAuthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Session is still resolving; render nothing yet.
    Wait,
    Render,
    Redirect {
        to: &'static str,
        reason: RedirectReason,
    },
}

/// Decide what a route guard does for the current session state.
///
/// A logout in flight suppresses redirects so the teardown does not race the
/// navigation logout itself performs.
pub fn evaluate<S: SessionView + ?Sized>(access: RouteAccess, session: &S) -> GuardDecision {
    match access {
        RouteAccess::Public => {
            if session.is_authenticated() {
                GuardDecision::Redirect {
                    to: DASHBOARD_PATH,
                    reason: RedirectReason::AlreadyAuthenticated,
                }
            } else {
                GuardDecision::Render
            }
        }
        RouteAccess::Private => {
            if session.is_loading() {
                return GuardDecision::Wait;
            }
            if !session.is_authenticated() && !session.is_logging_out() {
                tracing::debug!("private route without session; redirecting to login");
                return GuardDecision::Redirect {
                    to: LOGIN_PATH,
                    reason: RedirectReason::NotAuthenticated,
                };
            }
            GuardDecision::Render
        }
        RouteAccess::Admin => {
            if session.is_loading() {
                return GuardDecision::Wait;
            }
            let is_admin = session.role().is_some_and(Role::is_admin);
            if !is_admin && !session.is_logging_out() {
                tracing::info!(role = ?session.role(), "admin route denied");
                return GuardDecision::Redirect {
                    to: DASHBOARD_PATH,
                    reason: RedirectReason::AccessDenied,
                };
            }
            GuardDecision::Render
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct View {
        loading: bool,
        logging_out: bool,
        role: Option<Role>,
    }

    impl SessionView for View {
        fn is_loading(&self) -> bool {
            self.loading
        }
        fn is_authenticated(&self) -> bool {
            self.role.is_some()
        }
        fn is_logging_out(&self) -> bool {
            self.logging_out
        }
        fn role(&self) -> Option<&Role> {
            self.role.as_ref()
        }
    }

    fn signed_in(role: Role) -> View {
        View {
            role: Some(role),
            ..View::default()
        }
    }

    #[test]
    fn guards_wait_while_resolving() {
        let view = View {
            loading: true,
            ..View::default()
        };
        assert_eq!(evaluate(RouteAccess::Private, &view), GuardDecision::Wait);
        assert_eq!(evaluate(RouteAccess::Admin, &view), GuardDecision::Wait);
    }

    #[test]
    fn private_redirects_anonymous_users_to_login() {
        assert_eq!(
            evaluate(RouteAccess::Private, &View::default()),
            GuardDecision::Redirect {
                to: LOGIN_PATH,
                reason: RedirectReason::NotAuthenticated
            }
        );
        assert_eq!(
            evaluate(RouteAccess::Private, &signed_in(Role::Usuario)),
            GuardDecision::Render
        );
    }

    #[test]
    fn logout_in_flight_suppresses_redirects() {
        let view = View {
            logging_out: true,
            ..View::default()
        };
        assert_eq!(evaluate(RouteAccess::Private, &view), GuardDecision::Render);
        assert_eq!(evaluate(RouteAccess::Admin, &view), GuardDecision::Render);
    }

    #[test]
    fn admin_routes_require_admin_role() {
        assert_eq!(
            evaluate(RouteAccess::Admin, &signed_in(Role::Usuario)),
            GuardDecision::Redirect {
                to: DASHBOARD_PATH,
                reason: RedirectReason::AccessDenied
            }
        );
        assert_eq!(
            evaluate(RouteAccess::Admin, &signed_in(Role::Admin)),
            GuardDecision::Render
        );
    }

    #[test]
    fn public_routes_bounce_authenticated_users() {
        assert_eq!(evaluate(RouteAccess::Public, &View::default()), GuardDecision::Render);
        assert_eq!(
            evaluate(RouteAccess::Public, &signed_in(Role::Usuario)),
            GuardDecision::Redirect {
                to: DASHBOARD_PATH,
                reason: RedirectReason::AlreadyAuthenticated
            }
        );
    }
}
