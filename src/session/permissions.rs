//! Permission and role checks plus the console's route access table.
//!
//! UX-only gating: the API still enforces every permission server-side.

use crate::session::types::{Session, User};

/// Superuser permission that satisfies every check.
pub const ADMIN_PERMISSION: &str = "ADMIN";

/// False without a user; true for `ADMIN` holders or an exact match.
#[must_use]
pub fn has_permission(session: &Session, permission: &str) -> bool {
    session
        .user()
        .is_some_and(|user| user_has_permission(user, permission))
}

/// Exact, case-sensitive role name match.
#[must_use]
pub fn has_role(session: &Session, role_name: &str) -> bool {
    session
        .user()
        .and_then(|user| user.role.as_ref())
        .is_some_and(|role| role.name == role_name)
}

fn user_has_permission(user: &User, permission: &str) -> bool {
    let Some(role) = user.role.as_ref() else {
        return false;
    };
    role.permissions.contains(ADMIN_PERMISSION) || role.permissions.contains(permission)
}

/// One protected page inside the app root. Any listed permission grants access.
#[derive(Clone, Copy, Debug)]
pub struct RouteRule {
    pub path: &'static str,
    pub any_of: &'static [&'static str],
}

/// Pages inside the app root, relative to it.
pub const CONSOLE_ROUTES: &[RouteRule] = &[
    RouteRule { path: "/", any_of: &[] },
    RouteRule { path: "/classrooms", any_of: &["CLASSES_VIEW"] },
    RouteRule { path: "/school-years", any_of: &["SCHOOL_YEARS_MANAGE"] },
    RouteRule { path: "/students", any_of: &["STUDENTS_VIEW"] },
    RouteRule { path: "/payments", any_of: &["PAYMENTS_VIEW"] },
    RouteRule { path: "/categories", any_of: &["CATEGORIES_VIEW"] },
    RouteRule { path: "/products", any_of: &["CATEGORIES_VIEW"] },
    RouteRule { path: "/monitoring", any_of: &["MONITORING_VIEW", ADMIN_PERMISSION] },
    RouteRule { path: "/users", any_of: &["USERS_VIEW"] },
    RouteRule { path: "/roles", any_of: &["ROLES_VIEW"] },
    RouteRule { path: "/permissions", any_of: &["PERMISSIONS_VIEW"] },
    RouteRule { path: "/notifications", any_of: &[] },
    RouteRule { path: "/settings", any_of: &[] },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteAccess {
    Allow,
    /// Unknown page or missing permission: go back to the app root.
    RedirectToRoot,
}

/// Decide access to `path` (relative to the app root) for the current user.
/// Anonymous callers are the redirect policy's business, not this table's.
#[must_use]
pub fn route_access(session: &Session, path: &str) -> RouteAccess {
    let Some(rule) = CONSOLE_ROUTES.iter().find(|rule| rule.path == path) else {
        return RouteAccess::RedirectToRoot;
    };
    if rule.any_of.is_empty()
        || rule
            .any_of
            .iter()
            .any(|permission| has_permission(session, permission))
    {
        RouteAccess::Allow
    } else {
        RouteAccess::RedirectToRoot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::types::{AuthenticatedSession, Role, UserId};
    use secrecy::SecretString;
    use time::OffsetDateTime;

    fn session_with(role: &str, permissions: &[&str]) -> Session {
        Session::Authenticated(AuthenticatedSession {
            user: User {
                id: UserId::from(9),
                username: "staff".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                role: Some(Role {
                    name: role.to_string(),
                    permissions: permissions.iter().map(ToString::to_string).collect(),
                }),
            },
            token: SecretString::from("tok"),
            expires_at: OffsetDateTime::UNIX_EPOCH,
        })
    }

    #[test]
    fn admin_permission_is_a_superuser() {
        let session = session_with("ADMIN", &["ADMIN"]);
        assert!(has_permission(&session, "ANYTHING"));
        assert!(has_permission(&session, "USERS_ADMIN"));
    }

    #[test]
    fn exact_permission_match_only() {
        let session = session_with("SECRETARY", &["USERS_VIEW"]);
        assert!(has_permission(&session, "USERS_VIEW"));
        assert!(!has_permission(&session, "USERS_ADMIN"));
        assert!(!has_permission(&session, "users_view"));
    }

    #[test]
    fn no_user_means_no_permission_or_role() {
        assert!(!has_permission(&Session::Anonymous, "USERS_VIEW"));
        assert!(!has_role(&Session::Anonymous, "ADMIN"));
        assert!(!has_role(&Session::Expired, ""));
    }

    #[test]
    fn role_match_is_case_sensitive() {
        let session = session_with("Bursar", &[]);
        assert!(has_role(&session, "Bursar"));
        assert!(!has_role(&session, "bursar"));
        assert!(!has_role(&session, "Burs*"));
    }

    #[test]
    fn route_table_follows_permissions() {
        let clerk = session_with("CLERK", &["CATEGORIES_VIEW"]);
        assert_eq!(route_access(&clerk, "/"), RouteAccess::Allow);
        assert_eq!(route_access(&clerk, "/products"), RouteAccess::Allow);
        assert_eq!(route_access(&clerk, "/users"), RouteAccess::RedirectToRoot);
        assert_eq!(route_access(&clerk, "/settings"), RouteAccess::Allow);
        assert_eq!(route_access(&clerk, "/nowhere"), RouteAccess::RedirectToRoot);

        let admin = session_with("ADMIN", &["ADMIN"]);
        assert_eq!(route_access(&admin, "/monitoring"), RouteAccess::Allow);
    }

    #[test]
    fn school_pages_follow_their_permissions() {
        let pages = [
            ("/classrooms", "CLASSES_VIEW"),
            ("/school-years", "SCHOOL_YEARS_MANAGE"),
            ("/students", "STUDENTS_VIEW"),
            ("/payments", "PAYMENTS_VIEW"),
        ];
        let nobody = session_with("CLERK", &[]);
        let admin = session_with("ADMIN", &["ADMIN"]);
        for (path, permission) in pages {
            let holder = session_with("CLERK", &[permission]);
            assert_eq!(route_access(&holder, path), RouteAccess::Allow, "{path}");
            assert_eq!(route_access(&nobody, path), RouteAccess::RedirectToRoot, "{path}");
            assert_eq!(route_access(&admin, path), RouteAccess::Allow, "{path}");
        }

        let cashier = session_with("CASHIER", &["STUDENTS_VIEW", "PAYMENTS_VIEW"]);
        assert_eq!(route_access(&cashier, "/students"), RouteAccess::Allow);
        assert_eq!(route_access(&cashier, "/payments"), RouteAccess::Allow);
        assert_eq!(route_access(&cashier, "/classrooms"), RouteAccess::RedirectToRoot);
    }
}
