//! # Access Guard
//!
//! Decides whether the current Identity may enter a navigation area.
//!
//! ## Decision Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Requested path        Anonymous          role=user       role=admin    │
//! │  ───────────────────   ────────────────   ─────────────   ───────────── │
//! │  /  /login  /register  Allow              Allow           Allow         │
//! │  /shop, /shop/*        → /login           Allow           → /admin      │
//! │  /admin, /admin/*      → /login           → /shop         Allow         │
//! │  anything else         Allow (public)     Allow           Allow         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This is the only place where `Role` gains enforcement meaning. Route
//! rendering itself is the consumer's business.

use serde::Serialize;

use crate::types::{Identity, Role};

/// Route anonymous users are sent to.
pub const LOGIN_ROUTE: &str = "/login";

/// Route a fresh sign-up is sent to.
pub const REGISTER_ROUTE: &str = "/register";

// =============================================================================
// Area
// =============================================================================

/// A navigation area and the role it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Public,
    Shop,
    Admin,
}

impl Area {
    /// Classifies a path. Query strings and fragments are ignored.
    pub fn for_path(path: &str) -> Area {
        let path = path.split(['?', '#']).next().unwrap_or("");
        if under(path, "/shop") {
            Area::Shop
        } else if under(path, "/admin") {
            Area::Admin
        } else {
            Area::Public
        }
    }

    pub fn required_role(&self) -> Option<Role> {
        match self {
            Area::Public => None,
            Area::Shop => Some(Role::User),
            Area::Admin => Some(Role::Admin),
        }
    }
}

/// `/shop` and `/shop/...` match, `/shopping` does not.
fn under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

// =============================================================================
// Decision
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "route", rename_all = "snake_case")]
pub enum AccessDecision {
    /// Render the requested area.
    Allow,
    /// Not signed in.
    RedirectToLogin,
    /// Signed in with the wrong role; go to that role's home area.
    RedirectTo(String),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    /// Where the consumer should navigate, if anywhere.
    pub fn redirect(&self) -> Option<&str> {
        match self {
            AccessDecision::Allow => None,
            AccessDecision::RedirectToLogin => Some(LOGIN_ROUTE),
            AccessDecision::RedirectTo(route) => Some(route),
        }
    }
}

/// Decides access to `path` for `identity` (`None` = anonymous).
///
/// An Identity with an empty session token counts as anonymous.
///
/// ## Example
/// ```rust
/// use storefront_core::access::{guard, AccessDecision};
///
/// assert_eq!(guard(None, "/shop/cart"), AccessDecision::RedirectToLogin);
/// assert_eq!(guard(None, "/"), AccessDecision::Allow);
/// ```
pub fn guard(identity: Option<&Identity>, path: &str) -> AccessDecision {
    let Some(required) = Area::for_path(path).required_role() else {
        return AccessDecision::Allow;
    };

    match identity.filter(|i| i.is_valid()) {
        None => AccessDecision::RedirectToLogin,
        Some(identity) if identity.role == required => AccessDecision::Allow,
        Some(identity) => AccessDecision::RedirectTo(identity.role.home_route().to_string()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityId;

    fn identity(role: Role) -> Identity {
        Identity {
            id: EntityId::from(1u64),
            name: "Test".to_string(),
            email: "t@example.com".to_string(),
            role,
            session_token: "token".to_string(),
        }
    }

    #[test]
    fn test_area_classification() {
        assert_eq!(Area::for_path("/"), Area::Public);
        assert_eq!(Area::for_path("/login"), Area::Public);
        assert_eq!(Area::for_path("/register"), Area::Public);
        assert_eq!(Area::for_path("/shop"), Area::Shop);
        assert_eq!(Area::for_path("/shop/cart?x=1"), Area::Shop);
        assert_eq!(Area::for_path("/shopping"), Area::Public);
        assert_eq!(Area::for_path("/admin/orders"), Area::Admin);
        assert_eq!(Area::for_path("/admin#top"), Area::Admin);
    }

    #[test]
    fn test_public_paths_always_allowed() {
        assert_eq!(guard(None, "/"), AccessDecision::Allow);
        assert_eq!(guard(None, "/login"), AccessDecision::Allow);
        assert_eq!(guard(Some(&identity(Role::Admin)), "/register"), AccessDecision::Allow);
    }

    #[test]
    fn test_anonymous_redirected_to_login() {
        assert_eq!(guard(None, "/shop"), AccessDecision::RedirectToLogin);
        assert_eq!(guard(None, "/admin/products"), AccessDecision::RedirectToLogin);
        assert_eq!(
            guard(None, "/admin").redirect(),
            Some(LOGIN_ROUTE)
        );
    }

    #[test]
    fn test_matching_role_allowed() {
        assert!(guard(Some(&identity(Role::User)), "/shop/cart").is_allowed());
        assert!(guard(Some(&identity(Role::Admin)), "/admin").is_allowed());
    }

    #[test]
    fn test_wrong_role_redirected_home() {
        assert_eq!(
            guard(Some(&identity(Role::User)), "/admin"),
            AccessDecision::RedirectTo("/shop".to_string())
        );
        assert_eq!(
            guard(Some(&identity(Role::Admin)), "/shop/orders"),
            AccessDecision::RedirectTo("/admin".to_string())
        );
    }

    #[test]
    fn test_tokenless_identity_counts_as_anonymous() {
        let mut ghost = identity(Role::User);
        ghost.session_token.clear();
        assert_eq!(guard(Some(&ghost), "/shop"), AccessDecision::RedirectToLogin);
    }
}
