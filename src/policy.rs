use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role
///
/// The RBAC value stored in `public.profiles.role`. Only `Admin` unlocks the
/// management screens; `Demo` accounts can browse but not download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    User,
    Demo,
}

impl Role {
    /// Parses the raw column value. Unknown strings yield `None`, which the
    /// policy treats exactly like a missing profile.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            "demo" => Some(Role::Demo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Demo => "demo",
        }
    }
}

/// The authenticated principal behind a request, as asserted by a verified
/// Supabase access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Identity
///
/// Resolved authentication/authorization state for a single request.
/// Built once by the access middleware and carried in request extensions;
/// it is never cached across requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    user: Option<SessionUser>,
    role: Option<Role>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated identity. `role` is `None` when the profile is
    /// missing, unreadable, or carries an unknown role.
    pub fn authenticated(user: SessionUser, role: Option<Role>) -> Self {
        Self {
            user: Some(user),
            role,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }
}

/// Coarse classification of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    AuthPage,
    AdminPage,
    Other,
}

pub const LOGIN_PATH: &str = "/login";
pub const SIGNUP_PATH: &str = "/signup";
pub const ADMIN_PATH: &str = "/admin";
pub const HOME_PATH: &str = "/";

impl RouteClass {
    /// Prefix match on the raw path, mirroring the edge matcher:
    /// `/login*` and `/signup*` are auth pages, `/admin*` is the admin area.
    pub fn classify(path: &str) -> Self {
        if path.starts_with(LOGIN_PATH) || path.starts_with(SIGNUP_PATH) {
            RouteClass::AuthPage
        } else if path.starts_with(ADMIN_PATH) {
            RouteClass::AdminPage
        } else {
            RouteClass::Other
        }
    }
}

/// Why a request was turned away. Used for logging only; the redirect
/// target is fully determined by the rule that fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    Unauthenticated,
    AlreadySignedIn,
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect {
        target: &'static str,
        reason: RedirectReason,
    },
}

impl Decision {
    fn redirect(target: &'static str, reason: RedirectReason) -> Self {
        Decision::Redirect { target, reason }
    }
}

/// decide
///
/// The route-access policy. Rules are evaluated in order and the first match wins:
///
/// 1. anonymous outside the auth pages → `/login`
/// 2. signed in on an auth page → `/`
/// 3. admin area: anonymous → `/login`, any role other than admin → `/`
/// 4. otherwise allow
///
/// Admins are not bounced from `/` to `/admin`; they navigate there themselves.
pub fn decide(identity: &Identity, route: RouteClass) -> Decision {
    let authenticated = identity.is_authenticated();

    if !authenticated && route != RouteClass::AuthPage {
        return Decision::redirect(LOGIN_PATH, RedirectReason::Unauthenticated);
    }

    if authenticated && route == RouteClass::AuthPage {
        return Decision::redirect(HOME_PATH, RedirectReason::AlreadySignedIn);
    }

    if route == RouteClass::AdminPage {
        if !authenticated {
            return Decision::redirect(LOGIN_PATH, RedirectReason::Unauthenticated);
        }
        if !identity.is_admin() {
            return Decision::redirect(HOME_PATH, RedirectReason::Forbidden);
        }
    }

    Decision::Allow
}

const STATIC_PREFIXES: [&str; 3] = ["/_next/static", "/_next/image", "/favicon.ico"];
const IMAGE_EXTENSIONS: [&str; 6] = [".svg", ".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// is_static_asset
///
/// Paths the access middleware never evaluates: build assets, the favicon
/// and common image files.
pub fn is_static_asset(path: &str) -> bool {
    let trimmed = path.trim_start_matches('/');
    STATIC_PREFIXES
        .iter()
        .any(|prefix| trimmed.starts_with(prefix.trim_start_matches('/')))
        || IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
