use digital_library::policy::{
    Decision, Identity, RedirectReason, Role, RouteClass, SessionUser, decide, is_static_asset,
};
use uuid::Uuid;

fn signed_in(role: Option<Role>) -> Identity {
    Identity::authenticated(
        SessionUser {
            id: Uuid::from_u128(7),
            email: Some("reader@library.test".to_string()),
        },
        role,
    )
}

fn redirect(target: &'static str, reason: RedirectReason) -> Decision {
    Decision::Redirect { target, reason }
}

// --- Route classification ---

#[test]
fn test_classify_auth_pages_by_prefix() {
    assert_eq!(RouteClass::classify("/login"), RouteClass::AuthPage);
    assert_eq!(RouteClass::classify("/signup"), RouteClass::AuthPage);
    assert_eq!(RouteClass::classify("/login/reset"), RouteClass::AuthPage);
    // Plain prefix match, no segment boundary.
    assert_eq!(RouteClass::classify("/loginhelp"), RouteClass::AuthPage);
}

#[test]
fn test_classify_admin_and_other() {
    assert_eq!(RouteClass::classify("/admin"), RouteClass::AdminPage);
    assert_eq!(RouteClass::classify("/admin/contents"), RouteClass::AdminPage);
    assert_eq!(RouteClass::classify("/"), RouteClass::Other);
    assert_eq!(RouteClass::classify("/aulas"), RouteClass::Other);
    assert_eq!(RouteClass::classify("/contents/1/download"), RouteClass::Other);
}

// --- Decisions ---

#[test]
fn test_anonymous_is_sent_to_login_everywhere_but_auth_pages() {
    let anonymous = Identity::anonymous();

    assert_eq!(
        decide(&anonymous, RouteClass::Other),
        redirect("/login", RedirectReason::Unauthenticated)
    );
    assert_eq!(
        decide(&anonymous, RouteClass::AdminPage),
        redirect("/login", RedirectReason::Unauthenticated)
    );
    assert_eq!(decide(&anonymous, RouteClass::AuthPage), Decision::Allow);
}

#[test]
fn test_signed_in_users_leave_auth_pages_for_home() {
    for role in [Some(Role::Admin), Some(Role::User), Some(Role::Demo), None] {
        assert_eq!(
            decide(&signed_in(role), RouteClass::AuthPage),
            redirect("/", RedirectReason::AlreadySignedIn),
            "role {:?}",
            role
        );
    }
}

#[test]
fn test_admin_area_requires_admin_role() {
    assert_eq!(decide(&signed_in(Some(Role::Admin)), RouteClass::AdminPage), Decision::Allow);

    for role in [Some(Role::User), Some(Role::Demo), None] {
        assert_eq!(
            decide(&signed_in(role), RouteClass::AdminPage),
            redirect("/", RedirectReason::Forbidden),
            "role {:?}",
            role
        );
    }
}

#[test]
fn test_any_signed_in_user_may_browse() {
    for role in [Some(Role::Admin), Some(Role::User), Some(Role::Demo), None] {
        assert_eq!(decide(&signed_in(role), RouteClass::Other), Decision::Allow);
    }
}

#[test]
fn test_decision_is_repeatable_and_leaves_identity_untouched() {
    let identities = [
        Identity::anonymous(),
        signed_in(None),
        signed_in(Some(Role::User)),
        signed_in(Some(Role::Demo)),
        signed_in(Some(Role::Admin)),
    ];
    let routes = [RouteClass::AuthPage, RouteClass::AdminPage, RouteClass::Other];

    for identity in &identities {
        let before = identity.clone();
        for route in routes {
            assert_eq!(decide(identity, route), decide(identity, route), "{:?} {:?}", identity, route);
        }
        assert_eq!(identity, &before);
    }
}

#[test]
fn test_identity_accessors() {
    let anonymous = Identity::anonymous();
    assert!(!anonymous.is_authenticated());
    assert!(anonymous.user().is_none());
    assert!(!anonymous.is_admin());

    let admin = signed_in(Some(Role::Admin));
    assert!(admin.is_authenticated());
    assert!(admin.is_admin());
    assert_eq!(admin.user().map(|u| u.id), Some(Uuid::from_u128(7)));

    assert!(!signed_in(None).is_admin());
}

#[test]
fn test_role_parsing() {
    assert_eq!(Role::parse("admin"), Some(Role::Admin));
    assert_eq!(Role::parse("user"), Some(Role::User));
    assert_eq!(Role::parse("demo"), Some(Role::Demo));
    // Case-sensitive, as stored.
    assert_eq!(Role::parse("Admin"), None);
    assert_eq!(Role::parse(""), None);
}

// --- Static asset exclusion ---

#[test]
fn test_static_assets_are_excluded() {
    assert!(is_static_asset("/_next/static/chunks/main.js"));
    assert!(is_static_asset("/_next/image?url=%2Fcover.png"));
    assert!(is_static_asset("/favicon.ico"));
    assert!(is_static_asset("/images/logo.svg"));
    assert!(is_static_asset("/covers/a.jpeg"));
    assert!(is_static_asset("/b.webp"));
}

#[test]
fn test_pages_are_not_static_assets() {
    assert!(!is_static_asset("/"));
    assert!(!is_static_asset("/admin"));
    assert!(!is_static_asset("/login"));
    assert!(!is_static_asset("/contents/1/download"));
    assert!(!is_static_asset("/report.pdf"));
}
