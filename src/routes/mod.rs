/// Router Module Index
///
/// Route groups by audience. Access is enforced once, by the access
/// middleware wrapped around all of them in `create_router`; the admin
/// handlers additionally take the `AdminUser` extractor.

/// Login and sign-up pages (signed-out visitors only).
pub mod public;

/// Catalog, lessons, downloads and AI suggestions (any signed-in user).
pub mod authenticated;

/// Content and lesson management (role `admin`).
pub mod admin;
