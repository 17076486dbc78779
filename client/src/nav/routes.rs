//! Declared navigable surface and path matching.
//!
//! DESIGN
//! ======
//! The table is static: descriptors are built once by [`RouteTable::standard`]
//! and never mutated. Patterns are matched segment by segment; a `:name`
//! segment matches any single non-empty segment.

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;

use std::fmt;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const ADMIN_HOME_PATH: &str = "/admin";

/// Minimum standing required to view a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Public,
    User,
    Admin,
}

impl Capability {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub pattern: &'static str,
    pub capability: Capability,
    /// Whether the main navigation bar is drawn on this screen.
    pub navbar: bool,
}

impl RouteDescriptor {
    #[must_use]
    pub const fn new(pattern: &'static str, capability: Capability, navbar: bool) -> Self {
        Self { pattern, capability, navbar }
    }

    /// Whether a normalized `path` matches this pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let mut pattern = segments(self.pattern);
        let mut actual = segments(path);
        loop {
            match (pattern.next(), actual.next()) {
                (None, None) => return true,
                (Some(p), Some(a)) if p.starts_with(':') || p == a => {}
                _ => return false,
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// How a requested path maps onto the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    Route(&'a RouteDescriptor),
    /// Permanent redirect to another path (e.g. `/` to `/dashboard`).
    Alias(&'static str),
    /// Nothing matched; navigation continues at the table's fallback.
    Unknown,
}

#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
    aliases: Vec<(&'static str, &'static str)>,
    fallback: &'static str,
}

const AUTH_PAGES: [&str; 5] = ["/login", "/register", "/reset-password", "/verify-otp", "/set-new-password"];

const USER_PAGES: [&str; 14] = [
    "/dashboard",
    "/content-generator",
    "/template-library",
    "/template/:id",
    "/template-edit/:id",
    "/create-template",
    "/content-history",
    "/pricing",
    "/settings/profile",
    "/settings/preferences",
    "/settings/notifications",
    "/settings/security",
    "/settings/billing",
    "/settings/api",
];

const ADMIN_PAGES: [&str; 8] = [
    "/admin",
    "/admin/dashboard",
    "/admin/analytics",
    "/admin/content-generator",
    "/admin/content-history",
    "/admin/users",
    "/admin/history",
    "/admin/profile",
];

impl RouteTable {
    #[must_use]
    pub fn new(
        routes: Vec<RouteDescriptor>,
        aliases: Vec<(&'static str, &'static str)>,
        fallback: &'static str,
    ) -> Self {
        Self { routes, aliases, fallback }
    }

    /// The product's screens: auth pages are public and chrome-less, the
    /// workspace requires any signed-in user, and the admin console requires
    /// the admin role and draws its own chrome.
    #[must_use]
    pub fn standard() -> Self {
        let routes = AUTH_PAGES
            .into_iter()
            .map(|p| RouteDescriptor::new(p, Capability::Public, false))
            .chain(USER_PAGES.into_iter().map(|p| RouteDescriptor::new(p, Capability::User, true)))
            .chain(ADMIN_PAGES.into_iter().map(|p| RouteDescriptor::new(p, Capability::Admin, false)))
            .collect();
        Self::new(routes, vec![(HOME_PATH, DASHBOARD_PATH)], HOME_PATH)
    }

    #[must_use]
    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    #[must_use]
    pub fn aliases(&self) -> &[(&'static str, &'static str)] {
        &self.aliases
    }

    #[must_use]
    pub fn fallback(&self) -> &'static str {
        self.fallback
    }

    /// Resolve a normalized path. Aliases win over routes.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Resolution<'_> {
        if let Some((_, to)) = self.aliases.iter().find(|(from, _)| *from == path) {
            return Resolution::Alias(*to);
        }
        self.routes
            .iter()
            .find(|r| r.matches(path))
            .map_or(Resolution::Unknown, Resolution::Route)
    }

    /// Whether the navigation bar is drawn at `path`. Anything under `/admin`
    /// hides it, matched or not.
    #[must_use]
    pub fn shows_navbar(&self, path: &str) -> bool {
        let path = normalize_path(path);
        if path == ADMIN_HOME_PATH || path.starts_with("/admin/") {
            return false;
        }
        match self.resolve(&path) {
            Resolution::Route(route) => route.navbar,
            Resolution::Alias(_) | Resolution::Unknown => true,
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Canonical form of a requested location: leading slash, no query or
/// fragment, no empty segments, no trailing slash.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let raw = raw.trim();
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    let joined = segments(&raw[..end]).collect::<Vec<_>>().join("/");
    format!("/{joined}")
}
