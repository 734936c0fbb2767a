//! Route guards
//!
//! Guards only look at the resolved [`SessionState`] and its capabilities.
//! While the first resolution is still running they answer `Loading`, never a
//! redirect, so a cold start does not bounce a signed-in user to the login page.

use shared::models::Feature;

use super::permissions::{Capabilities, Capability};
use super::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    // 인증
    Login,
    SuperLogin,
    SetPassword,
    // 매장 (storeAdmin / staff)
    Reservations,
    Prepay,
    Hr,
    Payroll,
    Staff,
    Settings,
    Backup,
    // 슈퍼 관리자
    SuperStores,
    SuperBackup,
}

impl Route {
    pub const ALL: [Route; 12] = [
        Route::Login,
        Route::SuperLogin,
        Route::SetPassword,
        Route::Reservations,
        Route::Prepay,
        Route::Hr,
        Route::Payroll,
        Route::Staff,
        Route::Settings,
        Route::Backup,
        Route::SuperStores,
        Route::SuperBackup,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/auth/login",
            Route::SuperLogin => "/auth/super",
            Route::SetPassword => "/auth/set-password",
            Route::Reservations => "/app/reservations",
            Route::Prepay => "/app/prepay",
            Route::Hr => "/app/hr",
            Route::Payroll => "/app/payroll",
            Route::Staff => "/app/staff",
            Route::Settings => "/app/settings",
            Route::Backup => "/app/backup",
            Route::SuperStores => "/super/stores",
            Route::SuperBackup => "/super/backup",
        }
    }

    pub fn from_path(path: &str) -> Option<Route> {
        let path = path.trim_end_matches('/');
        Route::ALL.into_iter().find(|r| r.path() == path)
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login | Route::SuperLogin | Route::SetPassword)
    }

    pub fn is_super(&self) -> bool {
        matches!(self, Route::SuperStores | Route::SuperBackup)
    }

    /// Capability needed beyond being signed in
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Route::Reservations => Some(Capability::ViewReservations),
            Route::Prepay => Some(Capability::ViewPrepay),
            Route::Hr | Route::Payroll => Some(Capability::ViewHr),
            Route::Staff => Some(Capability::ManageStaff),
            Route::Settings => Some(Capability::ManageStore),
            Route::Backup => Some(Capability::ViewBackup),
            Route::SuperStores | Route::SuperBackup => Some(Capability::AccessSuper),
            Route::Login | Route::SuperLogin | Route::SetPassword => None,
        }
    }

    /// Store feature the page belongs to
    pub fn feature(&self) -> Option<Feature> {
        match self {
            Route::Reservations => Some(Feature::Reservations),
            Route::Prepay => Some(Feature::Prepay),
            Route::Hr => Some(Feature::Hr),
            Route::Payroll => Some(Feature::Payroll),
            _ => None,
        }
    }
}

/// Landing route for a capability set; `None` is the signed-out case
pub fn default_route(caps: Option<&Capabilities>) -> Route {
    match caps {
        Some(caps) if caps.can_access_super => Route::SuperStores,
        Some(_) => Route::Reservations,
        None => Route::Login,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Loading,
    Allow,
    Redirect(Route),
}

/// Guard for `/app/*` routes.
///
/// `required`, when given, is checked on top of the route's own capability;
/// a miss lands on the caller's default route.
pub fn guard(state: &SessionState, route: Route, required: Option<Capability>) -> GuardDecision {
    if route.is_public() {
        return GuardDecision::Allow;
    }
    if state.loading {
        return GuardDecision::Loading;
    }
    if !state.is_authenticated() || state.account.is_none() {
        // Signed out, or a provider user without an account document
        return GuardDecision::Redirect(Route::Login);
    }
    if route.is_super() {
        return super_guard(state, route);
    }
    let caps = state.capabilities();
    let landing = default_route(Some(&caps));
    if caps.can_access_super {
        return GuardDecision::Redirect(landing);
    }
    if state.missing_tenant() || state.store.is_none() {
        return GuardDecision::Redirect(Route::Login);
    }

    if route
        .capability()
        .into_iter()
        .chain(required)
        .any(|cap| !caps.has(cap))
    {
        return GuardDecision::Redirect(landing);
    }
    if let Some(feature) = route.feature()
        && state.is_feature_disabled(feature)
        && route != landing
    {
        return GuardDecision::Redirect(landing);
    }
    GuardDecision::Allow
}

/// Guard for `/super/*` routes
pub fn super_guard(state: &SessionState, route: Route) -> GuardDecision {
    if state.loading {
        return GuardDecision::Loading;
    }
    if !state.is_authenticated() {
        return GuardDecision::Redirect(Route::SuperLogin);
    }
    if !state.capabilities().has(Capability::AccessSuper) {
        let caps = state.account.as_ref().map(|_| state.capabilities());
        return GuardDecision::Redirect(default_route(caps.as_ref()));
    }
    if route.is_super() {
        GuardDecision::Allow
    } else {
        GuardDecision::Redirect(Route::SuperStores)
    }
}
