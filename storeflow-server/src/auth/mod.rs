//! Authentication and authorization
//!
//! - [`provider`]: identity provider contract (admins)
//! - [`staff_session`]: local session token for passwordless staff
//! - [`session`]: reactive session/tenant resolution
//! - [`permissions`]: role → capability table
//! - [`login`]: login / sign-out flows
//! - [`guard`]: route guards

pub mod guard;
pub mod login;
pub mod permissions;
pub mod provider;
pub mod session;
pub mod staff_session;

pub use guard::{GuardDecision, Route, default_route, guard, super_guard};
pub use login::AuthService;
pub use permissions::{Capabilities, Capability};
pub use provider::{IdentityProvider, MemoryIdentityProvider, ProviderUser};
pub use session::{Identity, Principal, SessionResolver, SessionState};
pub use staff_session::{
    FileSessionStorage, MemorySessionStorage, SessionStorage, StaffSession, StaffSessionStore,
};
