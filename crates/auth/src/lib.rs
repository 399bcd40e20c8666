//! `almacen-auth`: client-side authentication vocabulary.
//!
//! Token claims, roles, the user profile and the route guard policy. This
//! crate is intentionally decoupled from HTTP and from session state.

pub mod claims;
pub mod guard;
pub mod profile;
pub mod roles;

pub use claims::{ClaimReader, JwtClaimReader, TokenClaims, TokenError, refresh_delay};
pub use guard::{GuardDecision, RedirectReason, RouteAccess, SessionView, evaluate};
pub use profile::{ProfileResponse, UserProfile};
pub use roles::Role;
