//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- The caller identified by a JWT Bearer token.
//! - [`rbac::RequireHr`] -- Requires the `hr` or `admin` role.

pub mod auth;
pub mod rbac;
