//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireStaffLike`] -- Requires staff, branch_admin or superadmin.

pub mod auth;
pub mod rbac;
