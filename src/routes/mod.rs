//! Route groups, split by who may reach them.
//!
//! Every group sits behind `auth::resolve_auth`, which attaches the request's
//! `AuthContext`. The authenticated and admin groups add their own guard.

/// Pages and JSON API open to anonymous visitors.
pub mod public;

/// Member pages. Anonymous requests are redirected to `/login`.
pub mod authenticated;

/// Admin pages and actions. Everyone else gets a bare 403.
pub mod admin;
