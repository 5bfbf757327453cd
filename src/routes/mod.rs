/// Router Module Index
///
/// Routes are split by access requirement so protection is applied per
/// module by a layer, never remembered per handler.

/// Routes reachable without an admin session.
pub mod public;

/// Routes behind the `require_admin` session middleware.
pub mod admin;
