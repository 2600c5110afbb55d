/// Router Module Index
///
/// Routes are split by the gate stage that protects them. Each protected
/// router gets its middleware applied in `create_router`, so a handler can
/// never be reached without passing its stage.

/// Anonymous access: catalogue browsing, sign-on/sign-off, save-user.
pub mod public;

/// Authenticate only. Per-user resources additionally check identity ownership
/// inside the handler.
pub mod authenticated;

/// Authenticate + AuthorizeRole(seller).
pub mod seller;

/// Authenticate + AuthorizeRole(admin).
pub mod admin;
