//! Business logic between the HTTP handlers and the repositories.

pub mod anchor;
pub mod basin;
pub mod navigation;
pub mod position;

pub use anchor::AnchorResolver;
pub use basin::BasinService;
pub use navigation::{validate_request, NavigationParams, NavigationRequest, NavigationService};
