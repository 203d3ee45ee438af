//! HTTP handlers, organized by domain.

pub mod assistant;
pub mod health;
pub mod history;
pub mod pendientes;
pub mod reports;
pub mod router;
pub mod state;

pub use router::{build_protected_routes, build_public_routes};
pub use state::{AppContext, AppState};
