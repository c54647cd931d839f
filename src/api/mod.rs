//! HTTP API layer: auth, route wiring, and thin handlers over the core.

pub mod auth;
pub mod points;
pub mod routes;
pub mod tasks;
pub mod types;

pub use routes::serve;
