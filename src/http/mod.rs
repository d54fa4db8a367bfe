//! HTTP layer - routing, handlers, auth middleware, request validation

pub mod middleware;
pub mod routes;
pub mod validation;

pub use routes::build_router;
