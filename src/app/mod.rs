//! Application state shared across the HTTP layer

pub mod state;

pub use state::AppState;
