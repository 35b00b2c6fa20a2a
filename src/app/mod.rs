//! Service wiring for the binary

mod state;

pub use state::AppState;
