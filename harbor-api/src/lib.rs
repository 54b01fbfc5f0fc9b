//! Harbor API - REST Layer
//!
//! Axum handlers over `HarborDbClient`. Each entity kind gets its own
//! route module; the store backend is chosen at startup from
//! `StoreConfig`.

#[macro_use]
mod macros;

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{ApiConfig, LogFormat};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_router;
pub use state::AppState;
