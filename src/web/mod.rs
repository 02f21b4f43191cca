//! HTTP read surface: RSS documents, HTML pages and a few JSON endpoints.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::{BoundServer, WebServer};
