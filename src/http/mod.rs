//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → middleware/admission.rs (admit, 429 or 423; security headers)
//!     → lockout.rs | admin API | proxy_handler → upstream
//!     → Send to client
//! ```

pub mod lockout;
pub mod middleware;
pub mod server;

pub use server::{AppState, HttpServer};
