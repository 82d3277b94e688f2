//! `NewsSphere` Client Library
//!
//! Session, access control and typed backend API for the `NewsSphere` news
//! platform. A UI shell drives it through [`NewsSphere`].

pub mod access;
pub mod api;
mod app;
pub mod config;
pub mod identity;
pub mod routes;
pub mod session;
pub mod telemetry;

pub use app::NewsSphere;
pub use config::ClientConfig;
