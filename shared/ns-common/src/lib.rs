//! `NewsSphere` Common Library
//!
//! Wire types exchanged with the `NewsSphere` backend, shared by every client crate.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
