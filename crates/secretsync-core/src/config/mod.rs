//! System configuration loading and validation.

mod loader;
mod schema;

pub use loader::*;
pub use schema::*;
