//! Configuration loading
//!
//! Layers explicit values, environment variables, an optional file and
//! built-in fallbacks into a [`tokenrelay_domain::ClientConfig`].

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_file, load_with, resolve, ConfigLayer, PartialConfig};
