pub mod cli;
pub mod controllers;
pub mod error;
pub mod models;
pub mod platforms;
pub mod text;

// Re-exports for convenience
pub use controllers::{run, RunOptions, RunReport};
pub use error::HmnbError;
pub use models::{Config, NewsEntry, Post};
pub use platforms::Platform;
