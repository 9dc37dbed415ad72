pub mod config;
pub mod news;
pub mod post;
pub mod snapshot;

// Re-export important structs for convenience
pub use config::Config;
pub use news::NewsEntry;
pub use post::Post;
