pub mod filter_controller;
pub mod post_controller;

// Re-export key functions
pub use filter_controller::{not_yet_posted, time_window_filter, NewsFilter, NewsFilters};
pub use post_controller::{run, RunOptions, RunReport};
