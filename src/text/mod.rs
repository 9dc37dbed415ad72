pub mod canonicalize;
pub mod paginate;
pub mod spans;

pub use canonicalize::canonicalize;
pub use paginate::{split_into_posts, PaginationConfig, SuffixPlacement};
