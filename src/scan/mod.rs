pub mod ignore_filter;
pub mod walker;

pub use ignore_filter::{find_git_root, IgnoreFilter};
pub use walker::{SourceEntry, SourceScanner, SOURCE_EXTENSION};
