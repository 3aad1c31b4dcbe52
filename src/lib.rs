pub mod config;
pub mod error;
pub mod scan;
pub mod extract;
pub mod prompt;
pub mod generate;
pub mod patch;
pub mod cost;
pub mod driver;

pub use config::Config;
pub use error::{DocstringerError, FailureKind, Result};
pub use driver::{Driver, Mode, RunSummary};
