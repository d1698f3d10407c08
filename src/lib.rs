pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod load;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod util;
pub mod version;

pub use error::{Error, Result};
