pub mod arff;
pub mod config;
pub mod error;
pub mod extractor;
pub mod index;
pub mod pipeline;
pub mod registry;
pub mod script;
pub mod source;

pub use error::{Result, WsdError};

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn get_version() -> &'static str {
    VERSION
}
