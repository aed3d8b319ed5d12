pub mod config;
pub mod emotion;
pub mod error;
pub mod error_utils;
pub mod seen;
pub mod types;

pub use config::*;
pub use emotion::*;
pub use error::*;
pub use error_utils::*;
pub use seen::*;
pub use types::*;
