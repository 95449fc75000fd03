//! GDPR privacy setup core — site configuration, consent categories, errors.

pub mod category;
pub mod config;
pub mod error;

pub use category::PolicyCategory;
pub use config::{DataPaths, ServerConfig, SiteConfig};
pub use error::{Error, Result};
