//! Dialect registry
//!
//! Maps a configured dialect name to a running sink. The registry is
//! consulted twice: at validation (is the name known?) and at startup
//! (build the sink). New dialects register here and in
//! [`Config::dialect_config`](crate::config::Config::dialect_config).

mod file;
mod stdout;

pub use file::FileDialect;
pub use stdout::StdoutDialect;

use crate::config::DialectConfig;
use crate::error::{CollectorError, Result};
use std::sync::Arc;
use tolva_core::Dialect;

/// Build the configured dialect
pub fn build(config: &DialectConfig) -> Result<Arc<dyn Dialect>> {
    match config {
        DialectConfig::Stdout => Ok(Arc::new(StdoutDialect::new())),
        DialectConfig::File(file) => {
            if file.path.is_empty() {
                return Err(CollectorError::Config(
                    "file dialect requires `file.path`".into(),
                ));
            }
            Ok(Arc::new(FileDialect::new(&file.path)))
        }
    }
}
