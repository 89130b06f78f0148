pub mod config;
pub mod money;
pub mod slip_date;

pub use config::{ConfigError, OcrConfig, PreprocessConfig, SlipConfig, StorageConfig};
pub use money::Amount;
pub use slip_date::SlipDate;
