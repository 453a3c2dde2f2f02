//! Quality scores from the external oracle.

mod oracle;
mod service;

pub use oracle::{HttpQualityOracle, QUALITY_PATH, QualityOracle};
pub use service::QualityService;
