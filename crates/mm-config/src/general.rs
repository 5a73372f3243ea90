//! General CLI configuration.

use serde::{Deserialize, Serialize};

/// How command results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// Compact JSON, one document per line.
    Raw,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub output_format: OutputFormat,
}
