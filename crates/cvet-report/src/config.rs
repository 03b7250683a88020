use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub color: bool,
    pub format: OutputFormat,
    pub show_suppressed: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Text,
            show_suppressed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}
