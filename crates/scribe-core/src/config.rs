use serde::Deserialize;
use serde::Serialize;

use crate::conversation::RequestParams;
use crate::history::DEFAULT_HISTORY_CAPACITY;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub request: RequestParams,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub history_capacity: usize,
    pub append_separator: String,
    pub remember_choice: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            append_separator: "\n\n".to_string(),
            remember_choice: true,
        }
    }
}
