use serde::{Deserialize, Serialize};

/// Worker thread settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShimConfig {
    /// Name given to each worker thread.
    pub thread_name: String,
    /// Worker stack size in bytes. `None` keeps the platform default.
    pub stack_size: Option<usize>,
}

impl Default for ShimConfig {
    fn default() -> Self {
        ShimConfig {
            thread_name: "pinshim-worker".to_string(),
            stack_size: None,
        }
    }
}

impl ShimConfig {
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}
