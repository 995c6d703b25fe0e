//! Node configuration.
//!
//! ```toml
//! name = "ember@127.0.0.1"
//! creation = 2
//! ```

use serde::Deserialize;

use crate::error::ConfigError;

fn default_creation() -> u32 {
    1
}

/// Identity settings for a [`Node`](crate::actor::Node).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// `name@host`; becomes the node part of every pid and reference.
    pub name: String,
    /// Distinguishes incarnations of a node with the same name.
    #[serde(default = "default_creation")]
    pub creation: u32,
}

impl NodeConfig {
    pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
        let config = NodeConfig {
            name: name.into(),
            creation: default_creation(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_creation(mut self, creation: u32) -> Self {
        self.creation = creation;
        self
    }

    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.name.split_once('@') {
            Some((name, host)) if !name.is_empty() && !host.is_empty() => Ok(()),
            _ => Err(ConfigError::InvalidName(self.name.clone())),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            name: "nonode@nohost".to_string(),
            creation: default_creation(),
        }
    }
}
