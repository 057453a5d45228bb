// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application configuration management.
//!
//! Persistent settings are stored in TOML via confy. Every field carries a
//! serde default so config files written by older builds keep loading.

use std::time::Duration;

use gesture_link::LinkConfig;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "zerotouch-dashboard";
const CONFIG_NAME: &str = "config";

/// Default gesture backend endpoint
pub const DEFAULT_BACKEND_ENDPOINT: &str = "ws://localhost:8765";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// WebSocket endpoint of the gesture-classification backend
    #[serde(default = "default_backend_endpoint")]
    pub backend_endpoint: String,

    /// Connect to the backend as soon as the dashboard starts
    #[serde(default)]
    pub auto_connect: bool,

    /// Seconds to wait for the close handshake; 0 waits indefinitely
    #[serde(default = "default_close_timeout_secs")]
    pub close_timeout_secs: u64,

    /// Buffered gesture/status events per subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_backend_endpoint() -> String {
    DEFAULT_BACKEND_ENDPOINT.to_string()
}

fn default_close_timeout_secs() -> u64 {
    5
}

fn default_event_capacity() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            backend_endpoint: default_backend_endpoint(),
            auto_connect: false,
            close_timeout_secs: default_close_timeout_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults if missing
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Gesture link settings derived from this configuration
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            // broadcast::channel panics on zero capacity
            event_capacity: self.event_capacity.max(1),
            close_timeout: match self.close_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}
