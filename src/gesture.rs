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

//! Gesture read-out shown by the dashboard.
//!
//! Folds the gesture link's message and status streams into the handful of
//! values the UI displays. Decode failures never propagate; they replace the
//! label with a sentinel.

use chrono::{DateTime, Utc};
use gesture_link::{GestureEvent, LinkStatus};
use log::{debug, warn};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Label before any gesture has been received
pub const NO_GESTURE: &str = "None";

/// Label for a gesture field that is present but empty
pub const UNKNOWN_GESTURE: &str = "unknown";

/// Label when a message could not be decoded
pub const INVALID_DATA: &str = "(invalid data)";

/// Latest gesture and connection state
#[derive(Debug, Clone)]
pub struct GestureReadout {
    pub connection_status: String,
    pub last_gesture: String,
    pub confidence: f64,

    /// Messages received, including ones that failed to decode
    pub message_count: u64,
    pub invalid_count: u64,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Default for GestureReadout {
    fn default() -> Self {
        Self {
            connection_status: LinkStatus::Disconnected.to_string(),
            last_gesture: NO_GESTURE.to_string(),
            confidence: 0.0,
            message_count: 0,
            invalid_count: 0,
            last_message_at: None,
        }
    }
}

impl GestureReadout {
    /// Apply one complete message from the backend.
    ///
    /// Absent fields leave the current values untouched.
    pub fn handle_message(&mut self, message: &str) {
        self.message_count += 1;
        self.last_message_at = Some(Utc::now());

        match GestureEvent::decode(message) {
            Ok(event) => {
                if let Some(label) = event.gesture {
                    self.last_gesture = if label.is_empty() {
                        UNKNOWN_GESTURE.to_string()
                    } else {
                        label
                    };
                }
                if let Some(confidence) = event.confidence {
                    self.confidence = confidence;
                }
            }
            Err(e) => {
                debug!("Undecodable gesture message {:?}: {}", message, e);
                self.invalid_count += 1;
                self.last_gesture = INVALID_DATA.to_string();
            }
        }
    }

    pub fn handle_status(&mut self, status: &LinkStatus) {
        self.connection_status = status.to_string();
    }

    /// Seconds since the last message, if any
    #[must_use]
    pub fn seconds_since_last_message(&self) -> Option<i64> {
        self.last_message_at
            .map(|at| (Utc::now() - at).num_seconds().max(0))
    }
}

/// Subscriber ends of the gesture link, drained without blocking.
///
/// Used by the UI thread, which polls once per frame.
#[derive(Debug)]
pub struct GestureFeed {
    statuses: broadcast::Receiver<LinkStatus>,
    messages: broadcast::Receiver<String>,
}

impl GestureFeed {
    pub fn new(
        statuses: broadcast::Receiver<LinkStatus>,
        messages: broadcast::Receiver<String>,
    ) -> Self {
        Self { statuses, messages }
    }

    /// Apply everything queued since the last call. Returns whether anything
    /// changed.
    pub fn drain_into(&mut self, readout: &mut GestureReadout) -> bool {
        let mut changed = false;

        loop {
            match self.statuses.try_recv() {
                Ok(status) => {
                    readout.handle_status(&status);
                    changed = true;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Status feed lagged, skipped {} updates", skipped);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        loop {
            match self.messages.try_recv() {
                Ok(message) => {
                    readout.handle_message(&message);
                    changed = true;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Gesture feed lagged, skipped {} messages", skipped);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        changed
    }
}
