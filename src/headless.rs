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

//! Console mode: connect once, log every gesture, exit when the link closes
//! or on Ctrl-C.

use gesture_link::{GestureLink, LinkStatus};
use log::{info, warn};
use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;

use crate::config::AppConfig;
use crate::gesture::GestureReadout;

pub fn run(config: &AppConfig, runtime: &Runtime) {
    runtime.block_on(async {
        let link = GestureLink::new(config.link_config());
        let mut statuses = link.subscribe_status();
        let mut messages = link.subscribe_messages();
        let mut readout = GestureReadout::default();

        link.connect(&config.backend_endpoint).await;

        loop {
            tokio::select! {
                status = statuses.recv() => match status {
                    Ok(status) => {
                        readout.handle_status(&status);
                        info!("Status: {}", readout.connection_status);
                        if matches!(status, LinkStatus::Disconnected | LinkStatus::Error(_)) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!("Status feed lagged, skipped {}", skipped),
                    Err(RecvError::Closed) => break,
                },
                message = messages.recv() => match message {
                    Ok(message) => {
                        readout.handle_message(&message);
                        info!("Gesture: {} (confidence {:.2})", readout.last_gesture, readout.confidence);
                    }
                    Err(RecvError::Lagged(skipped)) => warn!("Gesture feed lagged, skipped {}", skipped),
                    Err(RecvError::Closed) => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, disconnecting");
                    break;
                }
            }
        }

        link.disconnect().await;
        info!(
            "Received {} messages ({} invalid)",
            readout.message_count, readout.invalid_count
        );
    });
}
