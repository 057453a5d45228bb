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

//! Gesture link client for a local gesture-classification backend.
//!
//! The backend pushes one JSON record per recognised gesture over a
//! WebSocket. This library keeps a single connection to it and republishes
//! what arrives as two event streams:
//!
//! - **Transport layer**: [`Connector`], [`FrameSource`] and [`FrameSink`]
//!   traits with a tokio-tungstenite implementation ([`WsConnector`])
//! - **Link layer**: [`GestureLink`], the connection state machine, receive
//!   loop and frame reassembly
//! - **Protocol layer**: [`GestureEvent`] decoding
//!
//! # Quick Start
//!
//! ```no_run
//! use gesture_link::{GestureEvent, GestureLink, LinkConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let link = GestureLink::new(LinkConfig::default());
//!     let mut messages = link.subscribe_messages();
//!     let mut status = link.subscribe_status();
//!
//!     link.connect("ws://localhost:8765").await;
//!     println!("{}", status.recv().await.unwrap());
//!
//!     while let Ok(message) = messages.recv().await {
//!         if let Ok(event) = GestureEvent::decode(&message) {
//!             println!("{:?} ({:?})", event.gesture, event.confidence);
//!         }
//!     }
//! }
//! ```

pub mod link;
pub mod protocol;
pub mod transport;

pub use link::{GestureLink, LinkConfig, LinkStatus, CLOSE_REASON};
pub use protocol::{GestureEvent, ParseError};
pub use transport::{Connector, Frame, FrameKind, FrameSink, FrameSource, LinkError, WsConnector};
