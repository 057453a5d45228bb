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

//! Transport layer for the gesture link.
//!
//! The client never talks to a socket directly. It asks a [`Connector`] for a
//! pair of halves: a [`FrameSink`] for outgoing text and the close handshake,
//! and a [`FrameSource`] that yields transport frames one at a time. The
//! WebSocket implementation lives in [`websocket`]; other implementations
//! (for example an in-memory transport in tests) plug in the same way.

mod websocket;

pub use websocket::{WsConnector, WsSink, WsSource};

use std::future::Future;

use thiserror::Error;

/// Errors raised by a transport.
///
/// The `Display` output is what subscribers see after `"Error: "` or
/// `"Receive error: "` in a status update.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("{0}")]
    Transport(String),
}

/// Kind of a transport frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// UTF-8 text payload.
    Text,
    /// Binary payload. Accumulated the same way as text.
    Binary,
    /// Peer-initiated close.
    Close,
}

/// One unit of transport-level data.
///
/// A logical message may span several frames; only the last one has
/// `end_of_message` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Vec<u8>,
    pub end_of_message: bool,
}

impl Frame {
    /// A complete single-frame text message.
    #[must_use]
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Text,
            payload: payload.into().into_bytes(),
            end_of_message: true,
        }
    }

    /// A text fragment. `end_of_message` marks the final fragment.
    #[must_use]
    pub fn text_fragment(payload: impl Into<String>, end_of_message: bool) -> Self {
        Self {
            kind: FrameKind::Text,
            payload: payload.into().into_bytes(),
            end_of_message,
        }
    }

    /// A complete single-frame binary message.
    #[must_use]
    pub fn binary(payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Binary,
            payload,
            end_of_message: true,
        }
    }

    /// A close frame carrying the peer's reason text (possibly empty).
    #[must_use]
    pub fn close(reason: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Close,
            payload: reason.into().into_bytes(),
            end_of_message: true,
        }
    }
}

/// Opens a connection and hands back its two halves.
pub trait Connector: Send + Sync + 'static {
    type Sink: FrameSink;
    type Source: FrameSource;

    fn connect(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<(Self::Sink, Self::Source), LinkError>> + Send;
}

/// Read half of a connection.
pub trait FrameSource: Send + 'static {
    /// Wait for the next frame.
    ///
    /// Returns `Ok(None)` once the underlying stream has ended.
    fn next_frame(&mut self) -> impl Future<Output = Result<Option<Frame>, LinkError>> + Send;
}

/// Write half of a connection.
pub trait FrameSink: Send + 'static {
    /// Write `payload` as one complete text message.
    fn send_text(&mut self, payload: String) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Send a close frame with a normal-closure code and `reason`. The
    /// peer's reply arrives on the paired [`FrameSource`].
    fn close(&mut self, reason: &'static str) -> impl Future<Output = Result<(), LinkError>> + Send;
}
