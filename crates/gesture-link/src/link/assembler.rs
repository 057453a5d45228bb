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

//! Frame-to-message reassembly.

use crate::transport::{Frame, FrameKind};

/// Result of feeding one frame to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    /// Frame buffered; the message is not complete yet.
    Pending,
    /// A complete message.
    Message(String),
    /// Peer sent a close frame.
    Closed,
}

/// Accumulates frame payloads until an end-of-message frame arrives.
///
/// Bytes are decoded once at the message boundary so a multi-byte UTF-8
/// character split across two frames comes out intact.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buffer: Vec<u8>,
}

impl MessageAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) -> Assembled {
        if frame.kind == FrameKind::Close {
            self.buffer.clear();
            return Assembled::Closed;
        }

        self.buffer.extend_from_slice(&frame.payload);

        if !frame.end_of_message {
            return Assembled::Pending;
        }

        let bytes = std::mem::take(&mut self.buffer);
        let message = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Assembled::Message(message)
    }

    /// Bytes buffered for the message in progress.
    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}
