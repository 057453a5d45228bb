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

//! WebSocket transport built on tokio-tungstenite.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{Connector, Frame, FrameSink, FrameSource, LinkError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens plain `ws://` connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    type Sink = WsSink;
    type Source = WsSource;

    async fn connect(&self, endpoint: &str) -> Result<(WsSink, WsSource), LinkError> {
        let (stream, response) = tokio_tungstenite::connect_async(endpoint).await?;
        info!("WebSocket handshake with {} complete ({})", endpoint, response.status());

        let (sink, source) = stream.split();
        Ok((WsSink { inner: sink }, WsSource { inner: source }))
    }
}

/// Write half of a WebSocket connection.
pub struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

impl std::fmt::Debug for WsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSink").finish_non_exhaustive()
    }
}

impl FrameSink for WsSink {
    async fn send_text(&mut self, payload: String) -> Result<(), LinkError> {
        self.inner.send(Message::Text(payload)).await?;
        Ok(())
    }

    async fn close(&mut self, reason: &'static str) -> Result<(), LinkError> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.into(),
        };
        self.inner.send(Message::Close(Some(frame))).await?;
        Ok(())
    }
}

/// Read half of a WebSocket connection.
///
/// tungstenite reassembles fragmented messages itself, so every data frame
/// handed out here is already complete. Ping and pong are answered by
/// tungstenite and never surface.
pub struct WsSource {
    inner: SplitStream<WsStream>,
}

impl std::fmt::Debug for WsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSource").finish_non_exhaustive()
    }
}

impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, LinkError> {
        while let Some(message) = self.inner.next().await {
            match message {
                Ok(Message::Text(text)) => return Ok(Some(Frame::text(text))),
                Ok(Message::Binary(data)) => return Ok(Some(Frame::binary(data))),
                Ok(Message::Close(close)) => {
                    let reason = close.map(|c| c.reason.into_owned()).unwrap_or_default();
                    return Ok(Some(Frame::close(reason)));
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(tungstenite::Error::ConnectionClosed) => {
                    debug!("WebSocket stream already closed");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }
}
