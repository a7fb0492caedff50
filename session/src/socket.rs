//! Socket-frame transport: WebSocket, one JSON document per text frame.
//!
//! No length-prefixing here — the transport already delimits messages, so
//! each inbound frame is parsed and classified directly. Frames that fail
//! to parse or fit no message shape are dropped with a log; the connection
//! continues.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use liaison_protocol::Message;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::channel::MessageChannel;
use crate::transport::TransportHandle;

/// Connect to an analysis service over WebSocket.
pub async fn connect_socket(url: &str) -> Result<TransportHandle> {
    let (stream, _response) = connect_async(url)
        .await
        .with_context(|| format!("connecting to {url}"))?;
    let (mut sink, mut frames) = stream.split();

    let channel = MessageChannel::new();

    let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Message>();
    channel.bind_writer(writer_tx);
    let writer_task = tokio::spawn(async move {
        while let Some(message) = writer_rx.recv().await {
            let text = message.to_value().to_string();
            if let Err(e) = sink.send(WsMessage::Text(text)).await {
                tracing::warn!("socket write error: {e}");
                break;
            }
        }
    });

    let reader_channel = channel.clone();
    let reader_task = tokio::spawn(async move {
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => {
                    if let Some(message) = parse_frame(&text) {
                        reader_channel.publish(message);
                    }
                }
                Ok(WsMessage::Close(_)) => {
                    tracing::info!("socket closed by peer");
                    break;
                }
                // Pings are answered by the protocol layer; binary frames
                // have no meaning in this protocol.
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("socket read error: {e}");
                    break;
                }
            }
        }
        reader_channel.close();
    });

    Ok(TransportHandle::from_parts(
        channel,
        vec![writer_task, reader_task],
    ))
}

/// Parse one socket frame into a message, or drop it.
fn parse_frame(text: &str) -> Option<Message> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("dropping unparseable socket frame: {e}");
            return None;
        }
    };
    let message = Message::from_value(&value);
    if message.is_none() {
        tracing::trace!("ignoring socket frame that fits no message shape");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_classifies_messages() {
        let message = parse_frame(r#"{"jsonrpc":"2.0","method":"m","params":{}}"#);
        assert_eq!(
            message,
            Some(Message::notification("m", Some(serde_json::json!({}))))
        );
    }

    #[test]
    fn test_parse_frame_drops_invalid_json() {
        assert_eq!(parse_frame("not json"), None);
    }

    #[test]
    fn test_parse_frame_drops_shapeless_documents() {
        assert_eq!(parse_frame(r#"{"hello":"world"}"#), None);
        assert_eq!(parse_frame("[1,2,3]"), None);
    }
}
