//! WebSocket transport for the realtime channel

use std::time::Duration;

use shared::message::ClientEmit;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{SyncError, SyncResult};
use crate::session::Credential;

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Open the channel with a bearer credential
///
/// 401/403 on the upgrade is reported as [`SyncError::Auth`] so the caller
/// stops retrying with the same credential.
pub async fn connect(url: &str, credential: &Credential) -> SyncResult<WsStream> {
    let mut request = url.into_client_request()?;
    let bearer = HeaderValue::from_str(&credential.bearer())
        .map_err(|e| SyncError::Auth(format!("Credential is not a valid header: {e}")))?;
    request
        .headers_mut()
        .insert(tungstenite::http::header::AUTHORIZATION, bearer);

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| {
            if let tungstenite::Error::Http(ref resp) = e {
                let status = resp.status().as_u16();
                if status == 401 || status == 403 {
                    return SyncError::Auth(format!(
                        "Channel rejected connection (HTTP {status})"
                    ));
                }
            }
            SyncError::Transport(format!("WebSocket connection failed: {e}"))
        })?;

    tracing::info!(url = %url, "Realtime channel connected");
    Ok(ws_stream)
}

pub fn encode(emit: &ClientEmit) -> SyncResult<Message> {
    Ok(Message::Text(emit.to_json()?.into()))
}

/// `min(floor * 2^(attempt-1), ceiling)`; attempt 0 is treated as 1
pub fn backoff_delay(attempt: u32, floor: Duration, ceiling: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    floor
        .checked_mul(1u32 << exponent)
        .unwrap_or(ceiling)
        .min(ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Room;

    #[test]
    fn test_backoff_is_bounded() {
        let floor = Duration::from_secs(1);
        let ceiling = Duration::from_secs(5);
        let delays: Vec<u64> = (1..=6)
            .map(|n| backoff_delay(n, floor, ceiling).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5, 5]);
        assert_eq!(backoff_delay(0, floor, ceiling), floor);
        assert_eq!(backoff_delay(u32::MAX, floor, ceiling), ceiling);
    }

    #[test]
    fn test_encode_join() {
        let msg = encode(&ClientEmit::Join(Room::outlet("o-1"))).unwrap();
        assert_eq!(
            msg,
            Message::Text(r#"{"event":"join-outlet","payload":{"id":"o-1"}}"#.to_string().into())
        );
    }
}
