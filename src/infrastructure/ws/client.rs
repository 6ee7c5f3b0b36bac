use crate::core::communication::{ChannelPeer, LinkChannel, LinkConnector, Outbound, NORMAL_CLOSURE};
use crate::domain::{
    config::LinkConfig,
    error::{LinkTermError, LinkTermResult},
};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens the persistent channel as a WebSocket to the host process
pub struct WsConnector {
    base_url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self::new(config.ws_url.clone(), config.connect_timeout())
    }

    /// Socket URL for one endpoint; the host picks the port from the query
    pub fn endpoint_url(&self, endpoint_id: &str) -> LinkTermResult<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.query_pairs_mut().append_pair("port", endpoint_id);
        Ok(url)
    }
}

#[async_trait]
impl LinkConnector for WsConnector {
    async fn connect(&self, endpoint_id: &str) -> LinkTermResult<LinkChannel> {
        let url = self.endpoint_url(endpoint_id)?;
        debug!("Opening WebSocket {}", url);

        let (stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| LinkTermError::Timeout {
                endpoint: endpoint_id.to_string(),
                after_ms: self.connect_timeout.as_millis(),
            })?
            .map_err(|e| LinkTermError::TransportOpen {
                endpoint: endpoint_id.to_string(),
                message: e.to_string(),
            })?;

        info!("WebSocket open for '{}'", endpoint_id);
        let (channel, peer) = LinkChannel::pair();
        tokio::spawn(pump(stream, peer));
        Ok(channel)
    }
}

/// Shuttle frames between the socket and the session until either side ends
async fn pump(stream: WsStream, mut peer: ChannelPeer) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outbound = peer.outbound.recv() => match outbound {
                Some(Outbound::Frame(envelope)) => {
                    let json = match envelope.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Dropping unserializable frame: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::text(json)).await {
                        warn!("WebSocket write failed: {}", e);
                        peer.closed(None, &e.to_string());
                        return;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    send_close(&mut sink, code, reason).await;
                    return;
                }
                None => {
                    // session dropped its side without asking
                    send_close(&mut sink, NORMAL_CLOSURE, String::new()).await;
                    return;
                }
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    peer.frame(text.to_string());
                }
                Some(Ok(Message::Binary(data))) => {
                    peer.frame(String::from_utf8_lossy(&data).into_owned());
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                        .unwrap_or((None, String::new()));
                    debug!("WebSocket close frame received (code {:?})", code);
                    let _ = sink.close().await;
                    peer.closed(code, &reason);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket read failed: {}", e);
                    peer.closed(None, &e.to_string());
                    return;
                }
                None => {
                    peer.closed(None, "connection dropped");
                    return;
                }
            },
        }
    }
}

async fn send_close<S>(sink: &mut S, code: u16, reason: String)
where
    S: Sink<Message> + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into(),
    };
    let _ = sink.send(Message::Close(Some(frame))).await;
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::communication::{Envelope, TransportEvent};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws/lora", listener.local_addr().unwrap());
        (listener, url)
    }

    #[test]
    fn test_endpoint_url_carries_port() {
        let connector = WsConnector::new("ws://127.0.0.1:8000/ws/lora", Duration::from_secs(1));
        let url = connector.endpoint_url("/dev/ttyUSB0").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:8000/ws/lora?port=%2Fdev%2FttyUSB0");
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();

            ws.send(Message::text(r#"{"type":"terminal_output","content":"boot ok"}"#))
                .await
                .unwrap();
            let inbound = ws.next().await.unwrap().unwrap();

            ws.close(Some(CloseFrame {
                code: CloseCode::from(1011),
                reason: "radio fault".into(),
            }))
            .await
            .unwrap();
            // drain until the client acknowledges
            while let Some(Ok(_)) = ws.next().await {}
            inbound
        });

        let connector = WsConnector::new(url, Duration::from_secs(5));
        let mut channel = connector.connect("COM3").await.unwrap();

        match channel.next_event().await {
            TransportEvent::Frame(text) => assert!(text.contains("boot ok")),
            other => panic!("unexpected event: {:?}", other),
        }

        channel.send(Envelope::command("AT+STATUS")).unwrap();

        match channel.next_event().await {
            TransportEvent::Closed(info) => {
                assert_eq!(info.code, Some(1011));
                assert_eq!(info.reason, "radio fault");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let inbound = server.await.unwrap();
        let text = inbound.into_text().unwrap();
        let frame = Envelope::parse(text.as_str()).unwrap();
        assert_eq!(frame.command.as_deref(), Some("AT+STATUS"));
    }

    #[tokio::test]
    async fn test_client_close_sends_code() {
        let (listener, url) = listen().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            loop {
                match ws.next().await {
                    Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
                    Some(Ok(_)) => continue,
                    _ => return None,
                }
            }
        });

        let connector = WsConnector::new(url, Duration::from_secs(5));
        let channel = connector.connect("COM3").await.unwrap();
        channel.close(NORMAL_CLOSURE, "Client disconnect");

        assert_eq!(server.await.unwrap(), Some(1000));
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_open_error() {
        let (listener, url) = listen().await;
        drop(listener);

        let connector = WsConnector::new(url, Duration::from_secs(5));
        let result = connector.connect("COM9").await;
        assert!(matches!(
            result,
            Err(LinkTermError::TransportOpen { ref endpoint, .. }) if endpoint == "COM9"
        ));
    }

    #[tokio::test]
    async fn test_silent_host_times_out() {
        // bound but never accepted, so the handshake hangs
        let (_listener, url) = listen().await;

        let connector = WsConnector::new(url, Duration::from_millis(100));
        let result = connector.connect("COM5").await;
        assert!(matches!(
            result,
            Err(LinkTermError::Timeout { ref endpoint, after_ms: 100 }) if endpoint == "COM5"
        ));
    }
}
