//! TCP line links standing in for the serial transports.
//!
//! Each link accepts any number of clients. Lines a client sends are queued
//! for the control loop (when the link takes input); lines the loop writes
//! are broadcast to every connected client and dropped when nobody is
//! connected, the same as printing to an unpaired serial port.

use std::net::SocketAddr;

use tagbuddy_core::{LineSink, LineSource};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};

/// Outbound lines buffered per client before it starts lagging.
const OUTBOUND_CAPACITY: usize = 100;

/// Loop-side end of a link.
pub struct LinePort {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: broadcast::Sender<String>,
}

impl LineSource for LinePort {
    fn read_line(&mut self) -> Option<String> {
        self.inbound.try_recv().ok()
    }
}

impl LineSink for LinePort {
    fn write_line(&mut self, line: &str) {
        // No receivers just means no client is connected.
        let _ = self.outbound.send(line.to_owned());
    }
}

/// Bind `addr` and serve clients in the background.
///
/// With `accepts_input` unset, whatever clients send is discarded.
pub async fn serve(
    name: &'static str,
    addr: &str,
    accepts_input: bool,
) -> anyhow::Result<LinePort> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("{name} link listening on {}", listener.local_addr()?);

    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let (outbound, _) = broadcast::channel(OUTBOUND_CAPACITY);

    let clients = outbound.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    let inbound = accepts_input.then(|| inbound_tx.clone());
                    tokio::spawn(handle_client(name, socket, peer, inbound, clients.subscribe()));
                }
                Err(e) => tracing::warn!("{name} link accept failed: {e}"),
            }
        }
    });

    Ok(LinePort { inbound, outbound })
}

async fn handle_client(
    name: &'static str,
    socket: TcpStream,
    peer: SocketAddr,
    inbound: Option<mpsc::UnboundedSender<String>>,
    mut outbound: broadcast::Receiver<String>,
) {
    let (reader, mut writer) = socket.into_split();
    tracing::info!("{name} client {peer} connected");

    let send_task = tokio::spawn(async move {
        loop {
            match outbound.recv().await {
                Ok(line) => {
                    let framed = format!("{line}\n");
                    if writer.write_all(framed.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("{name} client {peer} too slow, dropped {skipped} lines");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match &inbound {
                Some(tx) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                None => tracing::debug!("{name} link is output only, dropped {line:?}"),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("{name} client {peer} read failed: {e}");
                break;
            }
        }
    }

    send_task.abort();
    tracing::info!("{name} client {peer} disconnected");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn connect(addr: &str) -> TcpStream {
        TcpStream::connect(addr).await.unwrap()
    }

    async fn next_line(port: &mut LinePort) -> String {
        for _ in 0..200 {
            if let Some(line) = port.read_line() {
                return line;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no line arrived");
    }

    #[tokio::test]
    async fn client_lines_reach_the_loop_and_replies_reach_the_client() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut port = serve("wireless", &addr, true).await.unwrap();
        let client = connect(&addr).await;
        let (read_half, mut write_half) = client.into_split();

        write_half.write_all(b"N2\r\nRBYE\n").await.unwrap();
        assert_eq!(next_line(&mut port).await, "N2");
        assert_eq!(next_line(&mut port).await, "RBYE");

        // Give the server a moment to subscribe the client before replying.
        tokio::time::sleep(Duration::from_millis(20)).await;
        port.write_line("NUM TAGS SET TO: 2");
        let mut replies = BufReader::new(read_half).lines();
        let reply = tokio::time::timeout(Duration::from_secs(2), replies.next_line())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.as_deref(), Some("NUM TAGS SET TO: 2"));
    }

    #[tokio::test]
    async fn output_only_link_discards_input() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut port = serve("forward", &addr, false).await.unwrap();
        let mut client = connect(&addr).await;
        client.write_all(b"N5\n").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(port.read_line(), None);
    }

    #[tokio::test]
    async fn clients_are_dropped_once_the_loop_side_is_gone() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let port = serve("wireless", &addr, true).await.unwrap();
        let client = connect(&addr).await;
        let (read_half, mut write_half) = client.into_split();
        drop(port);

        write_half.write_all(b"N1\n").await.unwrap();
        let mut replies = BufReader::new(read_half).lines();
        let closed = tokio::time::timeout(Duration::from_secs(2), replies.next_line())
            .await
            .unwrap();
        assert!(matches!(closed, Ok(None) | Err(_)));
    }

    #[test]
    fn writing_without_clients_is_harmless() {
        let (outbound, _) = broadcast::channel(4);
        let (_tx, inbound) = mpsc::unbounded_channel();
        let mut port = LinePort { inbound, outbound };
        port.write_line("OPEN");
        assert_eq!(port.read_line(), None);
    }
}
