//! Datagram probe helper shared by broadcast and multicast discovery

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::Result;

/// A reply collected during a probe window
#[derive(Debug, Clone)]
pub struct ProbeReply {
    pub from: SocketAddr,
    pub payload: Vec<u8>,
}

/// Send one probe datagram and collect every reply until the window closes
///
/// Socket errors while sending are returned; errors while receiving end
/// the window early with whatever was collected.
///
/// # Errors
///
/// Returns error if the socket cannot be bound or the probe cannot be sent
pub async fn probe(destination: SocketAddr, payload: &[u8], window: Duration) -> Result<Vec<ProbeReply>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    if destination.ip().is_ipv4() && !destination.ip().is_multicast() {
        socket.set_broadcast(true)?;
    }
    socket.send_to(payload, destination).await?;

    let mut replies = Vec::new();
    let mut buf = vec![0u8; 65_535];
    let deadline = tokio::time::Instant::now() + window;

    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }

        match tokio::time::timeout(deadline - now, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) => {
                // Our own broadcast can loop back
                if &buf[..n] == payload {
                    continue;
                }
                replies.push(ProbeReply {
                    from,
                    payload: buf[..n].to_vec(),
                });
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, %destination, "probe receive failed, closing window");
                break;
            }
            Err(_) => break,
        }
    }

    Ok(replies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collects_replies_until_window_closes() {
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let destination = responder.local_addr().unwrap();

        let echo = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (n, from) = responder.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"hello?");
            responder.send_to(b"camera-a", from).await.unwrap();
            responder.send_to(b"camera-b", from).await.unwrap();
        });

        let replies = probe(destination, b"hello?", Duration::from_millis(300)).await.unwrap();
        echo.await.unwrap();

        let payloads: Vec<&[u8]> = replies.iter().map(|r| r.payload.as_slice()).collect();
        assert_eq!(payloads, vec![b"camera-a".as_slice(), b"camera-b".as_slice()]);
    }

    #[tokio::test]
    async fn silent_network_yields_empty() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let destination = silent.local_addr().unwrap();

        let replies = probe(destination, b"anyone?", Duration::from_millis(100)).await.unwrap();
        assert!(replies.is_empty());
    }
}
