//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ptz_gateway::{Action, Device, Error, Outcome, Protocol, ProtocolAdapter, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// One adapter call seen by [`MockAdapter`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send(String, Action),
    Stop(String),
}

/// How [`MockAdapter::discover`] behaves
#[derive(Debug, Clone)]
pub enum DiscoverBehavior {
    Found(Vec<Device>),
    Fail,
    Panic,
    Hang,
}

/// Adapter that records calls and optionally takes time to "transmit"
pub struct MockAdapter {
    protocol: Protocol,
    delay: Duration,
    fail_sends: bool,
    discover: DiscoverBehavior,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockAdapter {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            delay: Duration::ZERO,
            fail_sends: false,
            discover: DiscoverBehavior::Found(Vec::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every send and stop takes `delay` before completing
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every send reports failure (stops still succeed)
    pub fn failing(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn with_discovery(mut self, behavior: DiscoverBehavior) -> Self {
        self.discover = behavior;
        self
    }

    /// Handle onto the call log that survives moving the adapter
    pub fn log(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ProtocolAdapter for MockAdapter {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn send(&self, device: &Device, action: &Action, _speed: u8) -> Outcome {
        self.calls.lock().await.push(Call::Send(device.id.clone(), *action));
        tokio::time::sleep(self.delay).await;
        if self.fail_sends {
            Outcome::failed("camera unreachable")
        } else {
            Outcome::ok()
        }
    }

    async fn stop(&self, device: &Device) -> Outcome {
        self.calls.lock().await.push(Call::Stop(device.id.clone()));
        tokio::time::sleep(self.delay).await;
        Outcome::ok()
    }

    async fn discover(&self) -> Result<Vec<Device>> {
        match &self.discover {
            DiscoverBehavior::Found(devices) => Ok(devices.clone()),
            DiscoverBehavior::Fail => Err(Error::Discovery("socket exploded".to_string())),
            DiscoverBehavior::Panic => panic!("discovery bug"),
            DiscoverBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }
}

/// A localhost device with a fixed identifier
pub fn device(id: &str, protocol: Protocol) -> Device {
    let mut device = Device::new("127.0.0.1", protocol.default_port(), protocol);
    device.id = id.to_string();
    device
}

pub async fn calls(log: &Arc<Mutex<Vec<Call>>>) -> Vec<Call> {
    log.lock().await.clone()
}

pub async fn stops(log: &Arc<Mutex<Vec<Call>>>) -> usize {
    log.lock()
        .await
        .iter()
        .filter(|c| matches!(c, Call::Stop(_)))
        .count()
}

/// How [`HttpRecorder`] answers one request
#[derive(Debug, Clone, Copy)]
pub struct Reply {
    pub status: u16,
    pub delay: Duration,
}

impl Reply {
    pub const fn ok() -> Self {
        Self {
            status: 200,
            delay: Duration::ZERO,
        }
    }

    pub const fn status(status: u16) -> Self {
        Self {
            status,
            delay: Duration::ZERO,
        }
    }

    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Responder = Arc<dyn Fn(&str, &str) -> Reply + Send + Sync>;

/// Minimal HTTP server recording requests and answering `body`
pub struct HttpRecorder {
    pub port: u16,
    /// `(method, target)` in arrival order
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl HttpRecorder {
    /// Answer every request with `200` and `body`
    pub async fn start(body: &'static str) -> Self {
        Self::start_with(body, |_, _| Reply::ok()).await
    }

    /// Answer each request as `responder(method, target)` decides
    pub async fn start_with(
        body: &'static str,
        responder: impl Fn(&str, &str) -> Reply + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind recorder");
        let port = listener.local_addr().expect("local addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let responder: Responder = Arc::new(responder);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let responder = Arc::clone(&responder);
                tokio::spawn(async move {
                    let mut reader = BufReader::new(stream);
                    let mut request_line = String::new();
                    if reader.read_line(&mut request_line).await.is_err() {
                        return;
                    }

                    let mut content_length = 0usize;
                    loop {
                        let mut header = String::new();
                        match reader.read_line(&mut header).await {
                            Ok(0) | Err(_) => break,
                            Ok(_) if header == "\r\n" => break,
                            Ok(_) => {
                                let lower = header.to_ascii_lowercase();
                                if let Some(value) = lower.strip_prefix("content-length:") {
                                    content_length = value.trim().parse().unwrap_or(0);
                                }
                            }
                        }
                    }
                    let mut request_body = vec![0u8; content_length];
                    if reader.read_exact(&mut request_body).await.is_err() {
                        return;
                    }

                    let mut parts = request_line.split_whitespace();
                    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
                        return;
                    };
                    log.lock().await.push((method.to_string(), target.to_string()));

                    let reply = responder(method, target);
                    tokio::time::sleep(reply.delay).await;
                    let response = format!(
                        "HTTP/1.1 {} Status\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        reply.status,
                        body.len()
                    );
                    let _ = reader.get_mut().write_all(response.as_bytes()).await;
                });
            }
        });

        Self { port, requests }
    }

    /// Request targets in arrival order
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.iter().map(|(_, target)| target.clone()).collect()
    }

    /// `"METHOD target"` lines in arrival order
    pub async fn exchanges(&self) -> Vec<String> {
        self.requests
            .lock()
            .await
            .iter()
            .map(|(method, target)| format!("{method} {target}"))
            .collect()
    }
}
