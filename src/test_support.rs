//! Shared fixtures for unit tests.

use crate::error::Result;
use crate::generation::{GenerationRequest, ImageProvider, ProviderReply};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

/// Encodes a solid red image of the given size.
fn red_image(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([255, 0, 0]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format)
        .unwrap();
    buf.into_inner()
}

pub(crate) fn red_png(width: u32, height: u32) -> Vec<u8> {
    red_image(width, height, image::ImageFormat::Png)
}

pub(crate) fn red_jpeg(width: u32, height: u32) -> Vec<u8> {
    red_image(width, height, image::ImageFormat::Jpeg)
}

/// Scripted provider. Replies are served in push order; an exhausted
/// script answers with an empty reply.
///
/// A gated provider parks every call until [`FakeProvider::release`] hands
/// out a permit, which holds a request in flight for as long as a test needs.
pub(crate) struct FakeProvider {
    replies: Mutex<VecDeque<Result<ProviderReply>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    gate: Option<Semaphore>,
}

impl FakeProvider {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    pub(crate) fn gated() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: Some(Semaphore::new(0)),
        })
    }

    pub(crate) fn push_ok(&self, reply: ProviderReply) {
        self.replies.lock().unwrap().push_back(Ok(reply));
    }

    pub(crate) fn push_err(&self, err: crate::SculptorError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    /// Lets one parked (or future) call through.
    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for FakeProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<ProviderReply> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ProviderReply::default()))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Serves a single canned HTTP response on a local port and returns its base URL.
pub(crate) async fn serve_once(status: u16, content_type: &str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let content_type = content_type.to_string();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        // Drain the request so the client never sees a reset mid-upload
        let mut request = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                let content_length = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + content_length {
                    break;
                }
            }
        }

        let reason = if status < 400 { "OK" } else { "Error" };
        let head = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        let _ = socket.shutdown().await;
    });

    format!("http://{addr}")
}
