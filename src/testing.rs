//! Test doubles shared by unit tests: fake providers and a scripted HTTP server

use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, GenerationError};
use crate::generation::{GenerationProvider, GenerationResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Deterministic bag-of-words embedder: each lower-cased word bumps one bucket
pub(crate) struct HashEmbedder {
    dimension: usize,
    calls: AtomicUsize,
    fail: bool,
}

impl HashEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// An embedder whose every call fails with a 503
    pub(crate) fn failing(dimension: usize) -> Self {
        Self {
            fail: true,
            ..Self::new(dimension)
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
            v[hash as usize % self.dimension] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }
}

/// Generator that records its inputs and answers with a fixed string
pub(crate) struct RecordingGenerator {
    answer: String,
    latency_ms: u64,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingGenerator {
    pub(crate) fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            latency_ms: 0,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// `(question, context)` pairs seen so far
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    async fn generate(
        &self,
        question: &str,
        context: &str,
    ) -> Result<GenerationResult, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push((question.to_string(), context.to_string()));
        Ok(GenerationResult {
            answer: self.answer.clone(),
            latency_ms: self.latency_ms,
        })
    }

    fn model_name(&self) -> &str {
        "recording-generator"
    }
}

/// Scripted reply for one connection to [`OneShotServer`]
pub(crate) enum ServerReply {
    Respond { status: u16, body: String },
    /// Read the request and never answer
    Hang,
}

impl ServerReply {
    pub(crate) fn ok(body: String) -> Self {
        Self::status(200, body)
    }

    pub(crate) fn status(status: u16, body: String) -> Self {
        ServerReply::Respond { status, body }
    }
}

/// Local HTTP server answering each connection with the next scripted reply
pub(crate) struct OneShotServer {
    addr: std::net::SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl OneShotServer {
    pub(crate) async fn start(replies: Vec<ServerReply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            for reply in replies {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let request = read_request(&mut stream).await;
                recorded.lock().unwrap().push(request);

                match reply {
                    ServerReply::Respond { status, body } => {
                        let response = format!(
                            "HTTP/1.1 {} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = stream.write_all(response.as_bytes()).await;
                        let _ = stream.shutdown().await;
                    }
                    ServerReply::Hang => {
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                            drop(stream);
                        });
                    }
                }
            }
        });

        Self { addr, requests }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Raw requests received so far (head and body)
    pub(crate) async fn requests(&self) -> Vec<String> {
        tokio::task::yield_now().await;
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.trim()
                        .eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
