//! Client side of the remote generation service
//!
//! Contract: `POST {base}/generate` with `{"image", "mask", "prompt"}`
//! (base64 PNGs) answers `{"status": "success", "image": <data URL>}`.
//! Failures come back as a non-2xx status with a `detail` message.
//! `GET {base}/health` reports `{"status", "provider"}`.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::error::GenerationError;
use crate::session::Liveness;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub image: String,
    pub mask: String,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub status: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub provider: Option<String>,
}

/// Trimmed prompt, or [`GenerationError::EmptyPrompt`] when only whitespace
pub fn validate_prompt(prompt: &str) -> Result<&str, GenerationError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyPrompt);
    }
    Ok(trimmed)
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    message: Option<String>,
}

/// Turn an HTTP status and body from `/generate` into the result image
/// (data URL or base64) or a typed failure.
pub fn interpret_response(status: u16, body: &[u8]) -> Result<String, GenerationError> {
    if !(200..300).contains(&status) {
        let message = match serde_json::from_slice::<ErrorBody>(body) {
            Ok(ErrorBody {
                detail: Some(serde_json::Value::String(detail)),
                ..
            }) => detail,
            Ok(ErrorBody {
                detail: Some(other),
                ..
            }) => other.to_string(),
            Ok(ErrorBody {
                message: Some(message),
                ..
            }) => message,
            _ => String::from_utf8_lossy(body).trim().to_string(),
        };
        return Err(GenerationError::Http { status, message });
    }

    let response: GenerateResponse = serde_json::from_slice(body)
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;
    match response {
        GenerateResponse {
            ref status,
            image: Some(image),
            ..
        } if status == "success" && !image.trim().is_empty() => Ok(image),
        GenerateResponse {
            status,
            detail: Some(reason),
            ..
        }
        | GenerateResponse {
            status,
            message: Some(reason),
            ..
        } => Err(GenerationError::Failed(format!("{}: {}", status, reason))),
        GenerateResponse { status, .. } => Err(GenerationError::Failed(format!(
            "service answered status {:?} without an image",
            status
        ))),
    }
}

/// Capability to run one inpainting call against some backend
pub trait GenerationService: Send + Sync {
    fn generate(&self, request: &GenerateRequest) -> Result<String, GenerationError>;

    fn health(&self) -> Result<HealthStatus, GenerationError>;
}

/// `http://host[:port][/prefix]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrl {
    pub host: String,
    pub port: u16,
    pub prefix: String,
}

impl ServiceUrl {
    pub fn parse(url: &str) -> Result<Self, GenerationError> {
        let url = url.trim();
        let rest = match url.split_once("://") {
            Some(("http", rest)) => rest,
            Some((scheme, _)) => {
                return Err(GenerationError::InvalidUrl(format!(
                    "unsupported scheme {:?} in {}",
                    scheme, url
                )));
            }
            None => url,
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        if authority.is_empty() {
            return Err(GenerationError::InvalidUrl(format!("no host in {}", url)));
        }

        // `[v6addr]:port` keeps its colons inside the brackets
        let (host, port) = match authority.strip_prefix('[') {
            Some(bracketed) => {
                let (host, after) = bracketed.split_once(']').ok_or_else(|| {
                    GenerationError::InvalidUrl(format!("unclosed '[' in {}", url))
                })?;
                match after {
                    "" => (host, None),
                    _ => match after.strip_prefix(':') {
                        Some(port) => (host, Some(port)),
                        None => {
                            return Err(GenerationError::InvalidUrl(format!(
                                "junk after host in {}",
                                url
                            )));
                        }
                    },
                }
            }
            None => match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            },
        };
        if host.is_empty() {
            return Err(GenerationError::InvalidUrl(format!("no host in {}", url)));
        }
        let port = match port {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| GenerationError::InvalidUrl(format!("bad port in {}", url)))?,
            None => 80,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            prefix: path.trim_end_matches('/').to_string(),
        })
    }

    fn path(&self, endpoint: &str) -> String {
        format!("{}/{}", self.prefix, endpoint.trim_start_matches('/'))
    }

    fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == 80 {
            host
        } else {
            format!("{}:{}", host, self.port)
        }
    }
}

/// Blocking HTTP/1.1 client for the generation service
#[derive(Debug, Clone)]
pub struct HttpGenerationService {
    url: ServiceUrl,
    timeout: Duration,
}

impl HttpGenerationService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GenerationError> {
        Ok(Self {
            url: ServiceUrl::parse(base_url)?,
            timeout,
        })
    }

    pub fn from_config(config: &EditorConfig) -> Result<Self, GenerationError> {
        Self::new(
            &config.service_url,
            Duration::from_secs(config.request_timeout_secs.max(1)),
        )
    }

    pub fn url(&self) -> &ServiceUrl {
        &self.url
    }

    fn connect(&self) -> Result<TcpStream, GenerationError> {
        let addrs = (self.url.host.as_str(), self.url.port).to_socket_addrs()?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => GenerationError::Network(e),
            None => GenerationError::InvalidUrl(format!("{} did not resolve", self.url.host)),
        })
    }

    fn send(
        &self,
        method: &str,
        endpoint: &str,
        body: Option<&[u8]>,
    ) -> Result<(u16, Vec<u8>), GenerationError> {
        let mut stream = self.connect()?;
        let path = self.url.path(endpoint);

        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n",
            method,
            path,
            self.url.host_header()
        );
        if let Some(body) = body {
            head.push_str("Content-Type: application/json\r\n");
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        stream.write_all(head.as_bytes())?;
        if let Some(body) = body {
            stream.write_all(body)?;
        }
        stream.flush()?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        tracing::debug!("{} {} -> {} bytes", method, path, raw.len());
        parse_http_response(&raw)
    }
}

impl GenerationService for HttpGenerationService {
    fn generate(&self, request: &GenerateRequest) -> Result<String, GenerationError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| GenerationError::Malformed(format!("request body: {}", e)))?;
        let (status, body) = self.send("POST", "/generate", Some(&body))?;
        interpret_response(status, &body)
    }

    fn health(&self) -> Result<HealthStatus, GenerationError> {
        let (status, body) = self.send("GET", "/health", None)?;
        if !(200..300).contains(&status) {
            return Err(GenerationError::Http {
                status,
                message: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }
        serde_json::from_slice(&body).map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

/// Split a complete HTTP/1.1 response into status code and decoded body
pub fn parse_http_response(raw: &[u8]) -> Result<(u16, Vec<u8>), GenerationError> {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| GenerationError::Malformed("response has no header terminator".into()))?;
    let head = std::str::from_utf8(&raw[..split])
        .map_err(|_| GenerationError::Malformed("response headers are not UTF-8".into()))?;
    let body = &raw[split + 4..];

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| GenerationError::Malformed(format!("bad status line {:?}", status_line)))?;

    let mut content_length = None;
    let mut chunked = false;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().ok();
        } else if name.eq_ignore_ascii_case("transfer-encoding")
            && value.to_ascii_lowercase().contains("chunked")
        {
            chunked = true;
        }
    }

    let body = if chunked {
        decode_chunked(body)?
    } else if let Some(len) = content_length {
        if body.len() < len {
            return Err(GenerationError::Malformed(format!(
                "body truncated: {} of {} bytes",
                body.len(),
                len
            )));
        }
        body[..len].to_vec()
    } else {
        body.to_vec()
    };
    Ok((status, body))
}

fn decode_chunked(mut data: &[u8]) -> Result<Vec<u8>, GenerationError> {
    let mut out = Vec::new();
    loop {
        let line_end = data
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or_else(|| GenerationError::Malformed("unterminated chunk size".into()))?;
        let size_text = std::str::from_utf8(&data[..line_end])
            .map_err(|_| GenerationError::Malformed("chunk size is not UTF-8".into()))?;
        let size_text = size_text.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| GenerationError::Malformed(format!("bad chunk size {:?}", size_text)))?;
        data = &data[line_end + 2..];
        if size == 0 {
            return Ok(out);
        }
        if data.len() < size {
            return Err(GenerationError::Malformed("chunk truncated".into()));
        }
        out.extend_from_slice(&data[..size]);
        data = data.get(size + 2..).unwrap_or_default();
    }
}

/// A generation call running on a worker thread
pub struct PendingGeneration {
    receiver: Receiver<Result<String, GenerationError>>,
    liveness: Liveness,
    finished: bool,
}

impl PendingGeneration {
    /// Non-blocking check. Yields the outcome once; a result that lands after
    /// its session unmounted is dropped.
    pub fn poll(&mut self) -> Option<Result<String, GenerationError>> {
        if self.finished {
            return None;
        }
        let outcome = match self.receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(GenerationError::Failed(
                "generation worker exited without a result".into(),
            )),
        };
        self.finished = true;
        if !self.liveness.is_alive() {
            tracing::debug!("Generation finished after unmount, result dropped");
            return None;
        }
        Some(outcome)
    }

    /// Block until the worker answers
    pub fn wait(mut self) -> Option<Result<String, GenerationError>> {
        let outcome = self.receiver.recv().unwrap_or_else(|_| {
            Err(GenerationError::Failed(
                "generation worker exited without a result".into(),
            ))
        });
        self.finished = true;
        self.liveness.is_alive().then_some(outcome)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Run `request` against `service` off the calling thread
pub fn spawn_generation(
    service: Arc<dyn GenerationService>,
    request: GenerateRequest,
    liveness: Liveness,
) -> PendingGeneration {
    let (sender, receiver) = mpsc::channel();
    std::thread::spawn(move || {
        let start = std::time::Instant::now();
        let outcome = service.generate(&request);
        tracing::info!(
            "Generation {} in {:.1}s",
            if outcome.is_ok() { "succeeded" } else { "failed" },
            start.elapsed().as_secs_f32()
        );
        // Receiver gone means nobody is waiting any more
        let _ = sender.send(outcome);
    });
    PendingGeneration {
        receiver,
        liveness,
        finished: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_url_parse() {
        let url = ServiceUrl::parse("http://localhost:8000").unwrap();
        assert_eq!(url.host, "localhost");
        assert_eq!(url.port, 8000);
        assert_eq!(url.path("/generate"), "/generate");

        let url = ServiceUrl::parse("gen.internal/api/").unwrap();
        assert_eq!(url.port, 80);
        assert_eq!(url.path("health"), "/api/health");

        assert!(ServiceUrl::parse("https://secure.host").is_err());
        assert!(ServiceUrl::parse("http://:80").is_err());
        assert!(ServiceUrl::parse("http://[]:80").is_err());
    }

    #[test]
    fn test_ipv6_service_url() {
        let url = ServiceUrl::parse("http://[::1]:8000/v1").unwrap();
        assert_eq!(url.host, "::1");
        assert_eq!(url.port, 8000);
        assert_eq!(url.host_header(), "[::1]:8000");
        assert_eq!(url.path("generate"), "/v1/generate");

        let url = ServiceUrl::parse("http://[fe80::2]").unwrap();
        assert_eq!((url.host.as_str(), url.port), ("fe80::2", 80));
        assert_eq!(url.host_header(), "[fe80::2]");

        assert!(ServiceUrl::parse("http://[::1").is_err());
        assert!(ServiceUrl::parse("http://[::1]8000").is_err());
    }

    #[test]
    fn test_chunked_body() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5;x=y\r\npedia\r\n0\r\n\r\n";
        let (status, body) = parse_http_response(raw).unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, b"Wikipedia");
    }

    #[test]
    fn test_content_length_body() {
        let raw = b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 2\r\n\r\n{}trailing";
        let (status, body) = parse_http_response(raw).unwrap();
        assert_eq!(status, 500);
        assert_eq!(body, b"{}");
    }
}
