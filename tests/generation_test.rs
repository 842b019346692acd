use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use egui::Vec2;
use image::{Rgba, RgbaImage};
use inpaint_tools::codec::{EncodedImage, decode_image_data, encode_png};
use inpaint_tools::generation::{
    GenerateRequest, GenerationService, HealthStatus, HttpGenerationService, interpret_response,
    spawn_generation, validate_prompt,
};
use inpaint_tools::{EditorConfig, EditorError, GenerationError, ReviewState, Session};

fn result_data_url() -> String {
    EncodedImage::from_rgba(&RgbaImage::from_pixel(40, 30, Rgba([0, 0, 255, 255])))
        .unwrap()
        .to_data_url()
}

fn loaded_session() -> Session {
    let mut session = Session::new(EditorConfig::default());
    session.set_container_size(Vec2::new(400.0, 300.0));
    let png = encode_png(&RgbaImage::from_pixel(40, 30, Rgba([200, 10, 10, 255]))).unwrap();
    session.load_image(&png).unwrap();
    session
}

/// Serve one canned HTTP response and hand back the raw request
fn serve_once(response: String) -> (String, std::thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap();
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) || n == 0 {
                break;
            }
        }
        stream.write_all(response.as_bytes()).unwrap();
        String::from_utf8(raw).unwrap()
    });
    (url, handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let Some(end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&raw[..end]).to_ascii_lowercase();
    let length = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= end + 4 + length
}

fn json_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

struct FakeService {
    reply: Mutex<Option<Result<String, GenerationError>>>,
    delay: Duration,
}

impl FakeService {
    fn new(reply: Result<String, GenerationError>) -> Self {
        Self {
            reply: Mutex::new(Some(reply)),
            delay: Duration::ZERO,
        }
    }
}

impl GenerationService for FakeService {
    fn generate(&self, _request: &GenerateRequest) -> Result<String, GenerationError> {
        std::thread::sleep(self.delay);
        self.reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(GenerationError::Failed("called twice".into())))
    }

    fn health(&self) -> Result<HealthStatus, GenerationError> {
        Ok(HealthStatus {
            status: "healthy".into(),
            provider: Some("fake".into()),
        })
    }
}

mod contract_tests {
    use super::*;

    #[test]
    fn test_prompt_validation() {
        assert!(matches!(validate_prompt("   \n"), Err(GenerationError::EmptyPrompt)));
        assert_eq!(validate_prompt("  a red door ").unwrap(), "a red door");
    }

    #[test]
    fn test_success_response() {
        let body = format!(r#"{{"status":"success","image":"{}"}}"#, result_data_url());
        let image = interpret_response(200, body.as_bytes()).unwrap();
        assert!(image.starts_with("data:image/png;base64,"));
        assert!(decode_image_data(&image).is_ok());
    }

    #[test]
    fn test_server_error_carries_detail() {
        let err = interpret_response(500, br#"{"detail":"provider timed out"}"#).unwrap_err();
        match err {
            GenerationError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "provider timed out");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_plain_text_error_body() {
        let err = interpret_response(502, b"Bad Gateway").unwrap_err();
        assert!(matches!(err, GenerationError::Http { status: 502, ref message } if message == "Bad Gateway"));
    }

    #[test]
    fn test_non_success_status_field() {
        let err = interpret_response(200, br#"{"status":"error","detail":"nsfw"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Failed(_)));

        let err = interpret_response(200, br#"{"status":"success"}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Failed(_)));
    }

    #[test]
    fn test_non_success_uses_message_field() {
        let err = interpret_response(200, br#"{"status":"error","message":"quota exceeded"}"#)
            .unwrap_err();
        assert!(matches!(err, GenerationError::Failed(ref m) if m == "error: quota exceeded"));
    }

    #[test]
    fn test_malformed_body() {
        let err = interpret_response(200, b"<html>").unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }
}

mod http_tests {
    use super::*;

    #[test]
    fn test_generate_round_trip() {
        let body = format!(r#"{{"status":"success","image":"{}"}}"#, result_data_url());
        let (url, server) = serve_once(json_response("200 OK", &body));
        let service = HttpGenerationService::new(&url, Duration::from_secs(5)).unwrap();

        let request = GenerateRequest {
            image: "aW1hZ2U=".into(),
            mask: "bWFzaw==".into(),
            prompt: "a cat".into(),
        };
        let image = service.generate(&request).unwrap();
        assert_eq!(image, result_data_url());

        let raw = server.join().unwrap();
        assert!(raw.starts_with("POST /generate HTTP/1.1\r\n"));
        let (_, sent) = raw.split_once("\r\n\r\n").unwrap();
        let sent: GenerateRequest = serde_json::from_str(sent).unwrap();
        assert_eq!(sent, request);
    }

    #[test]
    fn test_generate_http_error() {
        let (url, server) = serve_once(json_response(
            "500 Internal Server Error",
            r#"{"detail":"no provider configured"}"#,
        ));
        let service = HttpGenerationService::new(&url, Duration::from_secs(5)).unwrap();
        let request = GenerateRequest {
            image: String::new(),
            mask: String::new(),
            prompt: "x".into(),
        };
        let err = service.generate(&request).unwrap_err();
        assert!(matches!(err, GenerationError::Http { status: 500, .. }));
        server.join().unwrap();
    }

    #[test]
    fn test_health_with_chunked_body() {
        let body = r#"{"status":"healthy","provider":"replicate"}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{}\r\n0\r\n\r\n",
            body.len(),
            body
        );
        let (url, server) = serve_once(response);
        let service = HttpGenerationService::new(&url, Duration::from_secs(5)).unwrap();

        let health = service.health().unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.provider.as_deref(), Some("replicate"));
        assert!(server.join().unwrap().starts_with("GET /health HTTP/1.1\r\n"));
    }

    #[test]
    fn test_connection_refused_is_network_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let service =
            HttpGenerationService::new(&format!("http://127.0.0.1:{}", port), Duration::from_secs(1))
                .unwrap();
        assert!(matches!(service.health(), Err(GenerationError::Network(_))));
    }
}

mod session_round_trip_tests {
    use super::*;

    #[test]
    fn test_build_request_validates_and_exports() {
        let mut empty = Session::new(EditorConfig::default());
        assert!(matches!(
            empty.build_generate_request("a cat"),
            Err(GenerationError::Editor(EditorError::NothingToExport))
        ));

        let mut session = loaded_session();
        assert!(matches!(
            session.build_generate_request("  "),
            Err(GenerationError::EmptyPrompt)
        ));

        let request = session.build_generate_request(" a cat ").unwrap();
        assert_eq!(request.prompt, "a cat");
        assert!(!request.image.starts_with("data:"));
        let image = decode_image_data(&request.image).unwrap();
        let mask = decode_image_data(&request.mask).unwrap();
        assert_eq!(image.dimensions(), (40, 30));
        assert_eq!(mask.dimensions(), (40, 30));
    }

    #[test]
    fn test_spawned_generation_proposes_result() {
        let mut session = loaded_session();
        let request = session.build_generate_request("a cat").unwrap();
        let service = Arc::new(FakeService::new(Ok(result_data_url())));
        let mut pending = spawn_generation(service, request, session.liveness());

        let outcome = loop {
            if let Some(outcome) = pending.poll() {
                break outcome;
            }
            std::thread::sleep(Duration::from_millis(5));
        };
        assert!(pending.poll().is_none());

        session.apply_generation(outcome).unwrap();
        assert_eq!(session.review_state(), ReviewState::Proposed);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_failed_generation_leaves_session_idle() {
        let mut session = loaded_session();
        let request = session.build_generate_request("a cat").unwrap();
        let service = Arc::new(FakeService::new(Err(GenerationError::Http {
            status: 500,
            message: "boom".into(),
        })));
        let outcome = spawn_generation(service, request, session.liveness())
            .wait()
            .unwrap();

        assert!(session.apply_generation(outcome).is_err());
        assert_eq!(session.review_state(), ReviewState::Idle);
    }

    #[test]
    fn test_result_after_unmount_is_dropped() {
        let mut session = loaded_session();
        let request = session.build_generate_request("a cat").unwrap();
        let mut service = FakeService::new(Ok(result_data_url()));
        service.delay = Duration::from_millis(50);
        let pending = spawn_generation(Arc::new(service), request, session.liveness());

        session.unmount();
        assert!(pending.wait().is_none());
        assert_eq!(session.review_state(), ReviewState::Idle);
    }
}
