//! A small service exercised by the integration tests.

#![allow(dead_code, reason = "each test binary uses a different part of the demo")]

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use micro_rpc::code::Code;
use micro_rpc::error::ServiceError;
use micro_rpc::server::{Responder, Server};
use micro_rpc_http::handler::Handler;
use micro_rpc_http::protocol::body::ReqBody;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SayHelloRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SayHelloResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPixelRequest {
    pub complexity: f64,
    pub height: i64,
    pub width: i64,
    pub i: i64,
    pub j: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPixelResponse {
    pub gray: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorsRequest {
    pub case: String,
}

#[allow(clippy::empty_structs_with_brackets, reason = "serializes as an empty object")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Empty {}

pub const CASE_SERVICE_ERROR: &str = "service-error";
pub const CASE_INFRASTRUCTURE_ERROR: &str = "infrastructure-error";
pub const CASE_RETRY: &str = "retry";

fn say_hello(request: SayHelloRequest) -> Result<SayHelloResponse, ServiceError> {
    if request.name.is_empty() {
        return Err(ServiceError::new(Code::BAD_REQUEST, "'name' is required and cannot be empty"));
    }
    Ok(SayHelloResponse { message: format!("Hello, {}", request.name) })
}

/// The gray level of one pixel of the Mandelbrot set.
#[allow(clippy::cast_possible_truncation, reason = "gray levels are whole numbers")]
fn render_pixel(request: RenderPixelRequest) -> Result<RenderPixelResponse, ServiceError> {
    const MAX_ITERATIONS: usize = 1000;

    if request.width <= 0 || request.height <= 0 {
        return Err(ServiceError::new(Code::BAD_REQUEST, "'width' and 'height' must be positive"));
    }

    let xi = norm(request.i, request.width, -1.0, 2.0);
    let yi = norm(request.j, request.height, -1.0, 1.0);
    let (mut x, mut y) = (0.0_f64, 0.0_f64);
    for _ in 0..MAX_ITERATIONS {
        if x * x + y * y >= request.complexity {
            break;
        }
        (x, y) = (x * x - y * y + xi, 2.0 * x * y + yi);
    }

    Ok(RenderPixelResponse { gray: x as i64 })
}

#[allow(clippy::cast_precision_loss, reason = "pixel coordinates are small")]
fn norm(x: i64, total: i64, min: f64, max: f64) -> f64 {
    (max - min) * x as f64 / total as f64 - max
}

/// Routes `/v1/<method>` paths to the demo methods.
#[derive(Debug)]
pub struct DemoService {
    responder: Responder,
    retries: AtomicU32,
    fail_first: u32,
}

impl DemoService {
    pub fn new(responder: Responder) -> Self {
        Self { responder, retries: AtomicU32::new(0), fail_first: 2 }
    }

    async fn handle<Req, Resp, F>(&self, request: &mut Request<ReqBody<'_>>, method: F) -> Response<Full<Bytes>>
    where
        Req: DeserializeOwned + Send,
        Resp: Serialize,
        F: FnOnce(Req) -> Result<Resp, ServiceError> + Send,
    {
        let message = match self.responder.read_request::<_, Req>(request).await {
            Ok(message) => message,
            Err(e) => return self.responder.reply_error(request, &e),
        };

        match method(message) {
            Ok(response) => self.responder.reply(request, Code::OK, &response),
            Err(e) => self.responder.reply_error(request, &e),
        }
    }

    async fn test_errors(&self, request: &mut Request<ReqBody<'_>>) -> Response<Full<Bytes>> {
        let message = match self.responder.read_request::<_, ErrorsRequest>(request).await {
            Ok(message) => message,
            Err(e) => return self.responder.reply_error(request, &e),
        };

        match message.case.as_str() {
            CASE_SERVICE_ERROR => {
                let err = io::Error::other(ServiceError::with_source(
                    Code::INTERNAL_ERROR,
                    "while reading the database: EOF",
                ));
                self.responder.reply_error(request, &err)
            }
            CASE_INFRASTRUCTURE_ERROR => {
                let mut response = Response::new(Full::new(Bytes::from_static(b"Not Found")));
                *response.status_mut() = StatusCode::NOT_FOUND;
                response.headers_mut().insert(CONTENT_TYPE, "text/plain".parse().unwrap());
                response
            }
            CASE_RETRY => {
                if self.retries.fetch_add(1, Ordering::SeqCst) < self.fail_first {
                    self.responder.reply_with_code(request, Code::RETRY_REQUEST, "not yet")
                } else {
                    self.responder.reply(request, Code::OK, &Empty {})
                }
            }
            other => self.responder.reply_error(request, &io::Error::other(format!("unknown case '{other}'"))),
        }
    }
}

#[async_trait]
impl Handler for DemoService {
    type RespBody = Full<Bytes>;
    type Error = Infallible;

    async fn call(&self, mut request: Request<ReqBody<'_>>) -> Result<Response<Self::RespBody>, Self::Error> {
        if let Err(e) = self.responder.ensure_post(&request) {
            return Ok(self.responder.reply_error(&request, &e));
        }

        let path = request.uri().path().to_owned();
        let response = match path.as_str() {
            "/v1/say.hello" => self.handle(&mut request, say_hello).await,
            "/v1/render.pixel" => self.handle(&mut request, render_pixel).await,
            "/v1/test.errors" => self.test_errors(&mut request).await,
            _ => self.responder.reply_with_code(&request, Code::NOT_IMPLEMENTED, format!("no such method; {path}")),
        };
        Ok(response)
    }
}

/// A demo server running on an ephemeral port.
#[derive(Debug)]
pub struct TestServer {
    pub address: SocketAddr,
    token: CancellationToken,
    handle: JoinHandle<io::Result<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::with_responder(Responder::default()).await
    }

    pub async fn with_responder(responder: Responder) -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = Server::builder().listener(listener).handler(DemoService::new(responder)).build().unwrap();

        let token = CancellationToken::new();
        let handle = tokio::spawn(server.serve(token.clone()));
        Self { address, token, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.address)
    }

    pub async fn stop(self) {
        self.token.cancel();
        self.handle.await.unwrap().unwrap();
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();
}
