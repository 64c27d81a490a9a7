mod common;

use std::time::Duration;

use bytes::Bytes;
use common::{
    CASE_INFRASTRUCTURE_ERROR, CASE_SERVICE_ERROR, Empty, ErrorsRequest, SayHelloRequest, SayHelloResponse,
    TestServer,
};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, Request};
use micro_rpc::client::Client;
use micro_rpc::codec::Format;
use micro_rpc::error::{DETAIL_HTTP_BODY, DETAIL_HTTP_METHOD, DETAIL_HTTP_STATUS, DETAIL_HTTP_URL};
use micro_rpc::server::Responder;
use micro_rpc::{ClassifiedError, Code, Error};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn test_errors(server: &TestServer, case: &str) -> Error {
    let client = Client::default();
    let message = ErrorsRequest { case: case.to_owned() };
    let request = client.request(Format::Json, Method::POST, &server.url("/v1/test.errors"), &message).unwrap();
    client.call::<Empty>(&CancellationToken::new(), request).await.unwrap_err()
}

#[tokio::test(flavor = "multi_thread")]
async fn infrastructure_error() {
    let server = TestServer::start().await;

    let err = test_errors(&server, CASE_INFRASTRUCTURE_ERROR).await;
    assert!(matches!(err, Error::Infra(_)), "{err:?}");
    assert_eq!(err.code(), Code::NOT_FOUND);
    assert_eq!(err.message(), "Not Found");
    assert_eq!(err.details()[DETAIL_HTTP_STATUS], "404 Not Found");
    assert_eq!(err.details()[DETAIL_HTTP_BODY], "Not Found");
    assert_eq!(err.details()[DETAIL_HTTP_METHOD], "POST");
    assert_eq!(err.details()[DETAIL_HTTP_URL], server.url("/v1/test.errors"));

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn service_error_behind_io_error() {
    let server = TestServer::start().await;

    let err = test_errors(&server, CASE_SERVICE_ERROR).await;
    assert!(matches!(err, Error::Service(_)), "{err:?}");
    assert_eq!(err.code(), Code::INTERNAL_ERROR);
    assert_eq!(err.message(), "while reading the database: EOF");
    assert_eq!(err.to_string(), "Internal Error: while reading the database: EOF");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unclassified_error_is_internal() {
    let server = TestServer::start().await;

    let err = test_errors(&server, "no-such-case").await;
    assert_eq!(err.code(), Code::INTERNAL_ERROR);
    assert_eq!(err.message(), "unknown case 'no-such-case'");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unrecognized_content_type() {
    let server = TestServer::start().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri(server.url("/v1/say.hello"))
        .header(CONTENT_TYPE, "text/plain")
        .header(ACCEPT, "application/json")
        .body(Bytes::from_static(b"name=Admin"))
        .unwrap();
    let err = Client::default().call::<SayHelloResponse>(&CancellationToken::new(), request).await.unwrap_err();

    assert!(matches!(err, Error::Service(_)), "{err:?}");
    assert_eq!(err.code(), Code::CLIENT_CONTENT_ERROR);
    assert_eq!(err.message(), "Content-Type header 'text/plain' is invalid format or unrecognized content type");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_accept() {
    let server = TestServer::start().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri(server.url("/v1/say.hello"))
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "text/html")
        .body(Bytes::from_static(br#"{"name":"Admin"}"#))
        .unwrap();
    let err = Client::default().call::<SayHelloResponse>(&CancellationToken::new(), request).await.unwrap_err();

    assert_eq!(err.code(), Code::CLIENT_CONTENT_ERROR);
    assert_eq!(
        err.message(),
        "Accept header 'text/html' is invalid format or unrecognized content type, \
         only [application/json,application/bincode] are supported by this method"
    );

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn request_over_budget() {
    let server = TestServer::with_responder(Responder::builder().max_request_bytes(16).build()).await;
    let client = Client::default();

    let message = SayHelloRequest { name: "a name well over sixteen bytes".to_owned() };
    let request = client.request(Format::Json, Method::POST, &server.url("/v1/say.hello"), &message).unwrap();
    let err = client.call::<SayHelloResponse>(&CancellationToken::new(), request).await.unwrap_err();

    assert_eq!(err.code(), Code::BAD_REQUEST);
    assert_eq!(err.message(), "exceeds 16B limit");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn response_over_budget() {
    let server = TestServer::start().await;
    let client = Client::builder().max_response_bytes(8).build();

    let message = SayHelloRequest { name: "Admin".to_owned() };
    let request = client.request(Format::Json, Method::POST, &server.url("/v1/say.hello"), &message).unwrap();
    let err = client.call::<SayHelloResponse>(&CancellationToken::new(), request).await.unwrap_err();

    assert!(matches!(err, Error::Transport(_)), "{err:?}");
    assert_eq!(err.code(), Code::TRANSPORT_ERROR);
    assert!(err.to_string().contains("exceeds 8B limit"), "{err}");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn server_gone() {
    let server = TestServer::start().await;
    let url = server.url("/v1/say.hello");
    server.stop().await;

    let client = Client::default();
    let request = client.request(Format::Json, Method::POST, &url, &SayHelloRequest { name: "Admin".to_owned() }).unwrap();
    let err = client.call::<SayHelloResponse>(&CancellationToken::new(), request).await.unwrap_err();

    assert!(matches!(err, Error::Client(_)), "{err:?}");
    assert_eq!(err.code(), Code::CLIENT_ERROR);
    assert!(!err.is_cancelled());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_while_waiting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    // accepts and reads, never answers
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf).await;
    });

    let client = Client::default();
    let url = format!("http://{address}/v1/say.hello");
    let request = client.request(Format::Json, Method::POST, &url, &SayHelloRequest { name: "Admin".to_owned() }).unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = client.call::<SayHelloResponse>(&token, request).await.unwrap_err();
    assert!(err.is_cancelled(), "{err:?}");
    assert_eq!(err.code(), Code::CLIENT_ERROR);
    assert_eq!(err.details()[DETAIL_HTTP_URL], url);
}
