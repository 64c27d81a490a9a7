use std::error::Error;
use std::fmt::Display;

use bytes::Bytes;
use futures::StreamExt;
use http::{Response, StatusCode};
use http_body::Body;
use http_body_util::Empty;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info, warn};

use super::{READ_BUFFER_SIZE, write_message};
use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::body::{MessageStream, ReqBody, skip_body};
use crate::protocol::{HttpError, Message, ParseError, PayloadSize, RequestHeader, ResponseHead, SendError};

/// The server half of an HTTP/1.1 connection.
///
/// Requests are processed one after another on the same socket until the peer
/// closes it or a protocol error makes further reuse unsafe.
#[derive(Debug)]
pub struct ServerConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
}

impl<R, W> ServerConnection<R, W>
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), READ_BUFFER_SIZE),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
        }
    }

    pub async fn process<H>(mut self, handler: &H) -> Result<(), HttpError>
    where
        H: Handler,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    self.do_process(header, payload_size, handler).await?;
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("receive body while waiting for a request head");
                    self.send_status(StatusCode::BAD_REQUEST).await?;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) => {
                    warn!(cause = %e, "can't receive next request");
                    self.send_status(StatusCode::BAD_REQUEST).await?;
                    return Err(e.into());
                }

                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(&mut self, header: RequestHeader, payload_size: PayloadSize, handler: &H) -> Result<(), HttpError>
    where
        H: Handler,
        <H::RespBody as Body>::Error: Display,
    {
        if header.expects_continue() {
            let writer = self.framed_write.get_mut();
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
            writer.flush().await.map_err(SendError::io)?;
            info!("receive expect request header, sent continue response");
        }

        let mut eof = false;
        let response_result = {
            let stream: &mut MessageStream<'_, RequestHeader> = &mut self.framed_read;
            handler.call(header.body(ReqBody::new(stream, &mut eof, payload_size))).await
        };

        let skipped = if eof { Ok(()) } else { skip_body::<RequestHeader>(&mut self.framed_read, &mut eof).await };

        match response_result {
            Ok(response) => self.send_response(response).await?,
            Err(e) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %e, "handle request error");
                self.send_status(StatusCode::INTERNAL_SERVER_ERROR).await?;
            }
        }

        // an unreadable body leaves the stream at an unknown position
        skipped?;
        Ok(())
    }

    async fn send_response<B>(&mut self, response: Response<B>) -> Result<(), HttpError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        let (parts, body) = response.into_parts();
        write_message(&mut self.framed_write, ResponseHead::from_parts(parts, ()), body).await
    }

    async fn send_status(&mut self, status: StatusCode) -> Result<(), HttpError> {
        let mut response = Response::new(Empty::<Bytes>::new());
        *response.status_mut() = status;
        self.send_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http::Request;
    use http_body_util::{BodyExt, Full};
    use indoc::indoc;
    use tokio::io::AsyncReadExt;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        type RespBody = Full<Bytes>;
        type Error = ParseError;

        async fn call(&self, req: Request<ReqBody<'_>>) -> Result<Response<Self::RespBody>, Self::Error> {
            let body = req.into_body().collect().await?.to_bytes();
            Ok(Response::new(Full::new(body)))
        }
    }

    struct Ignore;

    #[async_trait]
    impl Handler for Ignore {
        type RespBody = Full<Bytes>;
        type Error = ParseError;

        async fn call(&self, req: Request<ReqBody<'_>>) -> Result<Response<Self::RespBody>, Self::Error> {
            Ok(Response::new(Full::new(Bytes::from(req.uri().path().to_owned()))))
        }
    }

    async fn exchange<H>(handler: H, input: &str) -> String
    where
        H: Handler,
        <H::RespBody as Body>::Error: Display,
    {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (mut client_read, mut client_write) = tokio::io::split(client);

        client_write.write_all(input.as_bytes()).await.unwrap();
        client_write.shutdown().await.unwrap();

        ServerConnection::new(server_read, server_write).process(&handler).await.unwrap();

        let mut output = String::new();
        client_read.read_to_string(&mut output).await.unwrap();
        output
    }

    #[tokio::test]
    async fn echo_keep_alive() {
        let input = indoc! {r"
        POST /first HTTP/1.1
        Content-Length: 5

        helloPOST /second HTTP/1.1
        Transfer-Encoding: chunked

        5
        world
        0

        "};

        let output = exchange(Echo, input).await;

        assert_eq!(
            output,
            "HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nhello\
             HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nworld"
        );
    }

    #[tokio::test]
    async fn unread_body_is_skipped() {
        let input = indoc! {r"
        POST /first HTTP/1.1
        Content-Length: 5

        helloPOST /second HTTP/1.1
        Content-Length: 0

        "};

        let output = exchange(Ignore, input).await;

        assert_eq!(
            output,
            "HTTP/1.1 200 OK\r\ncontent-length: 6\r\n\r\n/first\
             HTTP/1.1 200 OK\r\ncontent-length: 7\r\n\r\n/second"
        );
    }

    #[tokio::test]
    async fn expect_continue() {
        let input = indoc! {r"
        POST /upload HTTP/1.1
        Expect: 100-continue
        Content-Length: 2

        ok"};

        let output = exchange(Echo, input).await;

        assert_eq!(output, "HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nok");
    }

    #[tokio::test]
    async fn malformed_request_gets_bad_request() {
        let (client, server) = tokio::io::duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (mut client_read, mut client_write) = tokio::io::split(client);

        client_write.write_all(b"NOT HTTP AT ALL\r\n\r\n").await.unwrap();
        client_write.shutdown().await.unwrap();

        let result = ServerConnection::new(server_read, server_write).process(&Echo).await;
        assert!(result.is_err());

        let mut output = String::new();
        client_read.read_to_string(&mut output).await.unwrap();
        assert!(output.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }
}
