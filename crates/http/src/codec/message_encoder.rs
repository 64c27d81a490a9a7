use crate::codec::body::PayloadEncoder;
use crate::codec::head::{RequestHeadEncoder, ResponseHeadEncoder};
use crate::protocol::{Message, PayloadItem, PayloadSize, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

/// Encodes a stream of HTTP/1.1 messages, the mirror image of
/// [`MessageDecoder`](crate::codec::MessageDecoder).
///
/// A head must be followed by its payload items and a final [`PayloadItem::Eof`]
/// before the next head is accepted.
#[derive(Debug, Default)]
pub struct MessageEncoder<H> {
    head_encoder: H,
    payload_encoder: Option<PayloadEncoder>,
}

/// Server side: encodes responses.
pub type ResponseEncoder = MessageEncoder<ResponseHeadEncoder>;

/// Client side: encodes requests.
pub type RequestEncoder = MessageEncoder<RequestHeadEncoder>;

impl<H: Default> MessageEncoder<H> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H, T, D> Encoder<Message<(T, PayloadSize), D>> for MessageEncoder<H>
where
    H: Encoder<(T, PayloadSize), Error = SendError>,
    D: Buf,
{
    type Error = SendError;

    fn encode(&mut self, item: Message<(T, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive message head");
                    return Err(SendError::invalid_head("message head sent before the previous body ended"));
                }

                self.payload_encoder = Some(payload_size.into());
                self.head_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect message head but receive payload item");
                    return Err(SendError::invalid_body("payload sent before a message head"));
                };

                let is_eof = payload_item.is_eof();
                let result = payload_encoder.encode(payload_item, dst);
                if is_eof {
                    self.payload_encoder.take();
                }
                result
            }
        }
    }
}
