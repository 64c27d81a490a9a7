use crate::codec::body::PayloadDecoder;
use crate::codec::head::{RequestHeadDecoder, ResponseHeadDecoder};
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Decodes a stream of HTTP/1.1 messages: one head, then its body, then the next head.
///
/// `H` parses the head and decides the body framing; the body itself is handled by
/// a [`PayloadDecoder`] that lives until it yields [`PayloadItem::Eof`].
#[derive(Debug, Default)]
pub struct MessageDecoder<H> {
    head_decoder: H,
    payload_decoder: Option<PayloadDecoder>,
}

/// Server side: decodes requests.
pub type RequestDecoder = MessageDecoder<RequestHeadDecoder>;

/// Client side: decodes responses.
pub type ResponseDecoder = MessageDecoder<ResponseHeadDecoder>;

impl<H: Default> MessageDecoder<H> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H> MessageDecoder<H> {
    fn payload_message<T>(&mut self, item: Option<PayloadItem>) -> Option<Message<(T, PayloadSize)>> {
        match item {
            Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
            Some(item @ PayloadItem::Eof) => {
                self.payload_decoder.take();
                Some(Message::Payload(item))
            }
            None => None,
        }
    }
}

impl<H, T> Decoder for MessageDecoder<H>
where
    H: Decoder<Item = (T, PayloadSize), Error = ParseError>,
{
    type Item = Message<(T, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode(src)?;
            return Ok(self.payload_message(item));
        }

        Ok(self.head_decoder.decode(src)?.map(|(head, payload_size)| {
            self.payload_decoder = Some(payload_size.into());
            Message::Header((head, payload_size))
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode_eof(src)?;
            return Ok(self.payload_message(item));
        }

        Ok(self.head_decoder.decode_eof(src)?.map(|(head, payload_size)| {
            self.payload_decoder = Some(payload_size.into());
            Message::Header((head, payload_size))
        }))
    }
}
