//! `OP_MSG` frame codec
//!
//! Frames are length-prefixed by the standard header: the first `i32` counts
//! the whole message, header included.

use super::message::{HEADER_LEN, Header, Message};
use anyhow::{Error, Result};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, Copy, Default)]
pub struct OpMsgCodec;

impl Decoder for OpMsgCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some(header) = Header::peek(src) else {
            return Ok(None);
        };

        // Bounds are checked before anything is reserved
        let payload_len = header.payload_len()?;
        let frame_len = HEADER_LEN + payload_len;

        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(payload_len);

        Message::decode(header, payload).map(Some)
    }
}

impl Encoder<Message> for OpMsgCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        item.encode(dst)
    }
}
