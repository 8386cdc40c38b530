use anyhow::{Context, Result, anyhow};
use bson::Document;
use bytes::{Buf, BufMut, BytesMut};
use std::sync::atomic::{AtomicI32, Ordering};

// Opcodes
pub const OP_COMPRESSED: i32 = 2012;
pub const OP_MSG: i32 = 2013;

pub const HEADER_LEN: usize = 16;
/// Upper bound the server advertises as `maxMessageSizeBytes`
pub const MAX_MESSAGE_LEN: usize = 48_000_000;
/// Header, flag bits and the kind byte of the body section
const MIN_MESSAGE_LEN: usize = HEADER_LEN + 4 + 1;

// OP_MSG flag bits
pub const CHECKSUM_PRESENT: u32 = 1;
pub const MORE_TO_COME: u32 = 1 << 1;
pub const EXHAUST_ALLOWED: u32 = 1 << 16;
/// Bits 0-15 must be understood by the receiver
const REQUIRED_FLAGS_MASK: u32 = 0x0000_ffff;

const SECTION_BODY: u8 = 0;
const SECTION_SEQUENCE: u8 = 1;

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

/// Process-wide request id, unique for the lifetime of the process
pub fn next_request_id() -> i32 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Standard message header shared by every opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: i32,
}

impl Header {
    /// Read the header at the front of `src` without consuming it, `None`
    /// until all 16 bytes are buffered
    #[must_use]
    pub fn peek(src: &[u8]) -> Option<Self> {
        let mut raw = src.get(..HEADER_LEN)?;

        Some(Self {
            length: raw.get_i32_le(),
            request_id: raw.get_i32_le(),
            response_to: raw.get_i32_le(),
            op_code: raw.get_i32_le(),
        })
    }

    pub fn put(&self, dst: &mut BytesMut) {
        dst.put_i32_le(self.length);
        dst.put_i32_le(self.request_id);
        dst.put_i32_le(self.response_to);
        dst.put_i32_le(self.op_code);
    }

    /// Payload length after the header, validated against protocol limits
    ///
    /// # Errors
    ///
    /// Returns an error if the declared length is out of bounds
    pub fn payload_len(&self) -> Result<usize> {
        let length = usize::try_from(self.length)
            .map_err(|_| anyhow!("negative message length: {}", self.length))?;

        if length < MIN_MESSAGE_LEN {
            anyhow::bail!("message length {length} is shorter than the minimum {MIN_MESSAGE_LEN}");
        }
        if length > MAX_MESSAGE_LEN {
            anyhow::bail!("message length {length} exceeds the maximum {MAX_MESSAGE_LEN}");
        }

        Ok(length - HEADER_LEN)
    }
}

/// Kind 1 section: a named batch of documents
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSequence {
    pub identifier: String,
    pub documents: Vec<Document>,
}

impl DocumentSequence {
    /// Size field, identifier and documents, without the kind byte
    fn put(&self, dst: &mut BytesMut) -> Result<()> {
        let mut section = BytesMut::new();
        section.put_slice(self.identifier.as_bytes());
        section.put_u8(0);
        for document in &self.documents {
            document
                .to_writer((&mut section).writer())
                .with_context(|| format!("failed to serialize {} document", self.identifier))?;
        }

        let size = i32::try_from(section.len() + 4)
            .map_err(|_| anyhow!("document sequence too large"))?;
        dst.put_i32_le(size);
        dst.put(section);
        Ok(())
    }

    /// Parse one section whose size field is at the front of `section`
    fn parse(mut section: BytesMut) -> Result<Self> {
        section.advance(4);

        let identifier_len = section
            .iter()
            .position(|&b| b == 0)
            .context("unterminated document sequence identifier")?;
        let identifier = String::from_utf8_lossy(&section.split_to(identifier_len)).into_owned();
        section.advance(1);

        let mut documents = Vec::new();
        while section.has_remaining() {
            documents.push(split_document(&mut section)?);
        }

        Ok(Self {
            identifier,
            documents,
        })
    }
}

/// An `OP_MSG` message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub request_id: i32,
    pub response_to: i32,
    pub flags: u32,
    pub body: Document,
    pub sequences: Vec<DocumentSequence>,
}

impl Message {
    /// A command request with a fresh request id
    #[must_use]
    pub fn command(body: Document) -> Self {
        Self {
            request_id: next_request_id(),
            response_to: 0,
            flags: 0,
            body,
            sequences: Vec::new(),
        }
    }

    /// A reply to `request_id`
    #[must_use]
    pub fn reply(request_id: i32, body: Document) -> Self {
        Self {
            request_id: next_request_id(),
            response_to: request_id,
            flags: 0,
            body,
            sequences: Vec::new(),
        }
    }

    /// Append header, flag bits and sections to `dst`
    ///
    /// Never sets `checksumPresent`, so no trailing checksum is written.
    ///
    /// # Errors
    ///
    /// Returns an error if a document cannot be serialized or the message is too large
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        let mut sections = BytesMut::with_capacity(64);
        sections.put_u32_le(self.flags & !CHECKSUM_PRESENT);

        sections.put_u8(SECTION_BODY);
        self.body
            .to_writer((&mut sections).writer())
            .context("failed to serialize command body")?;

        for sequence in &self.sequences {
            sections.put_u8(SECTION_SEQUENCE);
            sequence.put(&mut sections)?;
        }

        let length = HEADER_LEN + sections.len();
        if length > MAX_MESSAGE_LEN {
            anyhow::bail!("message of {length} bytes exceeds the maximum {MAX_MESSAGE_LEN}");
        }

        let header = Header {
            length: i32::try_from(length).map_err(|_| anyhow!("message too large"))?,
            request_id: self.request_id,
            response_to: self.response_to,
            op_code: OP_MSG,
        };

        dst.reserve(length);
        header.put(dst);
        dst.put(sections);
        Ok(())
    }

    /// Parse the bytes following `header`
    ///
    /// # Errors
    ///
    /// Returns an error on unsupported opcodes, unknown required flag bits,
    /// malformed sections, or when the body section is missing or repeated
    pub fn decode(header: Header, mut payload: BytesMut) -> Result<Self> {
        match header.op_code {
            OP_MSG => {}
            OP_COMPRESSED => anyhow::bail!("compressed messages are not supported"),
            other => anyhow::bail!("unexpected opcode {other}"),
        }

        if payload.remaining() < 4 {
            anyhow::bail!("missing OP_MSG flag bits");
        }
        let flags = payload.get_u32_le();
        let unknown = flags & REQUIRED_FLAGS_MASK & !(CHECKSUM_PRESENT | MORE_TO_COME);
        if unknown != 0 {
            anyhow::bail!("unknown required OP_MSG flag bits: {unknown:#06x}");
        }

        if flags & CHECKSUM_PRESENT != 0 {
            let end = payload
                .len()
                .checked_sub(4)
                .context("OP_MSG too short for its checksum")?;
            payload.truncate(end);
        }

        let mut body = None;
        let mut sequences = Vec::new();

        while payload.has_remaining() {
            match payload.get_u8() {
                SECTION_BODY => {
                    if body.replace(split_document(&mut payload)?).is_some() {
                        anyhow::bail!("OP_MSG carries more than one body section");
                    }
                }
                SECTION_SEQUENCE => {
                    let size = usize::try_from(peek_i32(&payload)?)
                        .map_err(|_| anyhow!("negative document sequence size"))?;
                    if size < 5 || size > payload.len() {
                        anyhow::bail!("document sequence overruns the message");
                    }
                    sequences.push(DocumentSequence::parse(payload.split_to(size))?);
                }
                other => anyhow::bail!("unknown OP_MSG section kind {other}"),
            }
        }

        Ok(Self {
            request_id: header.request_id,
            response_to: header.response_to,
            flags,
            body: body.context("OP_MSG has no body section")?,
            sequences,
        })
    }
}

/// Split one length-prefixed BSON document off the front of `buf`
fn split_document(buf: &mut BytesMut) -> Result<Document> {
    let len = usize::try_from(peek_i32(buf)?)
        .map_err(|_| anyhow!("negative BSON document length"))?;
    if len < 5 || len > buf.len() {
        anyhow::bail!("BSON document overruns the message");
    }

    let raw = buf.split_to(len);
    Document::from_reader(raw.as_ref()).context("invalid BSON document")
}

fn peek_i32(buf: &[u8]) -> Result<i32> {
    buf.get(..4)
        .map(|mut raw| raw.get_i32_le())
        .context("truncated message")
}
