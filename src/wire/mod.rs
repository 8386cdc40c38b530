//! MongoDB wire protocol
//!
//! Only `OP_MSG` (opcode 2013) is spoken, which every server since 3.6
//! understands. Compression, exhaust cursors and checksums on outgoing
//! messages are not implemented.
//!
//! - `message` - header and `OP_MSG` encoding and decoding
//! - `codec` - `tokio_util` frame codec over `message`
//! - `transport` - plain or TLS connection carrying the messages
//! - `command` - command round trips and server error mapping

pub mod codec;
pub mod command;
pub mod message;
pub mod transport;

pub use codec::OpMsgCodec;
pub use command::{COMMAND_NOT_FOUND, CommandError, check_reply, is_ok, run_command};
pub use message::{DocumentSequence, Header, MAX_MESSAGE_LEN, Message, OP_MSG, next_request_id};
pub use transport::Transport;
