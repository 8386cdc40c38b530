use super::{Message, Transport};
use anyhow::Result;
use bson::{Bson, Document};
use thiserror::Error;

/// Server error code returned for unknown commands
pub const COMMAND_NOT_FOUND: i32 = 59;

/// A command the server answered with `ok: 0`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command failed with code {code} ({code_name}): {message}")]
pub struct CommandError {
    pub code: i32,
    pub code_name: String,
    pub message: String,
}

impl CommandError {
    fn from_reply(reply: &Document) -> Self {
        let code = match reply.get("code") {
            Some(Bson::Int32(code)) => *code,
            Some(Bson::Int64(code)) => i32::try_from(*code).unwrap_or_default(),
            #[allow(clippy::cast_possible_truncation)]
            Some(Bson::Double(code)) => *code as i32,
            _ => 0,
        };

        Self {
            code,
            code_name: reply.get_str("codeName").unwrap_or("Unknown").to_string(),
            message: reply
                .get_str("errmsg")
                .unwrap_or("no error message")
                .to_string(),
        }
    }
}

/// Whether the reply's `ok` field signals success
///
/// Servers send it as a double, older ones sometimes as an integer or boolean.
#[must_use]
pub fn is_ok(reply: &Document) -> bool {
    match reply.get("ok") {
        Some(Bson::Double(ok)) => (*ok - 1.0).abs() < f64::EPSILON,
        Some(Bson::Int32(ok)) => *ok == 1,
        Some(Bson::Int64(ok)) => *ok == 1,
        Some(Bson::Boolean(ok)) => *ok,
        _ => false,
    }
}

/// Turn a reply body into a result, mapping `ok: 0` to [`CommandError`]
///
/// # Errors
///
/// Returns [`CommandError`] when the server reports a failure
pub fn check_reply(reply: Document) -> Result<Document, CommandError> {
    if is_ok(&reply) {
        Ok(reply)
    } else {
        Err(CommandError::from_reply(&reply))
    }
}

/// Run `command` (which must carry `$db`) on `transport`
///
/// # Errors
///
/// Returns an error on I/O failure, or a [`CommandError`] if the server rejects the command
pub async fn run_command(transport: &mut Transport, command: Document) -> Result<Document> {
    let reply = transport.round_trip(Message::command(command)).await?;
    Ok(check_reply(reply.body)?)
}
