use std::io;

use thiserror::Error;

/// A wire line that could not be decoded into a [`crate::protocol::Message`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,
    #[error("unknown message: {0:?}")]
    UnknownPrefix(String),
    #[error("{message} is missing field `{field}`")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },
    #[error("{message} field `{field}` is not a number: {value:?}")]
    BadNumber {
        message: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{message} field `{field}` out of range: {value}")]
    OutOfRange {
        message: &'static str,
        field: &'static str,
        value: u32,
    },
}

/// Failures while establishing or handshaking a peer connection
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to listen on port {port}: {source}")]
    Bind { port: u16, source: io::Error },
    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
    #[error("peer closed the connection during the handshake")]
    ClosedDuringHandshake,
    #[error("handshake ended before {0} was received")]
    IncompleteHandshake(&'static str),
    #[error("waiting for a peer was cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] io::Error),
    #[error("config is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history io error: {0}")]
    Io(#[from] io::Error),
    #[error("history csv error: {0}")]
    Csv(#[from] csv::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_render_readably() {
        let err = ProtocolError::BadNumber {
            message: "PROGRESS",
            field: "position",
            value: "abc".into(),
        };
        assert_eq!(
            err.to_string(),
            "PROGRESS field `position` is not a number: \"abc\""
        );
    }
}
