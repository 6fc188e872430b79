// SPDX-License-Identifier: Apache-2.0
//! error
//!
//! Layer: Crate root
//! Purpose:
//! - single error type for the engine (transport, codec, polling, resources)

use std::time::Duration;

use crate::domain::wire::Functions;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command socket could not be established. Fatal to `start`.
    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not connected to the host")]
    NotConnected,

    #[error("transport i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("SP handshake failed: {0}")]
    Handshake(String),

    #[error("malformed frame: {0}")]
    Frame(String),

    #[error("frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("host did not answer within {0:?}")]
    CommandTimeout(Duration),

    #[error("cannot decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: prost::DecodeError,
    },

    #[error("unexpected `{found}` payload in response to {function:?}")]
    UnexpectedPayload {
        function: Functions,
        found: &'static str,
    },

    #[error("invalid value in column `{column}`: {reason}")]
    Field { column: String, reason: String },

    #[error("host refused to enable message receiving (status {0})")]
    EnableRejected(i32),

    /// Raised by polling operations whose give-up policy is an explicit failure.
    #[error("timeout: {0}")]
    Timeout(&'static str),

    #[error("failed to download attachment (status {0})")]
    DownloadRejected(i32),

    #[error("failed to decrypt image")]
    DecryptFailed,

    #[error("operation cancelled")]
    Cancelled,

    #[error("resource unavailable: {0}")]
    Resource(String),
}

impl Error {
    /// True when the command connection can no longer be trusted to be in
    /// request/response lockstep and must be dropped.
    pub fn breaks_connection(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Frame(_) | Self::FrameTooLarge { .. } | Self::CommandTimeout(_)
        )
    }
}
