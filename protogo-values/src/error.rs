//! Plugin errors.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// The broad category of an [`Error`].
///
/// Every category is fatal to a single plugin invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A required argument was absent or the request could not be decoded.
    InvalidInput,
    /// The base generator could not be run, failed, or produced garbage.
    UpstreamFailure,
    /// The final response could not be encoded.
    SerializationFailure,
}

/// An error raised while post-processing a generation request.
#[derive(Debug, Error)]
pub enum Error {
    /// A required argument was `None`, or a configuration value was unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The `CodeGeneratorRequest` bytes were not a valid message.
    #[error("invalid CodeGeneratorRequest: {0}")]
    MalformedRequest(#[source] prost::DecodeError),

    /// The base generator process could not be started.
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Writing the request to, or reading the response from, the base generator failed.
    #[error("failed to communicate with {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The base generator did not exit within the configured timeout.
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// The base generator exited unsuccessfully.
    #[error("{program} failed ({status}): {stderr}")]
    ExitStatus {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The base generator wrote something other than a `CodeGeneratorResponse`.
    #[error("invalid CodeGeneratorResponse from {program}: {source}")]
    MalformedResponse {
        program: String,
        #[source]
        source: prost::DecodeError,
    },

    /// The base generator failed in a way that is not a process failure.
    #[error("base generator failed: {0}")]
    Upstream(String),

    #[error("failed to encode CodeGeneratorResponse: {0}")]
    Encode(#[from] prost::EncodeError),
}

impl Error {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Error {
        Error::InvalidInput(message.into())
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) | Error::MalformedRequest(_) => ErrorKind::InvalidInput,
            Error::Spawn { .. }
            | Error::Io { .. }
            | Error::Timeout { .. }
            | Error::ExitStatus { .. }
            | Error::MalformedResponse { .. }
            | Error::Upstream(_) => ErrorKind::UpstreamFailure,
            Error::Encode(_) => ErrorKind::SerializationFailure,
        }
    }
}

/// A `Result` alias where the `Err` case is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
