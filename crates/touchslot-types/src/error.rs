//! Wire codec errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated input: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("empty datagram")]
    Empty,

    #[error("too many events for one datagram: {0}")]
    TooManyEvents(usize),

    #[error("device name is not valid UTF-8")]
    InvalidName,

    #[error("malformed overlay report: {0}")]
    Overlay(String),
}
