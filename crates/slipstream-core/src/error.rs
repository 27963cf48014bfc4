// crates/slipstream-core/src/error.rs
//
// The single error type used across the pipeline. Queue latches store a
// clone of the error, so every variant is cheap to clone and carries owned
// strings rather than source boxes.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The source produced a malformed payload. The decoder discards the
    /// packet and the session continues.
    #[error("malformed data: {0}")]
    InvalidData(String),

    /// The codec failed. Fatal to the current session; surfaces to the
    /// client as end-of-stream after a log entry.
    #[error("decoder failed: {0}")]
    Decoder(String),

    /// An allocation or buffer-pool request failed. Fatal.
    #[error("allocation failed: {0}")]
    NoMem(&'static str),

    /// An unsupported container, codec or option was requested. Fatal at
    /// init time.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A third-party library call failed. Typically fatal.
    #[error("external failure: {0}")]
    External(String),

    /// The source has nothing for us right now; retry after a short sleep.
    #[error("resource temporarily unavailable")]
    TryAgain,

    /// Normal terminal condition. Also the value latched onto queues when a
    /// producer finishes or a consumer leaves.
    #[error("end of stream")]
    Eof,
}

impl Error {
    /// True for conditions that end the session rather than a single packet.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::InvalidData(_) | Error::TryAgain | Error::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_classification() {
        assert!(!Error::InvalidData("bad nal".into()).is_fatal());
        assert!(!Error::TryAgain.is_fatal());
        assert!(!Error::Eof.is_fatal());
        assert!(Error::Decoder("session died".into()).is_fatal());
        assert!(Error::NoMem("pixel buffer pool").is_fatal());
        assert!(Error::Unsupported("10-bit".into()).is_fatal());
        assert!(Error::External("platform".into()).is_fatal());
    }

    #[test]
    fn display_is_prefixed() {
        let e = Error::Decoder("mid-stream reset".into());
        assert_eq!(e.to_string(), "decoder failed: mid-stream reset");
    }
}
