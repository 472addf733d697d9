// SPDX-License-Identifier: Apache-2.0

/// Internal invariant violations. Reaching one of these means a bug in this
/// crate, not bad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnexpectedState {
    /// A leaf frame (string, number, constant) was handed a child result.
    ChildOfLeafFrame,
    /// A pop notification arrived with an empty child slot.
    MissingChildResult,
    /// An object frame received a key while not waiting for one.
    KeyOutOfPlace,
    /// A container frame was asked for its value twice.
    ValueTaken,
    /// A write sink reported more bytes than it was offered.
    SinkOverreport,
    /// A container frame held a value of the wrong kind.
    KindMismatch,
    /// A string frame looked for an escape past the end of its bytes.
    EscapeAtEnd,
}

/// Errors reported by values, containers, the parser and the serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A null, wrongly typed or out-of-range argument.
    InvalidParam,
    /// The allocator capability refused a request.
    OutOfMemory,
    /// A non-whitespace byte reached a parser that already completed its
    /// document.
    AlreadyFinished,
    /// Malformed JSON, malformed UTF-8, or a code point the escaping scheme
    /// cannot represent.
    EncodingError,
    /// Array index or object key lookup miss.
    IndexOutOfBounds,
    /// The root was notified without a document to deliver.
    Finished,
    /// The serializer was re-entered while a serialization was in flight.
    InvalidState,
    /// Internal invariant violation.
    Unexpected(UnexpectedState),
}

impl From<UnexpectedState> for Error {
    fn from(info: UnexpectedState) -> Self {
        Error::Unexpected(info)
    }
}

impl From<core::str::Utf8Error> for Error {
    fn from(_: core::str::Utf8Error) -> Self {
        Error::EncodingError
    }
}

impl core::fmt::Display for UnexpectedState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            UnexpectedState::ChildOfLeafFrame => "leaf frame received a child",
            UnexpectedState::MissingChildResult => "pop notification without a result",
            UnexpectedState::KeyOutOfPlace => "object key delivered out of place",
            UnexpectedState::ValueTaken => "frame value already taken",
            UnexpectedState::SinkOverreport => "sink accepted more than offered",
            UnexpectedState::KindMismatch => "frame holds a value of the wrong kind",
            UnexpectedState::EscapeAtEnd => "escape requested past the end of a string",
        };
        f.write_str(text)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidParam => f.write_str("invalid parameter"),
            Error::OutOfMemory => f.write_str("out of memory"),
            Error::AlreadyFinished => f.write_str("parser already finished"),
            Error::EncodingError => f.write_str("encoding error"),
            Error::IndexOutOfBounds => f.write_str("index out of bounds"),
            Error::Finished => f.write_str("finished"),
            Error::InvalidState => f.write_str("invalid state"),
            Error::Unexpected(info) => write!(f, "implementation error: {info}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_unexpected_state_conversion() {
        let error: Error = UnexpectedState::MissingChildResult.into();
        assert_eq!(
            error,
            Error::Unexpected(UnexpectedState::MissingChildResult)
        );
    }

    #[test]
    fn test_utf8_error_conversion() {
        // Lone continuation byte, built at runtime to keep the literal valid
        let mut bytes = [0u8; 1];
        bytes[0] = 0b1000_0000;
        match core::str::from_utf8(&bytes) {
            Err(e) => assert_eq!(Error::from(e), Error::EncodingError),
            Ok(_) => panic!("Expected UTF-8 validation to fail"),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Error::OutOfMemory.to_string(), "out of memory");
        assert_eq!(
            Error::Unexpected(UnexpectedState::SinkOverreport).to_string(),
            "implementation error: sink accepted more than offered"
        );
    }
}
