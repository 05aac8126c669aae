//! Fatal error taxonomy for the parse facade.
//!
//! Anything wrong *inside* readable tool output is reported as data on
//! `ParseResult`; only problems with the input as a whole end up here.

/// Error that aborts a parse call.
#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    #[error("Input is not valid UTF-8 text (valid up to byte {valid_up_to}): {source}")]
    Undecodable {
        valid_up_to: usize,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Unknown tool hint: {0}")]
    UnknownToolHint(String),
}

impl ParseFailure {
    /// Check if the caller supplied a hint no parser recognizes.
    pub fn is_unknown_hint(&self) -> bool {
        matches!(self, Self::UnknownToolHint(_))
    }

    /// Check if the input bytes could not be decoded at all.
    pub fn is_undecodable(&self) -> bool {
        matches!(self, Self::Undecodable { .. })
    }
}

impl From<std::str::Utf8Error> for ParseFailure {
    fn from(source: std::str::Utf8Error) -> Self {
        Self::Undecodable {
            valid_up_to: source.valid_up_to(),
            source,
        }
    }
}
