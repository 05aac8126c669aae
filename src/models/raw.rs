//! Raw tool output handed to the parser by its caller.

/// Untyped output blob plus the optional context a caller knows about it.
///
/// Borrowed from the caller and never modified; the parser only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawOutput<'a> {
    pub data: &'a [u8],
    pub tool_hint: Option<&'a str>,
    pub source: Option<&'a str>,
}

impl<'a> RawOutput<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            tool_hint: None,
            source: None,
        }
    }

    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }

    /// Attach a tool or format hint (e.g. `"nuclei"`, `"scan_report_xml"`).
    pub fn with_hint(mut self, hint: &'a str) -> Self {
        self.tool_hint = Some(hint);
        self
    }

    /// Attach the file name or other identifier the blob came from.
    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
