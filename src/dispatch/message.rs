//! Dispatch messages

/// Sequence label carried by the terminal end-of-stream marker
pub const TERMINAL_LABEL: &str = "0";

/// One message on the dispatch queue: a serialized transaction bundle with
/// its sequence label, or the terminal end-of-stream marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMessage {
    /// `<patientIndex>_<admissionIndex>_<chunkIndex>`, or `"0"` for the
    /// terminal marker
    pub sequence_label: String,
    /// Serialized transaction bundle; empty for the terminal marker
    pub payload: String,
    /// True for the end-of-stream marker
    pub terminal: bool,
}

impl DispatchMessage {
    /// A data message carrying one serialized chunk
    pub fn data(sequence_label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            sequence_label: sequence_label.into(),
            payload: payload.into(),
            terminal: false,
        }
    }

    /// The terminal end-of-stream marker
    pub fn terminal() -> Self {
        Self {
            sequence_label: TERMINAL_LABEL.to_string(),
            payload: String::new(),
            terminal: true,
        }
    }
}
