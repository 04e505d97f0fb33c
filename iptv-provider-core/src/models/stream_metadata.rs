use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Transport metadata travelling with an acquired stream.
///
/// Handed to the registry next to the stream so consumers can be served the
/// same headers the backend produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub headers: BTreeMap<String, String>,
    pub content_type: Option<String>,
    pub acquired_at: String,
}

impl StreamMetadata {
    pub fn new() -> Self {
        Self {
            headers: BTreeMap::new(),
            content_type: None,
            acquired_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl Default for StreamMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A stream freshly produced by a backend, plus its metadata.
#[derive(Debug, Clone)]
pub struct Acquisition<S> {
    pub stream: S,
    pub metadata: StreamMetadata,
}

impl<S> Acquisition<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            metadata: StreamMetadata::new(),
        }
    }

    pub fn with_metadata(stream: S, metadata: StreamMetadata) -> Self {
        Self { stream, metadata }
    }
}
