use serde::{Deserialize, Serialize};

/// A response held in (or headed for) a cache bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub url: String,
    pub status: u16,
    /// Header pairs in the order the server sent them. Values are raw bytes:
    /// HTTP allows non-UTF-8 values and those must survive unchanged.
    #[serde(default)]
    pub headers: Vec<(String, Vec<u8>)>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl StoredResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 2xx status, the only kind the bulk add accepts
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// Like `header`, for values that are valid UTF-8.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}
