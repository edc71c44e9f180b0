//! Content accepted by [`crate::Storage::save`]

use std::fmt;
use std::io::Cursor;

use bytes::Bytes;
use tokio::io::AsyncRead;

/// A readable byte stream handed to a backend for persisting
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Data to store: either a byte stream or in-memory text
pub enum Content {
    Stream(ByteStream),
    Text(String),
}

impl Content {
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Content::Stream(Box::new(reader))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Content::Text(text.into())
    }

    /// Turn the content into a byte stream. Text is encoded as UTF-8.
    pub fn into_stream(self) -> ByteStream {
        match self {
            Content::Stream(stream) => stream,
            Content::Text(text) => Box::new(Cursor::new(text.into_bytes())),
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Stream(_) => f.write_str("Content::Stream(..)"),
            Content::Text(text) => write!(f, "Content::Text({} bytes)", text.len()),
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Content {
    fn from(data: Vec<u8>) -> Self {
        Content::stream(Cursor::new(data))
    }
}

impl From<Bytes> for Content {
    fn from(data: Bytes) -> Self {
        Content::stream(Cursor::new(data))
    }
}

impl From<&[u8]> for Content {
    fn from(data: &[u8]) -> Self {
        Content::from(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_text_becomes_utf8_stream() {
        let mut stream = Content::text("grüße").into_stream();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, "grüße".as_bytes());
    }

    #[tokio::test]
    async fn test_bytes_pass_through() {
        let mut stream = Content::from(vec![0u8, 159, 146, 150]).into_stream();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, vec![0u8, 159, 146, 150]);
    }

    #[test]
    fn test_debug_does_not_dump_content() {
        assert_eq!(format!("{:?}", Content::from("hello")), "Content::Text(5 bytes)");
        assert_eq!(format!("{:?}", Content::from(b"hi".as_slice())), "Content::Stream(..)");
    }
}
