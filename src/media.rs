//! Media encoder — turns binary resources into self-describing data URIs.
//!
//! Photos and voice clips are inlined into requests as
//! `data:<mime>;base64,<payload>` strings, never raw binary. Encoding is pure
//! and deterministic; the only suspension point is the file read.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::EncodingError;

/// Kind of media attached to a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Voice,
}

/// A self-describing inline media string (`data:<mime>;base64,<payload>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    uri: String,
    kind: MediaKind,
}

impl DataUri {
    /// The full data URI string.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// The MIME type between `data:` and the first `;`.
    pub fn mime(&self) -> &str {
        let rest = &self.uri["data:".len()..];
        rest.split(';').next().unwrap_or("")
    }

    /// Parse an existing string, checking the `data:<mime>;base64,` shape.
    pub fn parse(kind: MediaKind, s: impl Into<String>) -> Option<Self> {
        let uri = s.into();
        let rest = uri.strip_prefix("data:")?;
        let (mime, payload) = rest.split_once(";base64,")?;
        if mime.is_empty() || !mime.contains('/') || payload.is_empty() {
            return None;
        }
        Some(Self { uri, kind })
    }
}

impl std::fmt::Display for DataUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Encode raw bytes as a data URI. Pure and deterministic.
pub fn encode_bytes(kind: MediaKind, mime: &str, bytes: &[u8]) -> DataUri {
    DataUri {
        uri: format!("data:{};base64,{}", mime, BASE64.encode(bytes)),
        kind,
    }
}

/// Read a local resource and encode it, inferring the MIME type from the
/// file extension.
pub async fn encode_file(kind: MediaKind, path: &Path) -> Result<DataUri, EncodingError> {
    let display = path.display().to_string();
    let mime = mime_for_path(path).ok_or_else(|| EncodingError::UnknownMediaType {
        path: display.clone(),
    })?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| EncodingError::Read {
            path: display.clone(),
            source,
        })?;

    if bytes.is_empty() {
        return Err(EncodingError::Empty { path: display });
    }

    Ok(encode_bytes(kind, mime, &bytes))
}

/// MIME types for the media extensions the app produces.
fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "webm" => "video/webm",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn encode_bytes_shape() {
        let uri = encode_bytes(MediaKind::Photo, "image/png", b"\x89PNG");
        assert!(uri.as_str().starts_with("data:image/png;base64,"));
        assert_eq!(uri.mime(), "image/png");
        assert_eq!(uri.kind(), MediaKind::Photo);
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = encode_bytes(MediaKind::Voice, "audio/mpeg", b"same bytes");
        let b = encode_bytes(MediaKind::Voice, "audio/mpeg", b"same bytes");
        assert_eq!(a, b);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(DataUri::parse(MediaKind::Photo, "data:image/png;base64,AAAA").is_some());
        assert!(DataUri::parse(MediaKind::Photo, "http://example.com/a.png").is_none());
        assert!(DataUri::parse(MediaKind::Photo, "data:;base64,AAAA").is_none());
        assert!(DataUri::parse(MediaKind::Photo, "data:image/png;base64,").is_none());
        assert!(DataUri::parse(MediaKind::Photo, "data:notamime;base64,AAAA").is_none());
    }

    #[tokio::test]
    async fn encode_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::with_suffix(".png").unwrap();
        file.write_all(b"fake png bytes").unwrap();

        let first = encode_file(MediaKind::Photo, file.path()).await.unwrap();
        let second = encode_file(MediaKind::Photo, file.path()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.mime(), "image/png");
    }

    #[tokio::test]
    async fn encode_file_missing_is_read_error() {
        let err = encode_file(MediaKind::Photo, Path::new("/nonexistent/file.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, EncodingError::Read { .. }));
    }

    #[tokio::test]
    async fn encode_file_unknown_extension() {
        let err = encode_file(MediaKind::Photo, Path::new("/tmp/whatever.xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, EncodingError::UnknownMediaType { .. }));
    }

    #[tokio::test]
    async fn encode_file_empty_is_rejected() {
        let file = tempfile::NamedTempFile::with_suffix(".mp3").unwrap();
        let err = encode_file(MediaKind::Voice, file.path()).await.unwrap_err();
        assert!(matches!(err, EncodingError::Empty { .. }));
    }
}
