//! Multipart body codec for encrypted file transfer.
//!
//! File downloads come back as a two-part body (JSON metadata + encrypted
//! attachment) in the backend's own framing. Decoding is a byte scan with
//! fixed offsets rather than a general MIME parser:
//!
//! * the body is split on the raw boundary bytes, so every part still ends
//!   with the `\r\n--` that introduced the next delimiter;
//! * the body region starts 2 bytes (CRLF) after the last header-key line;
//! * it ends one byte short of the part and then drops a further 3-byte
//!   terminator, which together remove that trailing `\r\n--`.
//!
//! [`encode`] produces the same framing and is used for profile uploads.

/// Header line that carries each part's label.
pub const DEFAULT_HEADER_KEY: &str = "Content-Disposition: ";

/// Header line stripped before the body region is cut out.
pub const DEFAULT_KEY_TO_REMOVE: &str = "Content-Type:";

const CRLF: &[u8] = b"\r\n";

/// CRLF between the header block and the body.
const LEADING_FRAMING: usize = 2;

/// Closed-range slack at the end of a part.
const TRAILING_SLACK: usize = 1;

/// Terminator bytes dropped after the slack.
const TERMINATOR_LEN: usize = 3;

/// Bytes dropped from the final part (the CRLF after the closing delimiter).
const FINAL_PART_TRAILER: usize = 2;

/// One decoded part: its disposition label and raw body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartSegment {
    pub label: String,
    pub body: Vec<u8>,
}

/// Decoder with configurable header keys.
#[derive(Debug, Clone)]
pub struct MultipartDecoder {
    key: Vec<u8>,
    key_to_remove: Vec<u8>,
}

impl Default for MultipartDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_KEY, DEFAULT_KEY_TO_REMOVE)
    }
}

impl MultipartDecoder {
    pub fn new(key: &str, key_to_remove: &str) -> Self {
        Self {
            key: key.as_bytes().to_vec(),
            key_to_remove: key_to_remove.as_bytes().to_vec(),
        }
    }

    /// Decode `data` split on `boundary`.
    ///
    /// Returns `None` when no part carries the header key. A part with the
    /// key repeated yields one segment per occurrence.
    pub fn decode(&self, data: &[u8], boundary: &str) -> Option<Vec<MultipartSegment>> {
        if boundary.is_empty() || self.key.is_empty() {
            return None;
        }

        let parts = split(data, boundary.as_bytes());
        let last = parts.len().saturating_sub(1);
        let mut result: Option<Vec<MultipartSegment>> = None;

        for (index, part) in parts.into_iter().enumerate() {
            let part = if index == last {
                &part[..part.len().saturating_sub(FINAL_PART_TRAILER)]
            } else {
                part
            };

            for label in slices_between(part, &self.key, b"\r") {
                let Ok(label) = std::str::from_utf8(label) else {
                    continue;
                };
                let Some(body) = self.extract_body(part) else {
                    continue;
                };
                result.get_or_insert_with(Vec::new).push(MultipartSegment {
                    label: label.trim().to_string(),
                    body,
                });
            }
        }

        result
    }

    fn extract_body(&self, part: &[u8]) -> Option<Vec<u8>> {
        // Position just past the CRLF of the last header-key line.
        let mut pos = 0;
        while let Some(found) = find(&part[pos..], &self.key) {
            let after_key = pos + found + self.key.len();
            match find(&part[after_key..], CRLF) {
                Some(eol) => pos = after_key + eol + CRLF.len(),
                None => break,
            }
        }

        if pos >= part.len() {
            return None;
        }

        // `pos` was measured before the removal; the offsets line up because
        // the removed line directly follows the header-key line.
        let cleaned = self.remove_header_line(part);
        let start = pos + LEADING_FRAMING;
        let end = cleaned.len().checked_sub(TRAILING_SLACK + TERMINATOR_LEN)?;
        if start > end {
            return None;
        }
        Some(cleaned[start..end].to_vec())
    }

    /// Drop the first `key_to_remove` line including its CRLF, if any.
    fn remove_header_line(&self, part: &[u8]) -> Vec<u8> {
        let mut cleaned = part.to_vec();
        if self.key_to_remove.is_empty() {
            return cleaned;
        }
        if let Some(start) = find(part, &self.key_to_remove) {
            let after = start + self.key_to_remove.len();
            if let Some(eol) = find(&part[after..], CRLF) {
                cleaned.drain(start..after + eol + CRLF.len());
            }
        }
        cleaned
    }
}

/// Decode with the default header keys.
pub fn decode(data: &[u8], boundary: &str) -> Option<Vec<MultipartSegment>> {
    MultipartDecoder::default().decode(data, boundary)
}

/// Boundary from a `Content-Type` header value: everything after the last
/// `boundary=`, byte for byte.
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    let (_, boundary) = content_type.rsplit_once("boundary=")?;
    if boundary.is_empty() {
        None
    } else {
        Some(boundary)
    }
}

/// A part to encode.
#[derive(Debug, Clone)]
pub struct Part<'a> {
    /// Value of the `Content-Disposition` header.
    pub disposition: String,
    pub content_type: Option<String>,
    pub body: &'a [u8],
}

/// Fresh boundary for outgoing bodies.
pub fn generate_boundary() -> String {
    format!("Boundary-{}", uuid::Uuid::new_v4())
}

/// Encode parts in the framing [`decode`] understands.
pub fn encode(boundary: &str, parts: &[Part<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        out.extend_from_slice(DEFAULT_HEADER_KEY.as_bytes());
        out.extend_from_slice(part.disposition.as_bytes());
        out.extend_from_slice(CRLF);
        if let Some(ref content_type) = part.content_type {
            out.extend_from_slice(DEFAULT_KEY_TO_REMOVE.as_bytes());
            out.push(b' ');
            out.extend_from_slice(content_type.as_bytes());
            out.extend_from_slice(CRLF);
        }
        out.extend_from_slice(CRLF);
        out.extend_from_slice(part.body);
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Split on `separator`, dropping zero-length chunks.
fn split<'a>(data: &'a [u8], separator: &[u8]) -> Vec<&'a [u8]> {
    let mut chunks = Vec::new();
    let mut pos = 0;
    while let Some(found) = find(&data[pos..], separator) {
        let end = pos + found;
        if end > pos {
            chunks.push(&data[pos..end]);
        }
        pos = end + separator.len();
    }
    if pos < data.len() {
        chunks.push(&data[pos..]);
    }
    chunks
}

/// Every run of bytes between an occurrence of `from` and the next `to`.
fn slices_between<'a>(data: &'a [u8], from: &[u8], to: &[u8]) -> Vec<&'a [u8]> {
    let mut chunks = Vec::new();
    let mut pos = 0;
    while let Some(found) = find(&data[pos..], from) {
        let start = pos + found + from.len();
        let Some(len) = find(&data[start..], to) else {
            break;
        };
        chunks.push(&data[start..start + len]);
        pos = start;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "Boundary-8f14e45f";

    fn download_body(metadata: &[u8], attachment: &[u8]) -> Vec<u8> {
        encode(
            BOUNDARY,
            &[
                Part {
                    disposition: r#"form-data; name="metadata""#.to_string(),
                    content_type: Some("application/json".to_string()),
                    body: metadata,
                },
                Part {
                    disposition: r#"attachment; filename="blob""#.to_string(),
                    content_type: Some("application/octet-stream".to_string()),
                    body: attachment,
                },
            ],
        )
    }

    #[test]
    fn test_roundtrip_metadata_and_attachment() {
        let metadata = br#"{"fileName":"scan.pdf","size":4}"#;
        let attachment = [0x00, 0xFF, 0x10, 0x0A, 0x7F, 0x80];
        let body = download_body(metadata, &attachment);

        let segments = decode(&body, BOUNDARY).expect("segments");
        assert_eq!(segments.len(), 2);

        let meta = segments.iter().find(|s| s.label.contains("metadata")).unwrap();
        assert_eq!(meta.body, metadata.to_vec());

        let file = segments.iter().find(|s| s.label.contains("attachment")).unwrap();
        assert_eq!(file.body, attachment.to_vec());
    }

    #[test]
    fn test_labels_are_trimmed() {
        let body = download_body(b"{}", b"x");
        let segments = decode(&body, BOUNDARY).unwrap();
        assert_eq!(segments[0].label, r#"form-data; name="metadata""#);
        assert_eq!(segments[1].label, r#"attachment; filename="blob""#);
    }

    #[test]
    fn test_part_without_content_type_line() {
        let body = encode(
            BOUNDARY,
            &[Part {
                disposition: "attachment".to_string(),
                content_type: None,
                body: b"payload",
            }],
        );
        let segments = decode(&body, BOUNDARY).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].body, b"payload".to_vec());
    }

    #[test]
    fn test_empty_body_part() {
        let body = download_body(b"", b"z");
        let segments = decode(&body, BOUNDARY).unwrap();
        assert!(segments[0].body.is_empty());
        assert_eq!(segments[1].body, b"z".to_vec());
    }

    #[test]
    fn test_framing_offsets() {
        // 2 bytes skipped after the header block, 1 + 3 trailing bytes dropped.
        let part = b"\r\nContent-Disposition: attachment\r\n\r\nABCD\r\n--";
        let mut body = b"--".to_vec();
        body.extend_from_slice(BOUNDARY.as_bytes());
        body.extend_from_slice(part);
        body.extend_from_slice(BOUNDARY.as_bytes());
        body.extend_from_slice(b"--\r\n");

        let segments = decode(&body, BOUNDARY).unwrap();
        assert_eq!(segments[0].body, b"ABCD".to_vec());
    }

    #[test]
    fn test_missing_header_key_returns_none() {
        let body = b"--B\r\nX-Other: nope\r\n\r\nbody\r\n--B--\r\n";
        assert!(decode(body, "B").is_none());
    }

    #[test]
    fn test_boundary_is_byte_exact() {
        let body = download_body(b"{}", b"x");
        // Percent-encoded form of the boundary never splits the body, so
        // the attachment is not recovered.
        let segments = decode(&body, "Boundary%2D8f14e45f").unwrap_or_default();
        assert!(!segments.iter().any(|s| s.body == b"x".to_vec()));
    }

    #[test]
    fn test_custom_keys() {
        let body = b"--B\r\nX-Label: meta\r\nX-Drop: 1\r\n\r\n{}\r\n--B--\r\n";
        let decoder = MultipartDecoder::new("X-Label: ", "X-Drop:");
        let segments = decoder.decode(body, "B").unwrap();
        assert_eq!(segments[0].label, "meta");
        assert_eq!(segments[0].body, b"{}".to_vec());
    }

    #[test]
    fn test_empty_boundary_returns_none() {
        assert!(decode(b"anything", "").is_none());
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/mixed; boundary=abc123"),
            Some("abc123")
        );
        assert_eq!(boundary_from_content_type("application/json"), None);
        assert_eq!(boundary_from_content_type("multipart/mixed; boundary="), None);
    }

    #[test]
    fn test_generate_boundary_is_unique() {
        let a = generate_boundary();
        let b = generate_boundary();
        assert!(a.starts_with("Boundary-"));
        assert_ne!(a, b);
    }
}
