//! Utility functions for feed processing.

use chrono::{DateTime, Utc};
use std::io::Read;
use tracing::debug;

use crate::TARGET_WEB_REQUEST;

/// Helper function to validate a URL
pub fn is_valid_url(url: &str) -> bool {
    if let Ok(parsed) = url::Url::parse(url) {
        parsed.scheme() == "http" || parsed.scheme() == "https"
    } else {
        false
    }
}

/// Parse a date string in various formats
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339
    if let Ok(date) = DateTime::parse_from_rfc3339(date_str) {
        return Some(date.with_timezone(&Utc));
    }

    // Try RFC2822
    if let Ok(date) = DateTime::parse_from_rfc2822(date_str) {
        return Some(date.with_timezone(&Utc));
    }

    // Try ISO 8601
    if let Ok(date) = DateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(date.with_timezone(&Utc));
    }

    // Try common formats
    for format in &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y",
    ] {
        if let Ok(date) = DateTime::parse_from_str(date_str, format) {
            return Some(date.with_timezone(&Utc));
        }
    }

    None
}

/// Clean up malformed XML
pub fn cleanup_xml(xml: &str) -> String {
    let mut cleaned = xml.trim().to_string();

    // Remove any UTF-8 BOM if present
    if cleaned.starts_with('\u{FEFF}') {
        cleaned = cleaned[3..].to_string();
    }

    // Remove any leading whitespace or invalid characters before <?xml or <rss
    if let Some(xml_start) = cleaned.find("<?xml") {
        cleaned = cleaned[xml_start..].to_string();
    } else if let Some(rss_start) = cleaned.find("<rss") {
        cleaned = cleaned[rss_start..].to_string();
    } else if let Some(feed_start) = cleaned.find("<feed") {
        cleaned = cleaned[feed_start..].to_string();
    }

    // Replace common problematic entities
    cleaned = cleaned
        .replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&rsquo;", "&#8217;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rdquo;", "&#8221;")
        .replace("&ldquo;", "&#8220;")
        .replace("&amp;amp;", "&amp;")
        .replace("&apos;", "&#39;");

    // Remove any invalid XML characters
    cleaned = cleaned
        .chars()
        .filter(|&c| {
            matches!(c,
                '\u{0009}' | // tab
                '\u{000A}' | // newline
                '\u{000D}' | // carriage return
                '\u{0020}'..='\u{D7FF}' |
                '\u{E000}'..='\u{FFFD}' |
                '\u{10000}'..='\u{10FFFF}'
            )
        })
        .collect();

    // Ensure proper XML declaration if missing
    if !cleaned.starts_with("<?xml") {
        cleaned = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", cleaned);
    }

    cleaned
}

/// Try various decompression methods for a byte array
pub fn try_decompressions(bytes: &[u8], feed_url: &str) -> Vec<u8> {
    // First try gzip
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut decoded = Vec::new();
    if decoder.read_to_end(&mut decoded).is_ok() && !decoded.is_empty() {
        debug!(target: TARGET_WEB_REQUEST, "Successfully decompressed with gzip from {}", feed_url);
        return decoded;
    }

    // Try zlib
    let mut decoder = flate2::read::ZlibDecoder::new(bytes);
    let mut decoded = Vec::new();
    if decoder.read_to_end(&mut decoded).is_ok() && !decoded.is_empty() {
        debug!(target: TARGET_WEB_REQUEST, "Successfully decompressed with zlib from {}", feed_url);
        return decoded;
    }

    // Try deflate
    let mut decoder = flate2::read::DeflateDecoder::new(bytes);
    let mut decoded = Vec::new();
    if decoder.read_to_end(&mut decoded).is_ok() && !decoded.is_empty() {
        debug!(target: TARGET_WEB_REQUEST, "Successfully decompressed with deflate from {}", feed_url);
        return decoded;
    }

    // If no decompression worked, use original bytes
    debug!(target: TARGET_WEB_REQUEST, "No decompression method worked for {}, using original bytes", feed_url);
    bytes.to_vec()
}

/// Decode a feed body, recovering from feeds that are not valid UTF-8.
/// Falls back to the charset declared in the content type, then to
/// windows-1252 and shift_jis detection.
pub fn decode_feed_body(bytes: &[u8], content_type: Option<&str>) -> Option<String> {
    if let Ok(text) = String::from_utf8(bytes.to_vec()) {
        return Some(text);
    }

    // Try to detect encoding from content-type header
    if let Some(ct) = content_type {
        if let Some(charset) = ct
            .split(';')
            .find(|part| part.trim().to_lowercase().starts_with("charset="))
            .and_then(|charset| charset.split('=').nth(1))
        {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
                let (decoded, _, had_errors) = encoding.decode(bytes);
                if !had_errors {
                    debug!(target: TARGET_WEB_REQUEST, "Decoded feed body as declared charset {}", charset.trim());
                    return Some(decoded.into_owned());
                }
            }
        }
    }

    // Try Windows-1252 encoding
    let (decoded, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
    if !had_errors {
        debug!(target: TARGET_WEB_REQUEST, "Auto-detected encoding: windows-1252");
        return Some(decoded.into_owned());
    }

    // Try Shift-JIS encoding
    let (decoded, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
    if !had_errors {
        debug!(target: TARGET_WEB_REQUEST, "Auto-detected encoding: shift_jis");
        return Some(decoded.into_owned());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_rfc2822_and_rfc3339_dates() {
        assert!(parse_date("Tue, 01 Jul 2025 09:30:00 +0000").is_some());
        assert!(parse_date("2025-07-01T09:30:00Z").is_some());
        assert!(parse_date("not a date").is_none());
    }

    #[test]
    fn cleanup_strips_leading_garbage_and_adds_declaration() {
        let cleaned = cleanup_xml("junk before<rss version=\"2.0\"></rss>");
        assert!(cleaned.starts_with("<?xml"));
        assert!(cleaned.contains("<rss"));
    }

    #[test]
    fn gzip_bodies_are_decompressed() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"<rss></rss>").unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = try_decompressions(&compressed, "http://example.com/feed");
        assert_eq!(decoded, b"<rss></rss>");
    }

    #[test]
    fn windows_1252_bodies_are_recovered() {
        // 0xE9 is 'é' in windows-1252 and invalid on its own in UTF-8.
        let bytes = b"caf\xe9";
        let decoded = decode_feed_body(bytes, None).unwrap();
        assert_eq!(decoded, "café");
    }
}
