//! HLS playlist rewriting.
//!
//! Rewrites every segment, nested-playlist and encryption-key URI in an
//! m3u8 document so the player fetches them back through the relay. The
//! transform is strictly line-local and 1:1: players depend on tag/URI
//! adjacency, so a line is never dropped or inserted. Lines that fail to
//! resolve pass through unchanged.

use regex::{NoExpand, Regex};
use url::Url;

/// Wraps an absolute media URL in a relay URL under `proxy_origin`.
pub fn proxy_wrap(absolute: &Url, proxy_origin: &str) -> String {
    format!(
        "{}/proxy?url={}",
        proxy_origin.trim_end_matches('/'),
        urlencoding::encode(absolute.as_str())
    )
}

/// Rewrites a playlist document against its own fetch URL.
///
/// `base_url` must be the URL the document was actually fetched from, not
/// the origin server root; relative segment paths resolve against it.
pub fn rewrite_playlist(content: &str, base_url: &Url, proxy_origin: &str) -> String {
    content
        .split('\n')
        .map(|line| rewrite_line(line, base_url, proxy_origin))
        .collect::<Vec<String>>()
        .join("\n")
}

fn rewrite_line(line: &str, base: &Url, proxy_origin: &str) -> String {
    let trimmed = line.trim();

    // Key directives carry a quoted URI that players fetch like a segment
    if trimmed.starts_with("#EXT-X-KEY:") {
        return rewrite_key_directive(line, trimmed, base, proxy_origin);
    }

    // Other comments, directives and blank lines pass through
    if trimmed.starts_with('#') || trimmed.is_empty() {
        return line.to_string();
    }

    // Everything else is a segment or nested-playlist reference
    match base.join(trimmed) {
        Ok(absolute) => proxy_wrap(&absolute, proxy_origin),
        Err(_) => line.to_string(),
    }
}

fn rewrite_key_directive(original: &str, trimmed: &str, base: &Url, proxy_origin: &str) -> String {
    let Ok(uri_pattern) = Regex::new(r#"URI="([^"]+)""#) else {
        return original.to_string();
    };
    let Some(key_uri) = uri_pattern
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
    else {
        return original.to_string();
    };

    match base.join(key_uri.as_str()) {
        Ok(absolute) => {
            let replacement = format!("URI=\"{}\"", proxy_wrap(&absolute, proxy_origin));
            uri_pattern
                .replace(trimmed, NoExpand(&replacement))
                .into_owned()
        }
        Err(_) => original.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://proxy.local";

    fn base() -> Url {
        Url::parse("https://cdn.example.com/a/index.m3u8").unwrap()
    }

    #[test]
    fn test_relative_segment_is_wrapped() {
        let rewritten = rewrite_playlist("seg001.ts", &base(), ORIGIN);
        assert_eq!(
            rewritten,
            "http://proxy.local/proxy?url=https%3A%2F%2Fcdn.example.com%2Fa%2Fseg001.ts"
        );
    }

    #[test]
    fn test_absolute_segment_is_wrapped() {
        let rewritten = rewrite_playlist("https://other.example.com/x/seg.ts", &base(), ORIGIN);
        assert_eq!(
            rewritten,
            "http://proxy.local/proxy?url=https%3A%2F%2Fother.example.com%2Fx%2Fseg.ts"
        );
    }

    #[test]
    fn test_comments_and_blank_lines_pass_through() {
        let doc = "#EXTM3U\n#EXT-X-VERSION:3\n\n#EXT-X-TARGETDURATION:6";
        assert_eq!(rewrite_playlist(doc, &base(), ORIGIN), doc);
    }

    #[test]
    fn test_key_directive_rewrites_only_the_uri() {
        let rewritten = rewrite_playlist(
            "#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"",
            &base(),
            ORIGIN,
        );
        assert_eq!(
            rewritten,
            "#EXT-X-KEY:METHOD=AES-128,URI=\"http://proxy.local/proxy?url=https%3A%2F%2Fcdn.example.com%2Fa%2Fkey.bin\""
        );
    }

    #[test]
    fn test_key_directive_with_iv_keeps_trailing_attributes() {
        let rewritten = rewrite_playlist(
            "#EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\",IV=0x0123456789abcdef",
            &base(),
            ORIGIN,
        );
        assert!(rewritten.starts_with("#EXT-X-KEY:METHOD=AES-128,URI=\"http://proxy.local/proxy?url="));
        assert!(rewritten.ends_with("\",IV=0x0123456789abcdef"));
    }

    #[test]
    fn test_key_directive_without_uri_passes_through() {
        let line = "#EXT-X-KEY:METHOD=NONE";
        assert_eq!(rewrite_playlist(line, &base(), ORIGIN), line);
    }

    #[test]
    fn test_malformed_line_passes_through() {
        let line = "https://[invalid-host/seg.ts";
        assert_eq!(rewrite_playlist(line, &base(), ORIGIN), line);
    }

    #[test]
    fn test_line_count_is_preserved() {
        let doc = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg001.ts\n#EXTINF:6.0,\nseg002.ts\n#EXT-X-ENDLIST\n";
        let rewritten = rewrite_playlist(doc, &base(), ORIGIN);
        assert_eq!(
            rewritten.split('\n').count(),
            doc.split('\n').count()
        );
    }

    #[test]
    fn test_nested_playlist_reference_is_wrapped() {
        let doc = "#EXT-X-STREAM-INF:BANDWIDTH=1280000\nlow/index.m3u8";
        let rewritten = rewrite_playlist(doc, &base(), ORIGIN);
        let lines: Vec<&str> = rewritten.split('\n').collect();
        assert_eq!(lines[0], "#EXT-X-STREAM-INF:BANDWIDTH=1280000");
        assert_eq!(
            lines[1],
            "http://proxy.local/proxy?url=https%3A%2F%2Fcdn.example.com%2Fa%2Flow%2Findex.m3u8"
        );
    }

    #[test]
    fn test_proxy_wrap_trims_trailing_origin_slash() {
        let absolute = Url::parse("https://cdn.example.com/seg.ts").unwrap();
        assert_eq!(
            proxy_wrap(&absolute, "http://proxy.local/"),
            "http://proxy.local/proxy?url=https%3A%2F%2Fcdn.example.com%2Fseg.ts"
        );
    }
}
