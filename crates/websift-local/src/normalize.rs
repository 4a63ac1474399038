//! Markup → canonical text.
//!
//! The output of [`normalize_body`] is the "full content" that pagination slices. It must be
//! a pure function of (bytes, content type): the cursor handed to callers is only meaningful
//! if re-normalizing the same input reproduces the same string.

use html_scraper::{Html, Node};
use std::borrow::Cow;
use websift_core::FetchError;

/// Subtrees dropped before text extraction, matched on tag name.
pub const STRIPPED_TAGS: &[&str] = &[
    "script",
    "style",
    "noscript",
    "nav",
    "header",
    "footer",
    "aside",
    "advertisement",
    "ads",
    "sidebar",
    "menu",
    "widget",
    "banner",
];

fn is_stripped(tag: &str) -> bool {
    STRIPPED_TAGS.iter().any(|t| tag.eq_ignore_ascii_case(t))
}

/// Split on any Unicode whitespace and rejoin with single spaces (trimmed).
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_any_text(s: &str) -> bool {
    s.chars().any(|c| !c.is_whitespace())
}

fn content_type_lc_prefix(ct: Option<&str>) -> String {
    ct.unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

fn charset_label(ct: Option<&str>) -> Option<&str> {
    ct?.split(';').skip(1).find_map(|param| {
        let (k, v) = param.split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| v.trim().trim_matches('"'))
    })
}

pub fn bytes_look_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

pub fn bytes_look_like_image(bytes: &[u8]) -> bool {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        return true;
    }
    if bytes.starts_with(b"\xff\xd8\xff") {
        return true;
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return true;
    }
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

fn bytes_look_like_archive(bytes: &[u8]) -> bool {
    bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"\x1f\x8b")
}

fn content_type_is_binary(ct: &str) -> bool {
    ct == "application/pdf"
        || ct == "application/octet-stream"
        || ct == "application/zip"
        || ct == "application/gzip"
        || ct.starts_with("image/")
        || ct.starts_with("audio/")
        || ct.starts_with("video/")
        || ct.starts_with("font/")
}

/// Reason the body cannot be treated as markup, if any.
fn binary_body_reason(bytes: &[u8], ct: &str) -> Option<String> {
    if content_type_is_binary(ct) {
        return Some(format!("unsupported content type {ct}"));
    }
    if bytes_look_like_pdf(bytes) {
        return Some("body is a PDF document".to_string());
    }
    if bytes_look_like_image(bytes) {
        return Some("body is an image".to_string());
    }
    if bytes_look_like_archive(bytes) {
        return Some("body is a compressed archive".to_string());
    }
    // UTF-16 bodies legitimately contain NULs; everything else with NULs is binary.
    let sniff = &bytes[..bytes.len().min(1024)];
    let utf16_bom = sniff.starts_with(b"\xff\xfe") || sniff.starts_with(b"\xfe\xff");
    if !utf16_bom && sniff.contains(&0) {
        return Some("body contains binary data".to_string());
    }
    None
}

/// Decode with the declared charset (UTF-8 when absent or unknown).
///
/// Strict decoding is tried first; malformed sequences fall back to a lossy decode that
/// substitutes U+FFFD. Both paths are deterministic.
pub fn decode_body<'a>(bytes: &'a [u8], content_type: Option<&str>) -> Cow<'a, str> {
    let encoding = charset_label(content_type)
        .and_then(|l| encoding_rs::Encoding::for_label(l.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (encoding, bom_len) =
        encoding_rs::Encoding::for_bom(bytes).unwrap_or((encoding, 0));
    let body = &bytes[bom_len..];
    if let Some(s) = encoding.decode_without_bom_handling_and_without_replacement(body) {
        return s;
    }
    tracing::debug!(
        encoding = encoding.name(),
        "strict decode failed; falling back to lossy decode"
    );
    let (s, _had_errors) = encoding.decode_without_bom_handling(body);
    s
}

fn visible_text(doc: &Html) -> String {
    let mut out = String::new();
    // Explicit stack: documents can nest deeper than the call stack allows.
    let mut stack = vec![doc.tree.root()];
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(t) => {
                out.push_str(t);
                continue;
            }
            Node::Element(el) if is_stripped(el.name()) => continue,
            Node::Document | Node::Fragment | Node::Element(_) => {}
            _ => continue,
        }
        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev());
    }
    out
}

/// Strip markup and boilerplate from an HTML string and collapse whitespace.
pub fn normalize_html(html: &str) -> String {
    let doc = Html::parse_document(html);
    collapse_whitespace(&visible_text(&doc))
}

/// Full normalization of a fetched body: binary sniff, decode, parse, strip, collapse.
pub fn normalize_body(bytes: &[u8], content_type: Option<&str>) -> Result<String, FetchError> {
    let ct = content_type_lc_prefix(content_type);
    if let Some(reason) = binary_body_reason(bytes, &ct) {
        return Err(FetchError::ParseFailed(reason));
    }
    let text = decode_body(bytes, content_type);
    if !has_any_text(&text) {
        return Ok(String::new());
    }
    Ok(normalize_html(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_boilerplate_subtrees() {
        let html = r#"<!doctype html>
        <html><head><title>Moby Dick</title><style>p { color: red }</style>
        <script>var x = "<b>not text</b>";</script></head>
        <body>
          <header>Site header</header>
          <nav><a href="/">Home</a></nav>
          <main><h1>Herman Melville</h1>
          <p>Call me   Ishmael.</p></main>
          <aside>Related</aside>
          <sidebar>Custom sidebar</sidebar>
          <footer>Privacy</footer>
          <noscript><img src="x.png"></noscript>
          <!-- a comment -->
        </body></html>"#;
        let out = normalize_html(html);
        assert_eq!(out, "Moby Dick Herman Melville Call me Ishmael.");
        assert!(!out.contains('<'));
        assert!(!out.contains('>'));
    }

    #[test]
    fn tag_matching_ignores_case() {
        let out = normalize_html("<body><NAV>menu</NAV><P>kept</P></body>");
        assert_eq!(out, "kept");
    }

    #[test]
    fn collapses_all_whitespace_kinds() {
        let out = normalize_html("<p>a\t\tb\n\n c\u{a0}\u{a0}d  </p>");
        assert_eq!(out, "a b c d");
        assert_eq!(collapse_whitespace("  \n "), "");
    }

    #[test]
    fn adjacent_inline_text_is_concatenated() {
        assert_eq!(normalize_html("<p>foo<b>bar</b> baz</p>"), "foobar baz");
    }

    #[test]
    fn normalization_is_deterministic() {
        let html = "<div><p>alpha</p>\n<p>beta   gamma</p><script>x</script></div>";
        let a = normalize_body(html.as_bytes(), Some("text/html")).unwrap();
        let b = normalize_body(html.as_bytes(), Some("text/html")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "alpha beta gamma");
    }

    #[test]
    fn deeply_nested_markup_does_not_overflow() {
        let depth = 5_000;
        let html = format!("{}deep{}", "<div>".repeat(depth), "</div>".repeat(depth));
        assert_eq!(normalize_html(&html), "deep");
    }

    #[test]
    fn binary_bodies_are_parse_failures() {
        let e = normalize_body(b"%PDF-1.7\n...", Some("text/html")).unwrap_err();
        assert!(matches!(e, FetchError::ParseFailed(_)));
        let e = normalize_body(b"\x89PNG\r\n\x1a\n\0\0", None).unwrap_err();
        assert!(matches!(e, FetchError::ParseFailed(_)));
        let e = normalize_body(b"hello", Some("application/pdf")).unwrap_err();
        assert!(matches!(e, FetchError::ParseFailed(_)));
        let e = normalize_body(b"abc\0def", None).unwrap_err();
        assert!(matches!(e, FetchError::ParseFailed(_)));
    }

    #[test]
    fn declared_charset_is_honored() {
        // "café" in ISO-8859-1.
        let bytes = b"<p>caf\xe9</p>";
        let out = normalize_body(bytes, Some("text/html; charset=ISO-8859-1")).unwrap();
        assert_eq!(out, "café");
    }

    #[test]
    fn malformed_utf8_falls_back_to_lossy_decode() {
        let bytes = b"<p>ok \xff\xfe\xfd done</p>";
        let out = normalize_body(bytes, Some("text/html; charset=utf-8")).unwrap();
        assert!(out.starts_with("ok "));
        assert!(out.ends_with(" done"));
        assert!(out.contains('\u{fffd}'));
    }

    #[test]
    fn plain_text_bodies_pass_through_collapsed() {
        let out = normalize_body(b"line one\n\nline   two", Some("text/plain")).unwrap();
        assert_eq!(out, "line one line two");
    }

    #[test]
    fn whitespace_only_body_is_empty() {
        assert_eq!(normalize_body(b"  \n\t ", None).unwrap(), "");
    }
}
