//! Markup sanitisation for job descriptions.
//!
//! Sources hand back descriptions as HTML of very mixed quality. Stored
//! descriptions keep structural tags so they stay readable, but never carry
//! active content or arbitrary attributes.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Elements removed together with everything inside them.
const DANGEROUS_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "form", "input", "button", "textarea", "select", "object",
    "embed", "applet", "noscript",
];

static RE_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());

// The regex crate has no backreferences, so each element gets its own pattern.
static RE_DANGEROUS_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DANGEROUS_ELEMENTS
        .iter()
        .map(|name| Regex::new(&format!(r"(?is)<{0}\b[^>]*>.*?</{0}\s*>", name)).unwrap())
        .collect()
});

static RE_DANGEROUS_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)</?(?:{})\b[^>]*>", DANGEROUS_ELEMENTS.join("|"))).unwrap()
});

static RE_OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([a-zA-Z][a-zA-Z0-9]*)(\s[^>]*?)?\s*(/?)>").unwrap());

static RE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+)"#).unwrap()
});

static RE_ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn allowed_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href"],
        "img" => &["src", "alt"],
        _ => &[],
    }
}

fn remove_dangerous(html: &str) -> String {
    let mut out = RE_COMMENT.replace_all(html, "").into_owned();
    for re in RE_DANGEROUS_BLOCKS.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    RE_DANGEROUS_TAGS.replace_all(&out, "").into_owned()
}

fn rebuild_tag(caps: &Captures<'_>) -> String {
    let tag = caps[1].to_ascii_lowercase();
    let self_closing = &caps[3] == "/";
    let allowed = allowed_attrs(&tag);

    let mut out = format!("<{}", tag);
    let mut has_href = false;
    if let Some(attrs) = caps.get(2) {
        for attr in RE_ATTR.captures_iter(attrs.as_str()) {
            let name = attr[1].to_ascii_lowercase();
            if !allowed.contains(&name.as_str()) {
                continue;
            }
            let value = attr[2].trim_matches(|c| c == '"' || c == '\'');
            if matches!(name.as_str(), "href" | "src")
                && value.trim_start().to_ascii_lowercase().starts_with("javascript:")
            {
                continue;
            }
            if name == "href" {
                has_href = true;
            }
            out.push_str(&format!(" {}=\"{}\"", name, value.replace('"', "&quot;")));
        }
    }
    if tag == "a" && has_href {
        out.push_str(" target=\"_blank\" rel=\"noopener noreferrer\"");
    }
    out.push_str(if self_closing { " />" } else { ">" });
    out
}

/// Sanitises a description while keeping its structure.
///
/// Dangerous elements and comments are removed with their content. Every
/// attribute is dropped except `href` on `a` and `src`/`alt` on `img`; links
/// open in a new tab.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let safe = remove_dangerous(html);
    RE_OPEN_TAG
        .replace_all(&safe, |caps: &Captures<'_>| rebuild_tag(caps))
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

/// Strips all markup, returning whitespace-collapsed plain text.
pub fn strip_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let safe = remove_dangerous(html);
    let text = RE_ANY_TAG.replace_all(&safe, " ");
    let text = decode_entities(&text);
    RE_WHITESPACE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_html_removes_scripts_and_comments() {
        let html = "<p>Hello</p><script>alert('x')</script><!-- tracking --><style>p{}</style>";
        assert_eq!(clean_html(html), "<p>Hello</p>");
    }

    #[test]
    fn test_clean_html_drops_unclosed_dangerous_tags() {
        let html = "<p>Apply <input type=\"text\" name=\"q\"> now</p>";
        assert_eq!(clean_html(html), "<p>Apply  now</p>");
    }

    #[test]
    fn test_clean_html_filters_attributes() {
        let html = r#"<p class="x" onclick="evil()">Hi <a href="https://x.io" style="c">link</a></p>"#;
        assert_eq!(
            clean_html(html),
            r#"<p>Hi <a href="https://x.io" target="_blank" rel="noopener noreferrer">link</a></p>"#
        );
    }

    #[test]
    fn test_clean_html_keeps_img_src_alt() {
        let html = r#"<img src="https://x.io/a.png" alt="logo" width="10"/>"#;
        assert_eq!(
            clean_html(html),
            r#"<img src="https://x.io/a.png" alt="logo" />"#
        );
    }

    #[test]
    fn test_clean_html_drops_javascript_links() {
        let html = r#"<a href="javascript:alert(1)">x</a>"#;
        assert_eq!(clean_html(html), "<a>x</a>");
    }

    #[test]
    fn test_clean_html_plain_text_unchanged() {
        assert_eq!(clean_html("  just text  "), "just text");
        assert_eq!(clean_html(""), "");
    }

    #[test]
    fn test_strip_html() {
        let html = "<h1>Rust&nbsp;Engineer</h1>\n<p>Tom &amp; Jerry <b>Inc</b></p><script>x()</script>";
        assert_eq!(strip_html(html), "Rust Engineer Tom & Jerry Inc");
    }
}
