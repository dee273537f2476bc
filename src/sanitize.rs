//! Allow-list HTML cleaning for user supplied text.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</\s*(script|style)\s*>|<!--.*?-->")
        .expect("valid block pattern")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").expect("valid tag pattern")
});

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src|alt|title)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)
        .expect("valid attribute pattern")
});

/// Which tags survive cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Post bodies: formatting, lists, quotes, code, links, images, tables.
    Full,
    /// Messages: basic formatting and links only.
    Default,
}

const DEFAULT_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "em", "hr", "i", "li", "ol", "p", "s", "strong", "u", "ul",
];

const FULL_EXTRA_TAGS: &[&str] = &[
    "code", "h1", "h2", "h3", "h4", "h5", "h6", "img", "pre", "span", "table", "tbody", "td",
    "th", "thead", "tr",
];

const VOID_TAGS: &[&str] = &["br", "hr", "img"];

impl Profile {
    fn allows(self, tag: &str) -> bool {
        DEFAULT_TAGS.contains(&tag) || (self == Profile::Full && FULL_EXTRA_TAGS.contains(&tag))
    }
}

/// Keeps allowed tags (with a few safe attributes) and escapes everything
/// else that looks like markup.
pub fn clean(input: &str, profile: Profile) -> String {
    let without_blocks = BLOCKS.replace_all(input, "");
    let mut out = String::with_capacity(without_blocks.len());
    let mut last = 0;

    for caps in TAG.captures_iter(&without_blocks) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&escape_text(&without_blocks[last..whole.start()]));
        last = whole.end();

        let name = caps[2].to_ascii_lowercase();
        if !profile.allows(&name) {
            continue;
        }
        if &caps[1] == "/" {
            if !VOID_TAGS.contains(&name.as_str()) {
                out.push_str(&format!("</{}>", name));
            }
            continue;
        }
        out.push('<');
        out.push_str(&name);
        out.push_str(&safe_attributes(&name, &caps[3]));
        out.push('>');
    }
    out.push_str(&escape_text(&without_blocks[last..]));

    out.trim().to_string()
}

fn safe_attributes(tag: &str, raw: &str) -> String {
    let mut attrs = String::new();
    for caps in ATTR.captures_iter(raw) {
        let attr = caps[1].to_ascii_lowercase();
        let allowed = match tag {
            "a" => attr == "href" || attr == "title",
            "img" => attr == "src" || attr == "alt" || attr == "title",
            _ => false,
        };
        if !allowed {
            continue;
        }
        let value = attribute_value(&caps);
        if (attr == "href" || attr == "src") && !is_safe_url(value) {
            continue;
        }
        attrs.push_str(&format!(" {}=\"{}\"", attr, encode(value)));
    }
    attrs
}

fn attribute_value<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(2)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(4))
        .map_or("", |m| m.as_str())
}

fn is_safe_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || lower.starts_with('/')
        || lower.starts_with('#')
}

fn escape_text(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Encodes plain text for safe inclusion in HTML.
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_are_removed_with_their_body() {
        let cleaned = clean("<p>hi</p><script>alert(1)</script>", Profile::Full);
        assert_eq!(cleaned, "<p>hi</p>");
    }

    #[test]
    fn disallowed_tags_are_dropped_but_text_kept() {
        let cleaned = clean("<div onclick=\"x()\">hello <b>there</b></div>", Profile::Full);
        assert_eq!(cleaned, "hello <b>there</b>");
    }

    #[test]
    fn attributes_are_filtered() {
        let cleaned = clean(
            "<a href=\"https://example.com\" onclick=\"evil()\">link</a>",
            Profile::Default,
        );
        assert_eq!(cleaned, "<a href=\"https://example.com\">link</a>");
    }

    #[test]
    fn javascript_urls_are_dropped() {
        let cleaned = clean("<a href=\"javascript:alert(1)\">x</a>", Profile::Default);
        assert_eq!(cleaned, "<a>x</a>");
    }

    #[test]
    fn default_profile_rejects_images() {
        let cleaned = clean("<img src=\"/a.png\">", Profile::Default);
        assert_eq!(cleaned, "");
        let cleaned = clean("<img src=\"/a.png\" alt=\"a\">", Profile::Full);
        assert_eq!(cleaned, "<img src=\"/a.png\" alt=\"a\">");
    }

    #[test]
    fn stray_angle_brackets_are_escaped() {
        assert_eq!(clean("1 < 2 > 0", Profile::Full), "1 &lt; 2 &gt; 0");
    }

    #[test]
    fn encode_escapes_markup() {
        assert_eq!(encode("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
    }
}
