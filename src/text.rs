use scraper::{Html, Node};

const BLOCK_TAGS: &[&str] = &["p", "br", "div", "li", "blockquote", "pre", "h1", "h2", "h3"];

/// Plain text of an HTML snippet. The snippet is parsed as a fragment and only
/// its text nodes are kept, so tags never reach the output.
pub fn strip_markup(html: &str) -> String {
    let fragment = Html::parse_fragment(html);

    let mut text = String::with_capacity(html.len());
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(el) if BLOCK_TAGS.contains(&el.name()) => text.push(' '),
            _ => {}
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Cuts `text` to at most `max_chars` characters, ending with an ellipsis when
/// anything was removed.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let kept: String = text.chars().take(max_chars - 1).collect();
    format!("{}…", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_from_post_content() {
        let html = r#"<p>New <a href="https://example.com/tags/umbraco" class="hashtag">#<span>umbraco</span></a> release!</p><p>Go &amp; see</p>"#;
        let text = strip_markup(html);
        assert_eq!(text, "New #umbraco release! Go & see");
        assert!(!text.contains('<'));
    }

    #[test]
    fn script_content_is_not_markup() {
        let text = strip_markup("<script>alert(1)</script><img src=x onerror=alert(2)>hi");
        assert!(!text.contains("<img"));
        assert!(!text.contains("<script"));
        assert!(text.ends_with("hi"));
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_xml(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ÆØÅ æøå abc", 5), "ÆØÅ…");
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 0), "");
    }
}
