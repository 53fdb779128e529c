//! HTML → markdown and HTML → plain text.
use htmd::options::{CodeBlockStyle, HeadingStyle, Options};
use htmd::{Element, HtmlToMarkdown};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::debug;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<]+?>").expect("valid tag regex"));
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Punctuation htmd escapes in text that the block compiler must see bare.
/// `\\`, `*`, `_` and backticks stay escaped.
const UNESCAPED: &[char] = &['[', ']', '#', '-', '+', '.', '!', '=', '~', '>'];

fn converter() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .options(Options {
            heading_style: HeadingStyle::Atx,
            code_block_style: CodeBlockStyle::Fenced,
            ..Default::default()
        })
        .skip_tags(vec!["img", "script", "style", "iframe", "noscript", "svg"])
        // a spaced rule (`* * *`, `- - -`) would read as a list item
        .add_handler(vec!["hr"], |_: Element| Some("\n\n---\n\n".to_string()))
        .build()
}

/// Convert an HTML fragment to markdown with ATX headings and fenced code.
///
/// Images are dropped. Returns `None` when conversion fails or the result is
/// blank, so callers can move on to their next candidate.
pub fn html_to_markdown(html: &str) -> Option<String> {
    if html.trim().is_empty() {
        return None;
    }
    match converter().convert(html) {
        Ok(md) => {
            let md = unescape_punctuation(md.trim());
            (!md.is_empty()).then_some(md)
        }
        Err(err) => {
            debug!(error = %err, "html to markdown conversion failed");
            None
        }
    }
}

/// Drop htmd's backslash escapes of [`UNESCAPED`] characters outside code.
fn unescape_punctuation(md: &str) -> String {
    let mut out = String::with_capacity(md.len());
    let mut in_fence = false;
    for line in md.split_inclusive('\n') {
        let fence = line.trim_start().starts_with("```");
        if fence {
            in_fence = !in_fence;
        }
        if fence || in_fence {
            out.push_str(line);
            continue;
        }
        let mut in_span = false;
        let mut chars = line.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '`' => {
                    in_span = !in_span;
                    out.push(ch);
                }
                '\\' if !in_span => match chars.next() {
                    Some(next) if UNESCAPED.contains(&next) => out.push(next),
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => out.push('\\'),
                },
                _ => out.push(ch),
            }
        }
    }
    out
}

/// Visible text of an HTML fragment, whitespace collapsed to single spaces.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let text = if text.is_empty() {
        TAG_RE.replace_all(html, "").into_owned()
    } else {
        text
    };
    SPACES_RE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_are_atx() {
        let md = html_to_markdown("<h1>Title</h1><h2>Sub</h2><p>Body text.</p>").unwrap();
        assert!(md.starts_with("# Title"), "{md}");
        assert!(md.contains("## Sub"), "{md}");
        assert!(md.contains("Body text."));
    }

    #[test]
    fn images_are_stripped() {
        let md = html_to_markdown(r#"<p>a <img src="https://x/y.png" alt="pic"> b</p>"#).unwrap();
        assert!(!md.contains("y.png"), "{md}");
        assert!(!md.contains("!["), "{md}");
    }

    #[test]
    fn blank_input_yields_nothing() {
        assert_eq!(html_to_markdown(""), None);
        assert_eq!(html_to_markdown("   "), None);
        assert_eq!(html_to_markdown("<div>  </div>"), None);
    }

    #[test]
    fn pre_code_becomes_fenced_block() {
        let md = html_to_markdown("<pre><code>fn main() {}\n</code></pre>").unwrap();
        assert!(md.contains("```"), "{md}");
        assert!(md.contains("fn main() {}"));
    }

    #[test]
    fn horizontal_rule_is_a_plain_dash_line() {
        let md = html_to_markdown("<p>before</p><hr><p>after</p>").unwrap();
        assert!(md.lines().any(|l| l.trim() == "---"), "{md}");
        assert!(!md.contains("* *"), "{md}");
    }

    #[test]
    fn structural_punctuation_is_not_escaped() {
        let md = html_to_markdown("<p>see [1] and 2. things</p><p>1. not ordered</p>").unwrap();
        assert!(md.contains("see [1] and 2. things"), "{md}");
        assert!(md.contains("1. not ordered"), "{md}");
        assert!(!md.contains('\\'), "{md}");
    }

    #[test]
    fn emphasis_markers_and_backslashes_stay_escaped() {
        assert_eq!(unescape_punctuation(r"a \* b \\ c \_ d"), r"a \* b \\ c \_ d");
        assert_eq!(unescape_punctuation(r"\[x\] \\[y"), r"[x] \\[y");
    }

    #[test]
    fn code_is_left_verbatim() {
        let md = "text \\[a\\]\n```\nlet s = \"\\[\";\n```\n`\\[b`";
        assert_eq!(
            unescape_punctuation(md),
            "text [a]\n```\nlet s = \"\\[\";\n```\n`\\[b`"
        );
    }

    #[test]
    fn text_extraction_collapses_whitespace() {
        let text = html_to_text("<p>Hello\n   <b>big</b>   world</p><p>again</p>");
        assert_eq!(text, "Hello big world again");
    }

    #[test]
    fn text_of_plain_string() {
        assert_eq!(html_to_text("  plain   words "), "plain words");
        assert_eq!(html_to_text(""), "");
    }
}
