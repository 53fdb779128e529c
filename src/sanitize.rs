//! Pre-conversion HTML cleanup.
use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use tracing::debug;

/// Strip executable and embedded content before markdown conversion.
///
/// - `script`, `style` and `iframe` elements are removed with their content.
/// - `img` elements with a `data:` source become `[Image: <alt>]`, or are
///   dropped when they carry no alt text. Other images are left alone.
///
/// Never fails: if the rewriter errors the input is returned unchanged.
pub fn clean_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let result = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script, style, iframe", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("img", |el| {
                    let is_inline = el
                        .get_attribute("src")
                        .map(|src| src.trim_start().starts_with("data:"))
                        .unwrap_or(false);
                    if !is_inline {
                        return Ok(());
                    }
                    match el.get_attribute("alt").filter(|alt| !alt.trim().is_empty()) {
                        Some(alt) => el.replace(&format!("[Image: {alt}]"), ContentType::Text),
                        None => el.remove(),
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    );

    match result {
        Ok(cleaned) => cleaned,
        Err(err) => {
            debug!(error = %err, "html sanitizer failed; keeping original");
            html.to_string()
        }
    }
}
