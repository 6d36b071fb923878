//! Compiles stored markup into the HTML cached next to it.

use indexmap::IndexMap;
use pulldown_cmark::{Options, Parser};
use serde::Serialize;

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct Html(pub String);

/// Markup dialect stored with a post or page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Markdown,
    Rest,
    /// Any other stored value; compiled text passes through untouched.
    Plain,
}

impl Format {
    pub fn from_value(value: &str) -> Self {
        match value {
            "markdown" => Format::Markdown,
            "rest" => Format::Rest,
            _ => Format::Plain,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MarkupError {
    #[error("could not parse reStructuredText: {0}")]
    Rest(String),
}

pub fn compile(format: Format, text: &str) -> Result<Html, MarkupError> {
    match format {
        Format::Markdown => Ok(Html(markdown_to_html(text))),
        Format::Rest => rest_to_html(text).map(Html),
        Format::Plain => Ok(Html(text.to_string())),
    }
}

fn markdown_to_html(text: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, Parser::new_ext(text, options));
    html
}

/// Browser forms send CRLF line endings and often trailing blank lines; the
/// reST parser wants `\n` and exactly one final newline.
fn normalize_lines(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    format!("{}\n", text.trim_end())
}

/// Renders only the document body; no html, head or stylesheet wrapper.
fn rest_to_html(text: &str) -> Result<String, MarkupError> {
    if text.trim().is_empty() {
        return Ok(String::new());
    }

    let text = normalize_lines(text);
    let document = rst_parser::parse(&text).map_err(|err| MarkupError::Rest(err.to_string()))?;

    let mut html = Vec::new();
    rst_renderer::render_html(&document, &mut html, false)
        .map_err(|err| MarkupError::Rest(err.to_string()))?;

    String::from_utf8(html).map_err(|err| MarkupError::Rest(err.to_string()))
}

/// Literal placeholder substitution, applied in table order.
pub fn substitute(text: &str, replacements: &IndexMap<String, String>) -> String {
    replacements
        .iter()
        .filter(|(placeholder, _)| !placeholder.is_empty())
        .fold(text.to_string(), |text, (placeholder, replacement)| {
            text.replace(placeholder.as_str(), replacement)
        })
}

/// Cached HTML for one post or page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compiled {
    pub summary_html: Option<Html>,
    pub content_html: Html,
}

/// Substitutes placeholders in summary and content independently, then
/// compiles both.
pub fn compile_entry(
    format: Format,
    summary: Option<&str>,
    content: &str,
    replacements: &IndexMap<String, String>,
) -> Result<Compiled, MarkupError> {
    let summary_html = summary
        .map(|summary| compile(format, &substitute(summary, replacements)))
        .transpose()?;

    Ok(Compiled {
        summary_html,
        content_html: compile(format, &substitute(content, replacements))?,
    })
}

/// Cuts `content` at a word boundary after at most `length` characters.
pub fn summarize(content: &str, length: usize, suffix: &str) -> String {
    if content.chars().count() <= length {
        return content.to_string();
    }

    let head: String = content.chars().take(length + 1).collect();
    let cut = head.rsplit_once(' ').map_or(head.as_str(), |(before, _)| before);
    format!("{}{}", cut, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_bold() {
        let html = compile(Format::Markdown, "**bold**").unwrap();
        assert!(html.0.contains("<strong>bold</strong>"), "{}", html.0);
    }

    #[test]
    fn rest_is_a_fragment() {
        let html = compile(Format::Rest, "Simple body text.").unwrap();
        assert!(html.0.contains("<p>Simple body text.</p>"), "{}", html.0);
        assert!(!html.0.contains("<html"));
        assert!(!html.0.contains("<head"));
        assert!(!html.0.contains("<title"));
    }

    #[test]
    fn rest_inline_markup() {
        let html = compile(Format::Rest, "Some *emph* and **strong**").unwrap();
        assert!(html.0.contains("<em>emph</em>"));
        assert!(html.0.contains("<strong>strong</strong>"));
    }

    #[test]
    fn rest_from_a_form() {
        let html = compile(Format::Rest, "Body text.\n\n").unwrap();
        assert!(html.0.contains("<p>Body text.</p>"), "{}", html.0);

        let html = compile(Format::Rest, "* one\r\n* two").unwrap();
        assert!(html.0.contains("one"), "{}", html.0);
        assert!(html.0.contains("two"), "{}", html.0);
        assert!(!html.0.contains('\r'));

        let html = compile(Format::Rest, "Title\r\n=====\r\n\r\nBody text.").unwrap();
        assert!(html.0.contains("id=\"title\""), "{}", html.0);
        assert!(!html.0.contains('\r'));
    }

    #[test]
    fn line_endings_are_normalized() {
        assert_eq!(normalize_lines("a\r\nb\rc\n\n \n"), "a\nb\nc\n");
        assert_eq!(normalize_lines("a"), "a\n");
    }

    #[test]
    fn empty_rest_is_empty() {
        assert_eq!(compile(Format::Rest, "  \n").unwrap(), Html::default());
    }

    #[test]
    fn unknown_format_passes_through() {
        let text = "<b>already html</b> **not markdown**";
        assert_eq!(compile(Format::from_value("html"), text).unwrap().0, text);
    }

    #[test]
    fn format_values() {
        assert_eq!(Format::from_value("markdown"), Format::Markdown);
        assert_eq!(Format::from_value("rest"), Format::Rest);
        assert_eq!(Format::from_value("Markdown"), Format::Plain);
    }

    #[test]
    fn placeholders_are_replaced_before_compiling() {
        let mut replacements = IndexMap::new();
        replacements.insert("##UPLOADS##".to_string(), "https://example.org/uploads".to_string());
        replacements.insert(String::new(), "ignored".to_string());

        let compiled = compile_entry(
            Format::Markdown,
            Some("see ##UPLOADS##/a.png"),
            "![img](##UPLOADS##/b.png)",
            &replacements,
        )
        .unwrap();

        let summary = compiled.summary_html.unwrap().0;
        assert!(summary.contains("https://example.org/uploads/a.png"));
        assert!(compiled
            .content_html
            .0
            .contains("src=\"https://example.org/uploads/b.png\""));
        assert!(!summary.contains("ignored"));
    }

    #[test]
    fn missing_summary_stays_missing() {
        let compiled = compile_entry(Format::Markdown, None, "text", &IndexMap::new()).unwrap();
        assert_eq!(compiled.summary_html, None);
    }

    #[test]
    fn summarize_short_text_is_untouched() {
        assert_eq!(summarize("short text", 250, "..."), "short text");
    }

    #[test]
    fn summarize_cuts_at_word_boundary() {
        assert_eq!(summarize("one two three four", 9, "..."), "one two...");
        assert_eq!(summarize("abcdefghij", 4, "..."), "abcde...");
    }
}
