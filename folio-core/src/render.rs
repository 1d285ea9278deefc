//! Renderer collaborator: raw source → displayable form.
//!
//! The revision log never inspects rendered output; it only guarantees that the
//! raw text handed to the renderer is exactly what was committed.

/// Turns reconstructed raw source into the form returned to presentation layers.
pub trait Renderer: Send + Sync {
    fn render(&self, raw: &str) -> String;
}

impl<F> Renderer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn render(&self, raw: &str) -> String {
        self(raw)
    }
}

/// Passes raw content through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainRenderer;

impl Renderer for PlainRenderer {
    fn render(&self, raw: &str) -> String {
        raw.to_owned()
    }
}

/// Markdown → HTML via comrak, with the GitHub-flavoured extensions posts use.
#[derive(Clone, Copy, Debug)]
pub struct MarkdownRenderer {
    /// Emit raw HTML blocks from the source instead of escaping them.
    pub allow_raw_html: bool,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self {
            allow_raw_html: true,
        }
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer that escapes embedded HTML.
    pub fn escaped() -> Self {
        Self {
            allow_raw_html: false,
        }
    }
}

impl Renderer for MarkdownRenderer {
    fn render(&self, raw: &str) -> String {
        let mut options = comrak::Options::default();
        options.extension.strikethrough = true;
        options.extension.table = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;
        options.render.r#unsafe = self.allow_raw_html;
        comrak::markdown_to_html(raw, &options)
    }
}
