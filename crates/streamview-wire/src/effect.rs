//! Queued side effects produced by event handling.

/// Statement appended to scripts so the tag removes itself after running.
const SELF_REMOVE: &str = "document.currentScript.remove()";

/// A pending command for the browser, flushed in queue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Replace the element matched by `selector` with `markup`.
    Patch {
        /// CSS selector of the target element.
        selector: String,
        /// Replacement markup (outer HTML).
        markup: String,
    },
    /// Run `source` in the page.
    Script {
        /// JavaScript source.
        source: String,
        /// Tag attributes and self-removal behavior.
        options: ScriptOptions,
    },
}

impl Effect {
    /// Shorthand for [`Effect::Patch`].
    pub fn patch(selector: impl Into<String>, markup: impl Into<String>) -> Self {
        Self::Patch {
            selector: selector.into(),
            markup: markup.into(),
        }
    }

    /// Shorthand for a self-removing [`Effect::Script`].
    pub fn script(source: impl Into<String>) -> Self {
        Self::Script {
            source: source.into(),
            options: ScriptOptions::default(),
        }
    }
}

/// Options for script effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    /// Append a statement removing the `<script>` tag once it has run.
    pub auto_remove: bool,
    /// Extra attributes on the `<script>` tag, e.g. `("type", "module")`.
    pub attributes: Vec<(String, String)>,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            auto_remove: true,
            attributes: Vec::new(),
        }
    }
}

impl ScriptOptions {
    /// Keep the tag in the document after it runs.
    #[must_use]
    pub fn keep(mut self) -> Self {
        self.auto_remove = false;
        self
    }

    /// Add a tag attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }
}

/// Wrap script source in a `<script>` tag according to `options`.
pub fn script_tag(source: &str, options: &ScriptOptions) -> String {
    let mut tag = String::from("<script");
    for (name, value) in &options.attributes {
        tag.push(' ');
        tag.push_str(name);
        tag.push_str("=\"");
        tag.push_str(&escape_attr(value));
        tag.push('"');
    }
    tag.push('>');

    let body = source.trim_end();
    if options.auto_remove {
        let body = body.trim_end_matches(';');
        if !body.is_empty() {
            // A trailing line comment in `body` must not swallow the removal.
            tag.push_str(body);
            tag.push_str(";\n");
        }
        tag.push_str(SELF_REMOVE);
    } else {
        tag.push_str(body);
    }

    tag.push_str("</script>");
    tag
}

/// Escape a value for use inside a double-quoted HTML attribute.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
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
