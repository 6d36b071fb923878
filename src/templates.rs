//! Template loading. Every application ships with built-in templates; a
//! configured theme directory may replace any of them by providing a file
//! of the same name under `<theme_dir>/templates/`.

use std::collections::HashMap;

use tera::{Tera, Value};

use crate::config::ValidPath;
use crate::markup;

const BUILTIN: &[(&str, &str)] = &[
    ("admin/base.html", include_str!("../templates/admin/base.html")),
    ("admin/login.html", include_str!("../templates/admin/login.html")),
    ("admin/index.html", include_str!("../templates/admin/index.html")),
    ("admin/edit.html", include_str!("../templates/admin/edit.html")),
    ("frontend/base.html", include_str!("../templates/frontend/base.html")),
    ("frontend/post_list.html", include_str!("../templates/frontend/post_list.html")),
    ("frontend/post.html", include_str!("../templates/frontend/post.html")),
    ("frontend/page.html", include_str!("../templates/frontend/page.html")),
];

pub fn load(theme_dir: Option<&ValidPath>) -> Result<Tera, tera::Error> {
    let mut builtin = Tera::default();
    builtin.add_raw_templates(BUILTIN.iter().copied())?;

    let mut tera = match theme_dir {
        Some(theme_dir) => {
            let glob = theme_dir.join("templates").join("**").join("*.html");
            // a theme template may extend a built-in one, so chains are
            // built only after both sets are loaded
            let mut themed = Tera::parse(&glob.to_string_lossy())?;
            themed.extend(&builtin)?;
            themed.build_inheritance_chains()?;
            tracing::info!("loaded theme templates from {}", theme_dir.display());
            themed
        }
        None => builtin,
    };

    tera.register_filter("summarize", summarize);
    tera.set_escape_fn(escape_html);
    Ok(tera)
}

/// Tera's default escaper, minus the `&#x2F;` for `/`, so paths in the
/// rendered HTML read the same as the routes that serve them.
fn escape_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#x27;"),
            _ => output.push(c),
        }
    }
    output
}

/// `{{ content | summarize(length=250, suffix="...") }}`
fn summarize(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let content = tera::try_get_value!("summarize", "value", String, value);
    let length = match args.get("length") {
        Some(length) => tera::try_get_value!("summarize", "length", usize, length),
        None => 250,
    };
    let suffix = match args.get("suffix") {
        Some(suffix) => tera::try_get_value!("summarize", "suffix", String, suffix),
        None => "...".to_string(),
    };

    Ok(Value::String(markup::summarize(&content, length, &suffix)))
}
