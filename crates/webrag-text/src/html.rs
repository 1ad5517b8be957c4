use scraper::{ElementRef, Html, Selector};

/// Elements whose content never reaches the extracted text.
const SKIPPED: &[&str] = &["head", "script", "style", "noscript", "template", "svg", "iframe"];

/// Elements rendered as their own paragraph.
const BLOCKS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "nav", "aside", "blockquote",
    "pre", "table", "ul", "ol", "dl", "figure", "figcaption", "h1", "h2", "h3", "h4", "h5", "h6",
    "hr", "form",
];

/// Elements that end a line but not a paragraph.
const LINES: &[&str] = &["br", "li", "tr", "dt", "dd"];

/// Convert an HTML page into plain text.
///
/// Block elements become paragraphs separated by a blank line, list items
/// and table rows become lines, and whitespace inside text runs is
/// collapsed. The page title, when present, is the first paragraph.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut raw = String::new();

    if let Ok(title_sel) = Selector::parse("title") {
        if let Some(title) = doc.select(&title_sel).next() {
            raw.push_str(&title.text().collect::<String>());
            raw.push_str("\n\n");
        }
    }
    walk(doc.root_element(), &mut raw);
    normalize(&raw)
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            push_collapsed(out, text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if SKIPPED.contains(&name) {
                continue;
            }
            let block = BLOCKS.contains(&name);
            let line = LINES.contains(&name);
            if block {
                out.push_str("\n\n");
            }
            walk(child_el, out);
            if block {
                out.push_str("\n\n");
            } else if line {
                out.push('\n');
            }
        }
    }
}

fn push_collapsed(out: &mut String, text: &str) {
    if text.trim().is_empty() {
        if !text.is_empty() {
            out.push(' ');
        }
        return;
    }
    if text.starts_with(char::is_whitespace) {
        out.push(' ');
    }
    out.push_str(&text.split_whitespace().collect::<Vec<_>>().join(" "));
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

/// Trim every line, collapse inner spaces and keep at most one blank line
/// between non-empty lines.
fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = false;
    for line in raw.split('\n') {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = false;
    }
    out
}
