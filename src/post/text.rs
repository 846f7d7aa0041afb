use scraper::{ElementRef, Html, Node};

/// How anchor elements are rendered into plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkText {
    /// Keep the visible label.
    Label,
    /// Replace the label with the href target, so URLs survive tag stripping.
    Href,
    /// Like `Href`, but mention and hashtag links keep their `@name` / `#tag` label.
    HrefExceptTags,
}

/// Render an HTML fragment as plain text.
///
/// Line breaks come from `<br>` and block elements; whitespace inside text runs
/// is collapsed, entities are decoded, lines are trimmed and blank lines dropped.
#[must_use]
pub fn html_to_text(html: &str, links: LinkText) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    render(fragment.root_element(), links, &mut out);
    collapse_lines(&out)
}

fn render(element: ElementRef<'_>, links: LinkText, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_collapsed(out, text),
            Node::Element(el) => {
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = el.name();
                match name {
                    "br" => {
                        out.push('\n');
                        continue;
                    }
                    "script" | "style" => continue,
                    "a" if links != LinkText::Label => {
                        let keep_label =
                            links == LinkText::HrefExceptTags && is_tag_link(child_element);
                        if let Some(href) = el.attr("href").and_then(usable_href) {
                            if !keep_label {
                                out.push_str(href);
                                continue;
                            }
                        }
                    }
                    _ => {}
                }

                let block = is_block(name);
                if block {
                    out.push('\n');
                }
                render(child_element, links, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn usable_href(href: &str) -> Option<&str> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        None
    } else {
        Some(href)
    }
}

/// Mention or hashtag anchor, recognised by its visible label.
fn is_tag_link(anchor: ElementRef<'_>) -> bool {
    let label: String = anchor.text().collect();
    label.trim_start().starts_with(['@', '#'])
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "li" | "ul" | "ol" | "blockquote" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

fn push_collapsed(out: &mut String, text: &str) {
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() && !out.ends_with(['\n', ' ']) {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        }
    }
    if pending_space && !out.is_empty() && !out.ends_with(['\n', ' ']) {
        out.push(' ');
    }
}

fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
