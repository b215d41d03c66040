//! HTML output stages.

use super::{Transform, TransformError};
use crate::build::{BuildContext, SourceFile};
use minify_html::Cfg;
use regex::Regex;
use std::sync::LazyLock;

/// Minify HTML: collapse whitespace, strip comments, minify inline CSS/JS.
pub fn minify_html(html: &[u8]) -> Vec<u8> {
    let mut cfg = Cfg::new();
    cfg.minify_css = true;
    cfg.minify_js = true;
    minify_html::minify(html, &cfg)
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<!--.*?-->|<[!?][^>]*>|</?[A-Za-z][A-Za-z0-9-]*(?:[^>"']|"[^"]*"|'[^']*')*>"#)
        .expect("BUG: invalid TAG_RE regex literal")
});

/// Elements without content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements that flow with surrounding text instead of starting a line.
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "br", "button", "cite", "code", "data", "del", "dfn", "em", "i",
    "img", "input", "ins", "kbd", "label", "mark", "q", "s", "samp", "select", "small", "span",
    "strong", "sub", "sup", "time", "u", "var", "wbr",
];

/// Elements whose content is copied verbatim.
const RAW_ELEMENTS: &[&str] = &["pre", "script", "style", "textarea"];

const INDENT: &str = "  ";

#[derive(Debug)]
enum Node {
    Text(String),
    /// Comments, doctypes and stray closing tags
    Markup(String),
    Element(Element),
}

#[derive(Debug)]
struct Element {
    name: String,
    open: String,
    children: Vec<Node>,
    /// Content of a raw element
    raw: Option<String>,
    close: Option<String>,
}

impl Element {
    fn new(name: String, open: &str) -> Self {
        Self { name, open: open.to_string(), children: Vec::new(), raw: None, close: None }
    }
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches(['<', '/'])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn append(stack: &mut [Element], root: &mut Vec<Node>, node: Node) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => root.push(node),
    }
}

fn close_top(stack: &mut Vec<Element>, root: &mut Vec<Node>, close: Option<String>) {
    if let Some(mut element) = stack.pop() {
        element.close = close;
        append(stack, root, Node::Element(element));
    }
}

/// Build a lenient element tree. Unclosed elements end at their parent's
/// closing tag or at the end of input.
fn parse(html: &str) -> Vec<Node> {
    let mut root = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut pos = 0;

    while let Some(m) = TAG_RE.find_at(html, pos) {
        if m.start() > pos {
            append(&mut stack, &mut root, Node::Text(html[pos..m.start()].to_string()));
        }
        let tag = m.as_str();
        pos = m.end();

        if tag.starts_with("<!") || tag.starts_with("<?") {
            append(&mut stack, &mut root, Node::Markup(tag.to_string()));
            continue;
        }

        let name = tag_name(tag);
        if tag.starts_with("</") {
            match stack.iter().rposition(|e| e.name == name) {
                Some(depth) => {
                    while stack.len() > depth + 1 {
                        close_top(&mut stack, &mut root, None);
                    }
                    close_top(&mut stack, &mut root, Some(tag.to_string()));
                }
                None => append(&mut stack, &mut root, Node::Markup(tag.to_string())),
            }
            continue;
        }

        let mut element = Element::new(name, tag);
        if VOID_ELEMENTS.contains(&element.name.as_str()) || tag.ends_with("/>") {
            append(&mut stack, &mut root, Node::Element(element));
        } else if RAW_ELEMENTS.contains(&element.name.as_str()) {
            let rest = &html[pos..];
            let closing = format!("</{}", element.name);
            match rest.to_ascii_lowercase().find(&closing) {
                Some(start) => {
                    let end = rest[start..].find('>').map_or(rest.len(), |i| start + i + 1);
                    element.raw = Some(rest[..start].to_string());
                    element.close = Some(rest[start..end].to_string());
                    pos += end;
                }
                None => {
                    element.raw = Some(rest.to_string());
                    pos = html.len();
                }
            }
            append(&mut stack, &mut root, Node::Element(element));
        } else {
            stack.push(element);
        }
    }

    if pos < html.len() {
        append(&mut stack, &mut root, Node::Text(html[pos..].to_string()));
    }
    while !stack.is_empty() {
        close_top(&mut stack, &mut root, None);
    }
    root
}

fn is_inline(node: &Node) -> bool {
    match node {
        Node::Text(_) => true,
        Node::Markup(_) => false,
        Node::Element(e) => {
            INLINE_ELEMENTS.contains(&e.name.as_str())
                && e.raw.is_none()
                && e.children.iter().all(is_inline)
        }
    }
}

fn write_inline(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) | Node::Markup(text) => out.push_str(text),
        Node::Element(e) => {
            out.push_str(&e.open);
            for child in &e.children {
                write_inline(child, out);
            }
            if let Some(close) = &e.close {
                out.push_str(close);
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn newlines(text: &str) -> usize {
    text.matches('\n').count()
}

/// Lays out sibling nodes one line per block, with inline runs joined.
struct Layout<'a> {
    out: &'a mut String,
    depth: usize,
    emitted: bool,
    /// Newlines in the source between the previous line and the next
    gap: usize,
    inline: String,
}

impl<'a> Layout<'a> {
    fn new(out: &'a mut String, depth: usize) -> Self {
        Self { out, depth, emitted: false, gap: 0, inline: String::new() }
    }

    fn start_line(&mut self) {
        if self.emitted && self.gap > 1 {
            self.out.push('\n');
        }
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.emitted = true;
        self.gap = 0;
    }

    fn flush(&mut self) {
        let buffered = std::mem::take(&mut self.inline);
        let content = buffered.trim();
        if content.is_empty() {
            self.gap += newlines(&buffered);
            return;
        }
        self.gap += newlines(&buffered[..buffered.len() - buffered.trim_start().len()]);
        self.start_line();
        self.out.push_str(&collapse_whitespace(content));
        self.out.push('\n');
        self.gap = newlines(&buffered[buffered.trim_end().len()..]);
    }

    fn children(mut self, nodes: &[Node]) {
        for node in nodes {
            if is_inline(node) {
                write_inline(node, &mut self.inline);
            } else {
                self.flush();
                self.block(node);
            }
        }
        self.flush();
    }

    fn block(&mut self, node: &Node) {
        self.start_line();
        match node {
            Node::Text(text) | Node::Markup(text) => self.out.push_str(text.trim()),
            Node::Element(e) => {
                self.out.push_str(&e.open);
                if let Some(raw) = &e.raw {
                    self.out.push_str(raw);
                } else if e.children.iter().all(is_inline) {
                    let mut content = String::new();
                    e.children.iter().for_each(|child| write_inline(child, &mut content));
                    self.out.push_str(&collapse_whitespace(&content));
                } else {
                    self.out.push('\n');
                    Layout::new(&mut *self.out, self.depth + 1).children(&e.children);
                    if e.close.is_none() {
                        return;
                    }
                    for _ in 0..self.depth {
                        self.out.push_str(INDENT);
                    }
                }
                if let Some(close) = &e.close {
                    self.out.push_str(close);
                }
            }
        }
        self.out.push('\n');
    }
}

/// Pretty-print HTML for development.
///
/// Block elements go on their own line, indented two spaces per nesting
/// level; runs of text and inline elements share a line. Contents of
/// `pre`, `script`, `style` and `textarea` are kept verbatim. Blank lines
/// between blocks collapse to one.
pub fn tidy_html(html: &str) -> String {
    let nodes = parse(html);
    let mut out = String::with_capacity(html.len());
    Layout::new(&mut out, 0).children(&nodes);
    out
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MinifyHtml;

impl Transform for MinifyHtml {
    fn name(&self) -> &'static str {
        "htmlmin"
    }

    fn apply(&self, mut file: SourceFile, _ctx: &BuildContext) -> Result<SourceFile, TransformError> {
        file.contents = minify_html(&file.contents);
        Ok(file)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TidyHtml;

impl Transform for TidyHtml {
    fn name(&self) -> &'static str {
        "tidy"
    }

    fn apply(&self, mut file: SourceFile, _ctx: &BuildContext) -> Result<SourceFile, TransformError> {
        file.contents = tidy_html(file.text()?).into_bytes();
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minify_html_strips_comments_and_whitespace() {
        let html = b"<!DOCTYPE html>\n<html>\n  <body>\n    <!-- note -->\n    <p>  Hello   world </p>\n    <style>a { color: red; }</style>\n  </body>\n</html>\n";
        let out = String::from_utf8(minify_html(html)).unwrap();
        assert!(!out.contains("<!--"));
        assert!(!out.contains("\n"));
        assert!(out.contains("Hello world"));
        assert!(out.contains("a{color:red}"));
    }

    #[test]
    fn test_tidy_indents_nested_elements() {
        let html = "<html><head><title>x</title></head><body><div><p>a</p></div></body></html>";
        assert_eq!(
            tidy_html(html),
            "<html>\n  <head>\n    <title>x</title>\n  </head>\n  <body>\n    <div>\n      <p>a</p>\n    </div>\n  </body>\n</html>\n"
        );
    }

    #[test]
    fn test_tidy_keeps_void_and_comment_lines() {
        let html = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><!-- build:css a.css --><link rel=\"stylesheet\" href=\"a.css\"><!-- endbuild --></head></html>";
        assert_eq!(
            tidy_html(html),
            "<!DOCTYPE html>\n<html>\n  <head>\n    <meta charset=\"utf-8\">\n    <!-- build:css a.css -->\n    <link rel=\"stylesheet\" href=\"a.css\">\n    <!-- endbuild -->\n  </head>\n</html>\n"
        );
    }

    #[test]
    fn test_tidy_joins_inline_content() {
        assert_eq!(tidy_html("<p>Hello  <b>big</b>\n world</p>"), "<p>Hello <b>big</b> world</p>\n");
        assert_eq!(
            tidy_html("<div>text<p>a</p>more</div>"),
            "<div>\n  text\n  <p>a</p>\n  more\n</div>\n"
        );
    }

    #[test]
    fn test_tidy_preserves_raw_content() {
        let html = "<body><pre>  keep\n    this</pre><script>if (a) {\n  b();\n}</script></body>";
        assert_eq!(
            tidy_html(html),
            "<body>\n  <pre>  keep\n    this</pre>\n  <script>if (a) {\n  b();\n}</script>\n</body>\n"
        );
    }

    #[test]
    fn test_tidy_collapses_blank_lines() {
        let html = "\n\n<ul>\n<li>a</li>\n\n\n\n<li>b</li>   \n</ul>\n\n\n";
        assert_eq!(tidy_html(html), "<ul>\n  <li>a</li>\n\n  <li>b</li>\n</ul>\n");
    }

    #[test]
    fn test_tidy_is_stable() {
        let once = tidy_html("<div><p>a</p>\n\n\n<p>b <em>c</em></p>  </div>\n<footer>d</footer>");
        assert_eq!(tidy_html(&once), once);
    }
}
