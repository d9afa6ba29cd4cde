//! Markdown-to-HTML rendering for bot replies.
//!
//! Rendering runs in four stages:
//! - entity references in the raw text are decoded to literal characters
//! - syntax outside the supported subset is escaped line by line
//! - pulldown-cmark events are folded into a small block/inline tree
//! - the tree is written out as compact HTML
//!
//! The supported subset is bold, italic, `#`..`###` headings, paragraphs with
//! `<br>` line breaks and bullet/numbered list items. Both list kinds render as
//! `<li>` inside a single `<ul>` per contiguous run. Inline links are kept when
//! they point at `http`, `https` or `mailto`.

pub mod entities;
mod subset;

use pulldown_cmark::{ Event, HeadingLevel, Parser, Tag, TagEnd };
use url::Url;

pub use self::entities::decode_entities;
use self::subset::restrict_to_subset;

const LINK_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Inline {
    Text(String),
    Strong(Vec<Inline>),
    Emphasis(Vec<Inline>),
    Link {
        href: String,
        children: Vec<Inline>,
    },
    LineBreak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Heading {
        level: u8,
        inlines: Vec<Inline>,
    },
    Paragraph(Vec<Inline>),
    /// Each item holds its own blocks.
    List(Vec<Vec<Block>>),
}

#[derive(Debug, Clone, Copy)]
enum Leaf {
    Paragraph,
    Heading(u8),
}

#[derive(Debug)]
enum InlineKind {
    Root,
    Strong,
    Emphasis,
    Link(String),
}

#[derive(Debug)]
enum Container {
    Root(Vec<Block>),
    List(Vec<Vec<Block>>),
    Item(Vec<Block>),
}

/// Folds the parser's event stream into a block tree.
struct TreeBuilder {
    containers: Vec<Container>,
    leaf: Option<Leaf>,
    inlines: Vec<(InlineKind, Vec<Inline>)>,
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        _ => 3,
    }
}

fn is_allowed_link(href: &str) -> bool {
    Url::parse(href).is_ok_and(|url| LINK_SCHEMES.contains(&url.scheme()))
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            containers: vec![Container::Root(Vec::new())],
            leaf: None,
            inlines: Vec::new(),
        }
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.push_text(&text),
            // Raw HTML from the model is shown as text, never injected.
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(&html),
            Event::SoftBreak | Event::HardBreak => self.push_inline(Inline::LineBreak),
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.open_leaf(Leaf::Paragraph),
            Tag::Heading { level, .. } => self.open_leaf(Leaf::Heading(heading_level(level))),
            Tag::List(_) => {
                self.close_leaf();
                self.containers.push(Container::List(Vec::new()));
            }
            Tag::Item => {
                self.close_leaf();
                self.containers.push(Container::Item(Vec::new()));
            }
            Tag::Strong => self.open_inline(InlineKind::Strong),
            Tag::Emphasis => self.open_inline(InlineKind::Emphasis),
            Tag::Link { dest_url, .. } => self.open_inline(InlineKind::Link(dest_url.into_string())),
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) => self.close_leaf(),
            TagEnd::Item => {
                self.close_leaf();
                if let Some(Container::Item(blocks)) = self.pop_container() {
                    if let Some(Container::List(items)) = self.containers.last_mut() {
                        items.push(blocks);
                    }
                }
            }
            TagEnd::List(_) => {
                self.close_leaf();
                if let Some(Container::List(items)) = self.pop_container() {
                    self.push_block(Block::List(items));
                }
            }
            TagEnd::Strong | TagEnd::Emphasis | TagEnd::Link => self.close_inline(),
            _ => {}
        }
    }

    fn pop_container(&mut self) -> Option<Container> {
        if self.containers.len() > 1 { self.containers.pop() } else { None }
    }

    fn open_leaf(&mut self, leaf: Leaf) {
        self.close_leaf();
        self.leaf = Some(leaf);
        self.inlines.push((InlineKind::Root, Vec::new()));
    }

    fn open_inline(&mut self, kind: InlineKind) {
        if self.leaf.is_none() {
            self.open_leaf(Leaf::Paragraph);
        }
        self.inlines.push((kind, Vec::new()));
    }

    fn close_inline(&mut self) {
        if self.inlines.len() < 2 {
            return;
        }
        if let Some((kind, children)) = self.inlines.pop() {
            let node = match kind {
                InlineKind::Strong => Inline::Strong(children),
                InlineKind::Emphasis => Inline::Emphasis(children),
                InlineKind::Link(href) if is_allowed_link(&href) => Inline::Link { href, children },
                // Other schemes (javascript:, data:, relative paths) keep only their text.
                InlineKind::Link(_) => {
                    for child in children {
                        self.push_inline(child);
                    }
                    return;
                }
                InlineKind::Root => return,
            };
            self.push_inline(node);
        }
    }

    /// Text outside any leaf (tight list items) opens an implicit paragraph.
    fn push_inline(&mut self, node: Inline) {
        if self.leaf.is_none() {
            self.open_leaf(Leaf::Paragraph);
        }
        let Some((_, children)) = self.inlines.last_mut() else {
            return;
        };
        if let Inline::Text(next) = &node {
            if let Some(Inline::Text(prev)) = children.last_mut() {
                prev.push_str(next);
                return;
            }
        }
        children.push(node);
    }

    fn push_text(&mut self, text: &str) {
        let mut lines = text.split('\n').peekable();
        while let Some(line) = lines.next() {
            if !line.is_empty() {
                self.push_inline(Inline::Text(line.to_string()));
            }
            if lines.peek().is_some_and(|next| !next.is_empty()) {
                self.push_inline(Inline::LineBreak);
            }
        }
    }

    fn close_leaf(&mut self) {
        let Some(leaf) = self.leaf else {
            return;
        };
        while self.inlines.len() > 1 {
            self.close_inline();
        }
        self.leaf = None;
        let mut inlines = self.inlines
            .pop()
            .map(|(_, children)| children)
            .unwrap_or_default();
        while matches!(inlines.last(), Some(Inline::LineBreak)) {
            inlines.pop();
        }

        let block = match leaf {
            Leaf::Paragraph => Block::Paragraph(inlines),
            Leaf::Heading(level) => Block::Heading { level, inlines },
        };
        self.push_block(block);
    }

    /// Adjacent lists, whatever their marker, merge into one run.
    fn push_block(&mut self, block: Block) {
        let blocks = match self.containers.last_mut() {
            Some(Container::Root(blocks)) | Some(Container::Item(blocks)) => blocks,
            Some(Container::List(items)) => {
                items.push(vec![block]);
                return;
            }
            None => {
                return;
            }
        };
        if let Block::List(items) = block {
            if let Some(Block::List(run)) = blocks.last_mut() {
                run.extend(items);
                return;
            }
            blocks.push(Block::List(items));
        } else {
            blocks.push(block);
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.close_leaf();
        while self.containers.len() > 1 {
            match self.containers.pop() {
                Some(Container::Item(blocks)) => {
                    if let Some(Container::List(items)) = self.containers.last_mut() {
                        items.push(blocks);
                    }
                }
                Some(Container::List(items)) => self.push_block(Block::List(items)),
                _ => {}
            }
        }
        match self.containers.pop() {
            Some(Container::Root(blocks)) => blocks,
            _ => Vec::new(),
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '"' => out.push_str("&quot;"),
            _ => escape_text(c.encode_utf8(&mut [0; 4]), out),
        }
    }
}

fn write_inlines(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => escape_text(text, out),
            Inline::Strong(children) => {
                out.push_str("<strong>");
                write_inlines(children, out);
                out.push_str("</strong>");
            }
            Inline::Emphasis(children) => {
                out.push_str("<em>");
                write_inlines(children, out);
                out.push_str("</em>");
            }
            Inline::Link { href, children } => {
                out.push_str("<a href=\"");
                escape_attr(href, out);
                out.push_str("\">");
                write_inlines(children, out);
                out.push_str("</a>");
            }
            Inline::LineBreak => out.push_str("<br>"),
        }
    }
}

fn write_block(block: &Block, out: &mut String) {
    match block {
        Block::Heading { level, inlines } => {
            out.push_str(&format!("<h{}>", level));
            write_inlines(inlines, out);
            out.push_str(&format!("</h{}>", level));
        }
        Block::Paragraph(inlines) => {
            if inlines.is_empty() {
                return;
            }
            out.push_str("<p>");
            write_inlines(inlines, out);
            out.push_str("</p>");
        }
        Block::List(items) => {
            out.push_str("<ul>");
            for item in items {
                out.push_str("<li>");
                write_item(item, out);
                out.push_str("</li>");
            }
            out.push_str("</ul>");
        }
    }
}

/// List items never wrap their text in `<p>`; loose items separate their
/// paragraphs with line breaks instead.
fn write_item(blocks: &[Block], out: &mut String) {
    let mut previous_was_text = false;
    for block in blocks {
        match block {
            Block::Paragraph(inlines) if !inlines.is_empty() => {
                if previous_was_text {
                    out.push_str("<br>");
                }
                write_inlines(inlines, out);
                previous_was_text = true;
            }
            Block::Paragraph(_) => {}
            other => {
                write_block(other, out);
                previous_was_text = false;
            }
        }
    }
}

/// Renders a bot reply to HTML. Pure and deterministic.
pub fn render_markdown(text: &str) -> String {
    let decoded = decode_entities(text);
    let source = restrict_to_subset(&decoded);
    let mut builder = TreeBuilder::new();
    for event in Parser::new(&source) {
        builder.process_event(event);
    }

    let mut out = String::with_capacity(source.len() + source.len() / 2);
    for block in builder.finish() {
        write_block(&block, &mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bold_and_italic_in_paragraph() {
        assert_eq!(render_markdown("**Hello** *world*"), "<p><strong>Hello</strong> <em>world</em></p>");
    }

    #[test]
    fn heading_then_paragraph() {
        assert_eq!(render_markdown("# Title\n\nBody text"), "<h1>Title</h1><p>Body text</p>");
    }

    #[test]
    fn heading_levels() {
        assert_eq!(
            render_markdown("# One\n## Two\n### Three"),
            "<h1>One</h1><h2>Two</h2><h3>Three</h3>"
        );
        assert_eq!(render_markdown("#### Deep"), "<p>#### Deep</p>");
    }

    #[test]
    fn bullet_items_share_one_list() {
        assert_eq!(render_markdown("* one\n* two"), "<ul><li>one</li><li>two</li></ul>");
    }

    #[test]
    fn numbered_and_bullet_runs_merge() {
        assert_eq!(
            render_markdown("1. first\n2. second\n* third"),
            "<ul><li>first</li><li>second</li><li>third</li></ul>"
        );
    }

    #[test]
    fn separated_lists_stay_separate() {
        assert_eq!(
            render_markdown("* a\n\nbetween\n\n* b"),
            "<ul><li>a</li></ul><p>between</p><ul><li>b</li></ul>"
        );
    }

    #[test]
    fn plain_text_only_gains_paragraphs_and_breaks() {
        assert_eq!(render_markdown("hello there"), "<p>hello there</p>");
        assert_eq!(render_markdown("line one\nline two"), "<p>line one<br>line two</p>");
        assert_eq!(render_markdown("first\n\nsecond"), "<p>first</p><p>second</p>");
    }

    #[test]
    fn blank_input_renders_nothing() {
        assert_eq!(render_markdown(""), "");
        assert_eq!(render_markdown("\n\n\n"), "");
    }

    #[test]
    fn entities_decode_before_markup() {
        assert_eq!(render_markdown("&#42;&#42;bold&#42;&#42;"), "<p><strong>bold</strong></p>");
        assert_eq!(render_markdown("Tom &amp; Jerry"), "<p>Tom &amp; Jerry</p>");
    }

    #[test]
    fn raw_html_is_displayed_not_injected() {
        assert_eq!(
            render_markdown("&lt;script&gt;alert(1)&lt;/script&gt;"),
            "<p>&lt;script&gt;alert(1)&lt;/script&gt;</p>"
        );
    }

    #[test]
    fn inline_markup_inside_list_and_heading() {
        assert_eq!(
            render_markdown("## A **bold** title\n* item with *emphasis*"),
            "<h2>A <strong>bold</strong> title</h2><ul><li>item with <em>emphasis</em></li></ul>"
        );
    }

    #[test]
    fn loose_items_do_not_wrap_paragraphs() {
        assert_eq!(render_markdown("* one\n\n* two"), "<ul><li>one</li><li>two</li></ul>");
    }

    #[test]
    fn nested_list_renders_inside_item() {
        assert_eq!(
            render_markdown("* outer\n  * inner"),
            "<ul><li>outer<ul><li>inner</li></ul></li></ul>"
        );
    }

    #[test]
    fn text_without_subset_markup_is_kept_literally() {
        for (input, expected) in [
            ("> note this", "<p>&gt; note this</p>"),
            ("use _underscores_ here", "<p>use _underscores_ here</p>"),
            ("Summary\n---", "<p>Summary<br>---</p>"),
            ("Title\n===", "<p>Title<br>===</p>"),
            ("Intro\n\n    indented line", "<p>Intro</p><p>indented line</p>"),
            ("escape a\\*b here", "<p>escape a\\*b here</p>"),
            ("- dash\n+ plus", "<p>- dash<br>+ plus</p>"),
            ("1) first", "<p>1) first</p>"),
            ("***", "<p>***</p>"),
            ("Use `a<b` here", "<p>Use `a&lt;b` here</p>"),
            ("```\nfn main() {}\n```", "<p>```<br>fn main() {}<br>```</p>"),
            ("[ref]: https://x.dev", "<p>[ref]: https://x.dev</p>"),
            ("Tom &amp;amp; Jerry", "<p>Tom &amp;amp; Jerry</p>"),
        ] {
            assert_eq!(render_markdown(input), expected, "input {:?}", input);
        }
    }

    #[test]
    fn numbered_lines_after_text_become_items() {
        assert_eq!(
            render_markdown("Steps:\n3. third\n4. fourth"),
            "<p>Steps:</p><ul><li>third</li><li>fourth</li></ul>"
        );
        assert_eq!(render_markdown("Note:\n* point"), "<p>Note:</p><ul><li>point</li></ul>");
    }

    #[test]
    fn web_links_keep_their_href() {
        assert_eq!(
            render_markdown("See [docs](https://x.dev/?a=1&b=2)"),
            "<p>See <a href=\"https://x.dev/?a=1&amp;b=2\">docs</a></p>"
        );
        assert_eq!(
            render_markdown("[mail](mailto:team@x.dev)"),
            "<p><a href=\"mailto:team@x.dev\">mail</a></p>"
        );
    }

    #[test]
    fn other_link_schemes_render_as_text() {
        assert_eq!(render_markdown("[link](javascript:alert(1))"), "<p>link</p>");
        assert_eq!(render_markdown("[**img**](data:text/html,x)"), "<p><strong>img</strong></p>");
        assert_eq!(render_markdown("[page](/local)"), "<p>page</p>");
    }
}
