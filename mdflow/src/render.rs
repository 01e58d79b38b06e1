//! Render orchestrator: normalize, repair (while streaming), parse, route to
//! block renderers, and append the trailing cursor. Recomputation is skipped
//! entirely when the inputs have not changed.

use std::sync::Arc;

use pulldown_cmark::{
    CodeBlockKind, Event, Options as ParserOptions, Parser, Tag, TagEnd,
};

use crate::citations::{InlineSeg, split_citations};
use crate::normalize::normalize_markdown;
use crate::options::{RenderMode, RenderOptions};
use crate::repair::repair_markdown;
use crate::tree::{
    BlockNode, CodeBlock, ColumnAlignment, DiagramBlock, InlineNode, RenderTree, TableBlock,
};

fn parser_extensions() -> ParserOptions {
    ParserOptions::ENABLE_TABLES
        | ParserOptions::ENABLE_STRIKETHROUGH
        | ParserOptions::ENABLE_MATH
        | ParserOptions::ENABLE_TASKLISTS
        | ParserOptions::ENABLE_GFM
}

enum Container {
    List {
        start: Option<u64>,
        items: Vec<Vec<BlockNode>>,
    },
    Item(Vec<BlockNode>),
    Quote(Vec<BlockNode>),
}

enum InlineFrame {
    Paragraph(Vec<InlineNode>),
    Loose(Vec<InlineNode>),
    Heading { level: u8, content: Vec<InlineNode> },
    Strong(Vec<InlineNode>),
    Emphasis(Vec<InlineNode>),
    Strikethrough(Vec<InlineNode>),
    Link {
        url: String,
        title: String,
        content: Vec<InlineNode>,
    },
    Image { url: String, alt: Vec<InlineNode> },
}

struct CodeCapture {
    language: String,
    source: String,
}

struct TableCapture {
    alignments: Vec<ColumnAlignment>,
    header: Vec<Vec<InlineNode>>,
    rows: Vec<Vec<Vec<InlineNode>>>,
    current_row: Vec<Vec<InlineNode>>,
    current_cell: Option<Vec<InlineNode>>,
    in_head: bool,
}

struct TreeBuilder<'o> {
    opts: &'o RenderOptions,
    root: Vec<BlockNode>,
    containers: Vec<Container>,
    inline_stack: Vec<InlineFrame>,
    code: Option<CodeCapture>,
    table: Option<TableCapture>,
    html_block: Option<String>,
    /// Adjacent text events coalesce here before citation splitting: the
    /// parser fragments literal text around brackets, and a citation marker
    /// must be matched against the whole run.
    pending_text: String,
}

impl<'o> TreeBuilder<'o> {
    fn new(opts: &'o RenderOptions) -> Self {
        Self {
            opts,
            root: Vec::new(),
            containers: Vec::new(),
            inline_stack: Vec::new(),
            code: None,
            table: None,
            html_block: None,
            pending_text: String::new(),
        }
    }

    fn push_block(&mut self, block: BlockNode) {
        match self.containers.last_mut() {
            Some(Container::Item(blocks)) | Some(Container::Quote(blocks)) => blocks.push(block),
            Some(Container::List { items, .. }) => {
                // An orphan block between items; attach it to the last item
                // rather than losing it.
                if let Some(item) = items.last_mut() {
                    item.push(block);
                } else {
                    items.push(vec![block]);
                }
            }
            None => self.root.push(block),
        }
    }

    fn push_inline(&mut self, node: InlineNode) {
        if let Some(frame) = self.inline_stack.last_mut() {
            match frame {
                InlineFrame::Paragraph(content)
                | InlineFrame::Loose(content)
                | InlineFrame::Heading { content, .. }
                | InlineFrame::Strong(content)
                | InlineFrame::Emphasis(content)
                | InlineFrame::Strikethrough(content)
                | InlineFrame::Link { content, .. } => content.push(node),
                InlineFrame::Image { alt, .. } => alt.push(node),
            }
            return;
        }
        if let Some(table) = self.table.as_mut() {
            if let Some(cell) = table.current_cell.as_mut() {
                cell.push(node);
                return;
            }
        }
        self.inline_stack.push(InlineFrame::Loose(vec![node]));
    }

    fn flush_text(&mut self) {
        if self.pending_text.is_empty() {
            return;
        }
        let run = std::mem::take(&mut self.pending_text);
        for seg in split_citations(&run) {
            match seg {
                InlineSeg::Text(t) => self.push_inline(InlineNode::Text(t)),
                InlineSeg::Citation(id) => self.push_inline(InlineNode::Citation(id)),
            }
        }
    }

    /// Close an implicit inline run before a block-level event.
    fn flush_loose(&mut self) {
        if matches!(self.inline_stack.last(), Some(InlineFrame::Loose(_))) {
            if let Some(InlineFrame::Loose(content)) = self.inline_stack.pop() {
                if !content.is_empty() {
                    self.push_block(BlockNode::Paragraph(content));
                }
            }
        }
    }

    fn end_inline_frame(&mut self) -> Option<InlineFrame> {
        self.inline_stack.pop()
    }

    fn handle(&mut self, event: Event<'_>) {
        if !matches!(event, Event::Text(_)) {
            self.flush_text();
        }
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => {
                if let Some(code) = self.code.as_mut() {
                    code.source.push_str(&text);
                } else if let Some(html) = self.html_block.as_mut() {
                    html.push_str(&text);
                } else {
                    self.pending_text.push_str(&text);
                }
            }
            Event::Code(code) => self.push_inline(InlineNode::Code(code.to_string())),
            Event::InlineMath(src) => self.push_inline(InlineNode::Math {
                source: src.to_string(),
                display: false,
            }),
            Event::DisplayMath(src) => self.push_inline(InlineNode::Math {
                source: src.to_string(),
                display: true,
            }),
            Event::Html(html) => {
                if let Some(buf) = self.html_block.as_mut() {
                    buf.push_str(&html);
                } else {
                    self.push_inline(InlineNode::Html(html.to_string()));
                }
            }
            Event::InlineHtml(html) => self.push_inline(InlineNode::Html(html.to_string())),
            Event::SoftBreak | Event::HardBreak => {
                // Model output uses single newlines for structure; both break
                // flavors render as hard breaks.
                self.push_inline(InlineNode::HardBreak);
            }
            Event::Rule => {
                self.flush_loose();
                self.push_block(BlockNode::Rule);
            }
            Event::TaskListMarker(done) => self.push_inline(InlineNode::TaskMarker(done)),
            Event::FootnoteReference(label) => {
                self.push_inline(InlineNode::Text(format!("[^{label}]")));
            }
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.flush_loose();
                self.inline_stack.push(InlineFrame::Paragraph(Vec::new()));
            }
            Tag::Heading { level, .. } => {
                self.flush_loose();
                self.inline_stack.push(InlineFrame::Heading {
                    level: level as u8,
                    content: Vec::new(),
                });
            }
            Tag::CodeBlock(kind) => {
                self.flush_loose();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .unwrap_or("")
                        .to_ascii_lowercase(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some(CodeCapture {
                    language,
                    source: String::new(),
                });
            }
            Tag::HtmlBlock => {
                self.flush_loose();
                self.html_block = Some(String::new());
            }
            Tag::List(start) => {
                self.flush_loose();
                self.containers.push(Container::List {
                    start,
                    items: Vec::new(),
                });
            }
            Tag::Item => self.containers.push(Container::Item(Vec::new())),
            Tag::BlockQuote(_) => {
                self.flush_loose();
                self.containers.push(Container::Quote(Vec::new()));
            }
            Tag::Table(alignments) => {
                self.flush_loose();
                let alignments = alignments
                    .iter()
                    .map(|a| match a {
                        pulldown_cmark::Alignment::None => ColumnAlignment::None,
                        pulldown_cmark::Alignment::Left => ColumnAlignment::Left,
                        pulldown_cmark::Alignment::Center => ColumnAlignment::Center,
                        pulldown_cmark::Alignment::Right => ColumnAlignment::Right,
                    })
                    .collect();
                self.table = Some(TableCapture {
                    alignments,
                    header: Vec::new(),
                    rows: Vec::new(),
                    current_row: Vec::new(),
                    current_cell: None,
                    in_head: false,
                });
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = true;
                }
            }
            Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.current_row = Vec::new();
                }
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.current_cell = Some(Vec::new());
                }
            }
            Tag::Emphasis => self.inline_stack.push(InlineFrame::Emphasis(Vec::new())),
            Tag::Strong => self.inline_stack.push(InlineFrame::Strong(Vec::new())),
            Tag::Strikethrough => {
                self.inline_stack.push(InlineFrame::Strikethrough(Vec::new()));
            }
            Tag::Link { dest_url, title, .. } => self.inline_stack.push(InlineFrame::Link {
                url: dest_url.to_string(),
                title: title.to_string(),
                content: Vec::new(),
            }),
            Tag::Image { dest_url, .. } => self.inline_stack.push(InlineFrame::Image {
                url: dest_url.to_string(),
                alt: Vec::new(),
            }),
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                let Some(frame) = self.end_inline_frame() else {
                    return;
                };
                let content = match frame {
                    InlineFrame::Paragraph(content) | InlineFrame::Loose(content) => content,
                    other => {
                        self.inline_stack.push(other);
                        return;
                    }
                };
                // A paragraph that is exactly one display-math expression is
                // a math block.
                if let [InlineNode::Math { source, display: true }] = content.as_slice() {
                    let source = source.clone();
                    self.push_block(BlockNode::MathBlock(source));
                } else if !content.is_empty() {
                    self.push_block(BlockNode::Paragraph(content));
                }
            }
            TagEnd::Heading(_) => {
                if let Some(InlineFrame::Heading { level, content }) = self.end_inline_frame() {
                    self.push_block(BlockNode::Heading { level, content });
                }
            }
            TagEnd::CodeBlock => {
                let Some(capture) = self.code.take() else {
                    return;
                };
                if self.opts.is_diagram_language(&capture.language) {
                    self.push_block(BlockNode::Diagram(DiagramBlock {
                        source: capture.source,
                    }));
                } else {
                    self.push_block(BlockNode::CodeBlock(CodeBlock {
                        language: capture.language,
                        source: capture.source,
                    }));
                }
            }
            TagEnd::HtmlBlock => {
                if let Some(html) = self.html_block.take() {
                    if !html.trim().is_empty() {
                        self.push_block(BlockNode::Html(html));
                    }
                }
            }
            TagEnd::List(_) => {
                if let Some(Container::List { start, items }) = self.containers.pop() {
                    self.push_block(BlockNode::List { start, items });
                }
            }
            TagEnd::Item => {
                self.flush_loose();
                if let Some(Container::Item(blocks)) = self.containers.pop() {
                    if let Some(Container::List { items, .. }) = self.containers.last_mut() {
                        items.push(blocks);
                    }
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush_loose();
                if let Some(Container::Quote(blocks)) = self.containers.pop() {
                    self.push_block(BlockNode::BlockQuote(blocks));
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.push_block(BlockNode::Table(TableBlock {
                        alignments: table.alignments,
                        header: table.header,
                        rows: table.rows,
                    }));
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.in_head = false;
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.current_row);
                    table.rows.push(row);
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = table.current_cell.take().unwrap_or_default();
                    if table.in_head {
                        table.header.push(cell);
                    } else {
                        table.current_row.push(cell);
                    }
                }
            }
            TagEnd::Emphasis => {
                if let Some(InlineFrame::Emphasis(content)) = self.end_inline_frame() {
                    self.push_inline(InlineNode::Emphasis(content));
                }
            }
            TagEnd::Strong => {
                if let Some(InlineFrame::Strong(content)) = self.end_inline_frame() {
                    self.push_inline(InlineNode::Strong(content));
                }
            }
            TagEnd::Strikethrough => {
                if let Some(InlineFrame::Strikethrough(content)) = self.end_inline_frame() {
                    self.push_inline(InlineNode::Strikethrough(content));
                }
            }
            TagEnd::Link => {
                if let Some(InlineFrame::Link { url, title, content }) = self.end_inline_frame() {
                    self.push_inline(InlineNode::Link { url, title, content });
                }
            }
            TagEnd::Image => {
                if let Some(InlineFrame::Image { url, alt }) = self.end_inline_frame() {
                    let alt = crate::tree::plain_text(&alt);
                    self.push_inline(InlineNode::Image { url, alt });
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<BlockNode> {
        self.flush_text();
        self.flush_loose();
        // Unterminated containers (possible on adversarial input) drain
        // outward so nothing already parsed is lost.
        while let Some(container) = self.containers.pop() {
            let block = match container {
                Container::List { start, items } => BlockNode::List { start, items },
                Container::Item(blocks) => BlockNode::List {
                    start: None,
                    items: vec![blocks],
                },
                Container::Quote(blocks) => BlockNode::BlockQuote(blocks),
            };
            self.push_block(block);
        }
        self.root
    }
}

fn attach_cursor(blocks: &mut Vec<BlockNode>) {
    match blocks.last_mut() {
        Some(BlockNode::Paragraph(content))
        | Some(BlockNode::Heading { content, .. }) => content.push(InlineNode::Cursor),
        _ => blocks.push(BlockNode::Paragraph(vec![InlineNode::Cursor])),
    }
}

/// Build one render tree from a buffer snapshot. Pure: equal inputs yield
/// equal trees.
pub fn build_tree(
    buffer: &str,
    streaming: bool,
    mode: RenderMode,
    opts: &RenderOptions,
) -> RenderTree {
    let normalized = normalize_markdown(buffer, mode);
    let source = if streaming {
        repair_markdown(&normalized, &opts.repair)
    } else {
        normalized
    };

    let mut builder = TreeBuilder::new(opts);
    for event in Parser::new_ext(&source, parser_extensions()) {
        builder.handle(event);
    }
    let mut blocks = builder.finish();
    if streaming {
        attach_cursor(&mut blocks);
    }
    RenderTree { blocks, streaming }
}

struct CacheEntry {
    buffer: String,
    streaming: bool,
    mode: RenderMode,
    style_key: Option<String>,
    tree: Arc<RenderTree>,
}

/// Memoizing orchestrator for one message view.
///
/// `render` is invoked on every incoming chunk; when neither the buffer, the
/// streaming flag, the mode, nor the style key changed, the previous tree is
/// returned with its identity intact (`Arc::ptr_eq` holds), so the host can
/// skip painting entirely.
pub struct Renderer {
    opts: RenderOptions,
    cache: Option<CacheEntry>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl Renderer {
    pub fn new(opts: RenderOptions) -> Self {
        Self { opts, cache: None }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.opts
    }

    pub fn render(&mut self, buffer: &str, streaming: bool, mode: RenderMode) -> Arc<RenderTree> {
        self.render_keyed(buffer, streaming, mode, None)
    }

    pub fn render_keyed(
        &mut self,
        buffer: &str,
        streaming: bool,
        mode: RenderMode,
        style_key: Option<&str>,
    ) -> Arc<RenderTree> {
        if let Some(entry) = &self.cache {
            if entry.streaming == streaming
                && entry.mode == mode
                && entry.style_key.as_deref() == style_key
                && entry.buffer == buffer
            {
                return Arc::clone(&entry.tree);
            }
        }

        tracing::debug!(bytes = buffer.len(), streaming, "rebuilding render tree");
        let tree = Arc::new(build_tree(buffer, streaming, mode, &self.opts));
        self.cache = Some(CacheEntry {
            buffer: buffer.to_string(),
            streaming,
            mode,
            style_key: style_key.map(str::to_string),
            tree: Arc::clone(&tree),
        });
        tree
    }
}
