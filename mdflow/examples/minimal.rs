//! Minimal `mdflow` usage: render a growing buffer tick by tick.
//!
//! Run:
//!   cargo run -p mdflow --example minimal

use mdflow::{BlockNode, RenderMode, Renderer};

fn kind(block: &BlockNode) -> &'static str {
    match block {
        BlockNode::Paragraph(_) => "paragraph",
        BlockNode::Heading { .. } => "heading",
        BlockNode::CodeBlock(_) => "code",
        BlockNode::Diagram(_) => "diagram",
        BlockNode::Table(_) => "table",
        BlockNode::List { .. } => "list",
        BlockNode::BlockQuote(_) => "quote",
        BlockNode::MathBlock(_) => "math",
        BlockNode::Rule => "rule",
        BlockNode::Html(_) => "html",
    }
}

fn main() {
    let mut renderer = Renderer::default();
    let mut buffer = String::new();

    let chunks = [
        "# Title\n\n",
        "Hello **wor",
        "ld**. See [1",
        "] for details.\n\n",
        "```rust\nfn main()",
        " {}\n```\n",
    ];

    for (i, chunk) in chunks.iter().enumerate() {
        buffer.push_str(chunk);
        let tree = renderer.render(&buffer, true, RenderMode::Plain);
        let kinds: Vec<_> = tree.blocks.iter().map(kind).collect();
        println!("tick {i}: {kinds:?}");
    }

    let tree = renderer.render(&buffer, false, RenderMode::Plain);
    println!("final: {} blocks, streaming={}", tree.blocks.len(), tree.streaming);
}
