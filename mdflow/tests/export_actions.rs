use std::cell::RefCell;
use std::time::Instant;

use mdflow::blocks::diagram::{CompiledDiagram, SvgExportOptions, save_diagram};
use mdflow::blocks::image::ImageSavePlan;
use mdflow::blocks::table::{copy_for_word_processor, table_html};
use mdflow::blocks::code::CopyControl;
use mdflow::{CodeBlock, ColumnAlignment, ExportError, ExportSink, InlineNode, TableBlock};

#[derive(Default)]
struct RecordingSink {
    rich: RefCell<Vec<(String, String)>>,
    plain: RefCell<Vec<String>>,
    files: RefCell<Vec<(String, usize)>>,
    fail_rich: bool,
}

impl ExportSink for RecordingSink {
    fn write_clipboard(&self, html: &str, text: &str) -> Result<(), ExportError> {
        if self.fail_rich {
            return Err(ExportError::Clipboard("denied".to_string()));
        }
        self.rich
            .borrow_mut()
            .push((html.to_string(), text.to_string()));
        Ok(())
    }

    fn write_clipboard_text(&self, text: &str) -> Result<(), ExportError> {
        self.plain.borrow_mut().push(text.to_string());
        Ok(())
    }

    fn save_file(&self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError> {
        self.files
            .borrow_mut()
            .push((file_name.to_string(), bytes.len()));
        Ok(())
    }
}

fn sample_table() -> TableBlock {
    TableBlock {
        alignments: vec![ColumnAlignment::None, ColumnAlignment::Right],
        header: vec![
            vec![InlineNode::Text("City".to_string())],
            vec![InlineNode::Text("Pop".to_string())],
        ],
        rows: vec![vec![
            vec![InlineNode::Text("Oslo".to_string())],
            vec![InlineNode::Text("709k".to_string())],
        ]],
    }
}

#[test]
fn table_copy_writes_both_representations() {
    let sink = RecordingSink::default();
    copy_for_word_processor(&sample_table(), false, &sink).unwrap();

    let rich = sink.rich.borrow();
    assert_eq!(rich.len(), 1);
    let (html, text) = &rich[0];
    assert!(html.contains("<table"));
    assert!(html.contains("border:1px solid"));
    assert_eq!(text, "City\tPop\nOslo\t709k\n");
    assert!(sink.plain.borrow().is_empty());
}

#[test]
fn table_copy_falls_back_to_plain_html_on_clipboard_failure() {
    let sink = RecordingSink {
        fail_rich: true,
        ..RecordingSink::default()
    };
    copy_for_word_processor(&sample_table(), false, &sink).unwrap();

    assert!(sink.rich.borrow().is_empty());
    let plain = sink.plain.borrow();
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0], table_html(&sample_table()));
}

#[test]
fn table_copy_is_refused_while_streaming() {
    let sink = RecordingSink::default();
    let err = copy_for_word_processor(&sample_table(), true, &sink).unwrap_err();
    assert_eq!(err, ExportError::StreamingInProgress);
    assert!(sink.rich.borrow().is_empty());
    assert!(sink.plain.borrow().is_empty());
}

#[test]
fn code_copy_round_trip() {
    let sink = RecordingSink::default();
    let mut control = CopyControl::new();
    let block = CodeBlock {
        language: "sh".to_string(),
        source: "echo hi\n".to_string(),
    };
    control.copy(&block, false, &sink, Instant::now()).unwrap();
    assert_eq!(sink.plain.borrow().as_slice(), ["echo hi\n"]);
}

#[test]
fn image_save_goes_through_the_sink() {
    let sink = RecordingSink::default();
    let plan = ImageSavePlan::new("flow chart", "image/png");
    plan.save(&[1, 2, 3], false, &sink).unwrap();
    assert_eq!(
        sink.files.borrow().as_slice(),
        [("flow_chart.png".to_string(), 3usize)]
    );

    let err = plan.save(&[1], true, &sink).unwrap_err();
    assert_eq!(err, ExportError::StreamingInProgress);
}

#[test]
fn diagram_save_writes_the_decorated_svg() {
    let sink = RecordingSink::default();
    let compiled = CompiledDiagram {
        svg: "<svg viewBox=\"0 0 40 20\"><g/></svg>".to_string(),
    };
    let opts = SvgExportOptions::default();
    save_diagram(&compiled, &opts, false, &sink).unwrap();

    let files = sink.files.borrow();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, "diagram.svg");
    // Padding and watermark make the payload larger than the input.
    assert!(files[0].1 > compiled.svg.len());
}
