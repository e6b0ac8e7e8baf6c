// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end tests for the insertion engine: real PDFs in, real PDFs out.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};

use image::{RgbImage, RgbaImage};
use inlay_core::{EngineConfig, InlayError, InsertionRequest, InstructionSet, PageSelector};
use inlay_document::InsertionEngine;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};

fn process(set: &InstructionSet) -> inlay_core::error::Result<PathBuf> {
    inlay_document::process(set, &EngineConfig::default())
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Write a Letter-sized PDF with `pages` pages, each showing "page N".
fn write_sample_pdf(path: &Path, pages: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids: Vec<Object> = Vec::new();
    for n in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12i64.into()]),
                Operation::new("Td", vec![72i64.into(), 720i64.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("page {}", n + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => Object::Array(vec![0i64.into(), 0i64.into(), 612i64.into(), 792i64.into()]),
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Serve one HTTP response on a loopback port and return its address.
fn serve_once(status_line: &'static str, body: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let head = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
        }
    });
    addr
}

/// Downloads left in the system temp dir with the given extension.
fn leftover_downloads(extension: &str) -> Vec<String> {
    std::fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("inlay-") && name.ends_with(extension))
        .collect()
}

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn source(&self, pages: usize) -> PathBuf {
        let path = self.path("source.pdf");
        write_sample_pdf(&path, pages);
        path
    }

    fn instructions(&self, source: &Path, output: &str, insertions: Vec<InsertionRequest>) -> InstructionSet {
        InstructionSet {
            pdf_path: source.display().to_string(),
            output_path: self.path(output).display().to_string(),
            insertions,
        }
    }
}

fn text(content: &str, x: f32, y: f32, pages: PageSelector) -> InsertionRequest {
    let mut request = InsertionRequest::new("text", x, y);
    request.content = Some(content.to_string());
    request.pages = pages;
    request
}

fn image_request(source: &Path) -> InsertionRequest {
    let mut request = InsertionRequest::new("image", 10.0, 10.0);
    request.source = Some(source.display().to_string());
    request
}

/// Decoded operations of every page, in page order.
fn page_operations(path: &Path) -> Vec<Vec<Operation>> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| Content::decode(&doc.get_page_content(id).unwrap()).unwrap().operations)
        .collect()
}

fn shown_strings(ops: &[Operation]) -> Vec<Vec<u8>> {
    ops.iter()
        .filter(|op| op.operator == "Tj")
        .filter_map(|op| match op.operands.first() {
            Some(Object::String(bytes, _)) => Some(bytes.clone()),
            _ => None,
        })
        .collect()
}

fn numbers(op: &Operation) -> Vec<f32> {
    op.operands
        .iter()
        .filter_map(|o| match o {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r),
            _ => None,
        })
        .collect()
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 0.01, "{actual:?} vs {expected:?}");
    }
}

/// The `cm` operands in effect for each `Do` on a page.
fn image_placements(ops: &[Operation]) -> Vec<Vec<f32>> {
    ops.windows(2)
        .filter(|pair| pair[0].operator == "cm" && pair[1].operator == "Do")
        .map(|pair| numbers(&pair[0]))
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn text_on_first_page_only() {
    let ws = Workspace::new();
    let source = ws.source(3);
    let before = page_operations(&source);

    let set = ws.instructions(
        &source,
        "out.pdf",
        vec![text("Hello", 50.0, 100.0, PageSelector::First)],
    );
    let output = process(&set).unwrap();
    assert_eq!(output, ws.path("out.pdf"));

    let after = page_operations(&output);
    assert_eq!(after.len(), 3);
    assert_eq!(
        shown_strings(&after[0]),
        vec![b"page 1".to_vec(), b"Hello".to_vec()]
    );

    // The inserted baseline sits at (50, 792 - 100) in native space.
    let space = after[0].iter().find(|op| op.operator == "cm").unwrap();
    assert_close(&numbers(space), &[1.0, 0.0, 0.0, -1.0, 0.0, 792.0]);
    let tm = after[0].iter().find(|op| op.operator == "Tm").unwrap();
    assert_close(&numbers(tm), &[1.0, 0.0, 0.0, -1.0, 50.0, 100.0]);

    for page in 1..3 {
        assert_eq!(shown_strings(&after[page]), shown_strings(&before[page]));
        assert_eq!(after[page].len(), before[page].len());
    }
}

#[test]
fn each_overlay_is_isolated_from_the_page_and_from_each_other() {
    let ws = Workspace::new();
    let source = ws.source(1);
    let set = ws.instructions(
        &source,
        "out.pdf",
        vec![
            text("One", 50.0, 100.0, PageSelector::All),
            text("Two", 50.0, 200.0, PageSelector::All),
        ],
    );
    let output = process(&set).unwrap();

    let operators: Vec<String> = page_operations(&output)[0]
        .iter()
        .map(|op| op.operator.clone())
        .collect();
    let overlay = ["q", "cm", "BT", "Tf", "rg", "Tm", "Tj", "ET", "Q"];
    let mut expected = vec!["q", "BT", "Tf", "Td", "Tj", "ET", "Q"];
    expected.extend(overlay);
    expected.extend(overlay);
    assert_eq!(operators, expected);

    // Both overlays start from the page's own space, not a stacked one.
    let ops = &page_operations(&output)[0];
    let spaces: Vec<_> = ops.iter().filter(|op| op.operator == "cm").map(numbers).collect();
    assert_eq!(spaces.len(), 2);
    for space in &spaces {
        assert_close(space, &[1.0, 0.0, 0.0, -1.0, 0.0, 792.0]);
    }
}

#[test]
fn rotated_page_uses_screen_coordinates() {
    let ws = Workspace::new();
    let source = ws.source(1);
    let mut doc = Document::load(&source).unwrap();
    let page = doc.get_pages()[&1];
    doc.get_object_mut(page)
        .and_then(Object::as_dict_mut)
        .unwrap()
        .set("Rotate", 90i64);
    doc.save(&source).unwrap();

    let logo = ws.path("logo.png");
    RgbImage::new(1000, 500).save(&logo).unwrap();
    let set = ws.instructions(
        &source,
        "out.pdf",
        vec![
            text("Hello", 50.0, 100.0, PageSelector::All),
            image_request(&logo),
        ],
    );
    let output = process(&set).unwrap();
    let ops = &page_operations(&output)[0];

    // Screen top-left of a quarter-turned page is the native bottom-left.
    let space = ops.iter().find(|op| op.operator == "cm").unwrap();
    assert_close(&numbers(space), &[0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    let tm = ops.iter().find(|op| op.operator == "Tm").unwrap();
    assert_close(&numbers(tm), &[1.0, 0.0, 0.0, -1.0, 50.0, 100.0]);

    let placements = image_placements(ops);
    assert_close(&placements[0], &[0.0, 200.0, -100.0, 0.0, 110.0, 10.0]);
}

#[test]
fn out_of_range_page_changes_nothing_but_still_saves() {
    let ws = Workspace::new();
    let source = ws.source(3);
    let before = page_operations(&source);

    let set = ws.instructions(
        &source,
        "out.pdf",
        vec![text("Hello", 50.0, 100.0, PageSelector::Single(5))],
    );
    let output = process(&set).unwrap();

    let after = page_operations(&output);
    assert_eq!(after.len(), before.len());
    for (a, b) in after.iter().zip(&before) {
        assert_eq!(shown_strings(a), shown_strings(b));
        assert_eq!(a.len(), b.len());
    }
}

#[test]
fn invalid_type_aborts_without_touching_output() {
    let ws = Workspace::new();
    let source = ws.source(2);
    let existing = ws.path("out.pdf");
    std::fs::write(&existing, b"previous result").unwrap();

    let set = ws.instructions(
        &source,
        "out.pdf",
        vec![
            text("first", 10.0, 10.0, PageSelector::All),
            InsertionRequest::new("shape", 0.0, 0.0),
        ],
    );
    let err = process(&set).unwrap_err();
    assert!(matches!(err, InlayError::InvalidInsertionType(ref kind) if kind == "shape"));
    assert_eq!(std::fs::read(&existing).unwrap(), b"previous result");

    let fresh = ws.instructions(&source, "never.pdf", vec![InsertionRequest::new("shape", 0.0, 0.0)]);
    assert!(process(&fresh).is_err());
    assert!(!ws.path("never.pdf").exists());
}

#[test]
fn missing_output_path_is_rejected_first() {
    let set = InstructionSet {
        pdf_path: "/nonexistent/source.pdf".into(),
        output_path: String::new(),
        insertions: vec![],
    };
    assert!(matches!(
        process(&set),
        Err(InlayError::MissingRequiredField("output_path"))
    ));
}

#[test]
fn empty_text_is_a_visual_no_op() {
    let ws = Workspace::new();
    let source = ws.source(1);
    let set = ws.instructions(&source, "out.pdf", vec![text("", 50.0, 50.0, PageSelector::All)]);
    let output = process(&set).unwrap();
    assert_eq!(shown_strings(&page_operations(&output)[0]), vec![b"page 1".to_vec()]);
}

#[test]
fn multi_line_text_from_json() {
    let ws = Workspace::new();
    let source = ws.source(2);
    let json = format!(
        r#"{{
            "pdf_path": {src:?},
            "output_path": {out:?},
            "insertions": [
                {{"type": "text", "content": "Line one\nLine two", "position": [72, 72],
                  "font_size": 10, "font_name": "tibo", "color": [0, 0, 1], "pages": [2]}}
            ]
        }}"#,
        src = source.display().to_string(),
        out = ws.path("out.pdf").display().to_string(),
    );
    let set: InstructionSet = serde_json::from_str(&json).unwrap();
    let output = process(&set).unwrap();

    let pages = page_operations(&output);
    assert_eq!(shown_strings(&pages[0]), vec![b"page 1".to_vec()]);
    assert_eq!(
        shown_strings(&pages[1]),
        vec![b"page 2".to_vec(), b"Line one".to_vec(), b"Line two".to_vec()]
    );
    let second_line = pages[1].iter().filter(|op| op.operator == "Tm").nth(1).unwrap();
    assert!((numbers(second_line)[5] - 84.0).abs() < 0.01);
    let colour = pages[1].iter().find(|op| op.operator == "rg").unwrap();
    assert_close(&numbers(colour), &[0.0, 0.0, 1.0]);
}

#[test]
fn image_is_auto_scaled_and_placed_on_every_page() {
    let ws = Workspace::new();
    let source = ws.source(2);
    let logo = ws.path("logo.png");
    RgbImage::new(1000, 500).save(&logo).unwrap();

    let set = ws.instructions(&source, "out.pdf", vec![image_request(&logo)]);
    let output = process(&set).unwrap();

    for ops in page_operations(&output) {
        let placements = image_placements(&ops);
        assert_eq!(placements.len(), 1);
        // 200 x 100 rectangle with its top-left at (10, 10).
        assert_close(&placements[0], &[200.0, 0.0, 0.0, 100.0, 10.0, 682.0]);
    }
}

#[test]
fn explicit_rectangle_fits_image_inside() {
    let ws = Workspace::new();
    let source = ws.source(1);
    let logo = ws.path("logo.png");
    RgbaImage::new(100, 50).save(&logo).unwrap();

    let mut request = image_request(&logo);
    request.width = Some(100);
    request.height = Some(100);
    let set = ws.instructions(&source, "out.pdf", vec![request]);
    let output = process(&set).unwrap();

    let placements = image_placements(&page_operations(&output)[0]);
    // Centred vertically: 25pt padding above, drawn 100 x 50.
    assert_close(&placements[0], &[100.0, 0.0, 0.0, 50.0, 10.0, 707.0]);

    let doc = Document::load(&output).unwrap();
    let masked = doc.objects.values().any(|obj| {
        obj.as_stream()
            .map(|s| s.dict.get(b"SMask").is_ok())
            .unwrap_or(false)
    });
    assert!(masked);
}

#[test]
fn missing_image_aborts_request() {
    let ws = Workspace::new();
    let source = ws.source(1);
    let set = ws.instructions(
        &source,
        "out.pdf",
        vec![image_request(&ws.path("absent.png"))],
    );
    assert!(matches!(process(&set), Err(InlayError::NotFound(_))));
    assert!(!ws.path("out.pdf").exists());
}

#[test]
fn output_directory_is_created() {
    let ws = Workspace::new();
    let source = ws.source(1);
    let set = ws.instructions(
        &source,
        "deep/nested/out.pdf",
        vec![text("x", 1.0, 1.0, PageSelector::All)],
    );
    let output = process(&set).unwrap();
    assert!(output.exists());
    let names: Vec<_> = std::fs::read_dir(output.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("out.pdf")]);
}

#[test]
fn unwritable_destination_is_write_error() {
    let ws = Workspace::new();
    let source = ws.source(1);
    std::fs::write(ws.path("blocker"), b"a file, not a directory").unwrap();
    let set = ws.instructions(&source, "blocker/out.pdf", vec![]);
    assert!(matches!(process(&set), Err(InlayError::WriteError { .. })));
}

#[test]
fn same_instructions_give_same_content() {
    let ws = Workspace::new();
    let source = ws.source(2);
    let insertions = vec![
        text("Stamp", 300.0, 400.0, PageSelector::All),
        text("Footer", 20.0, 770.0, PageSelector::Last),
    ];
    let first = process(&ws.instructions(&source, "a.pdf", insertions.clone())).unwrap();
    let second = process(&ws.instructions(&source, "b.pdf", insertions)).unwrap();

    let a = page_operations(&first);
    let b = page_operations(&second);
    for (pa, pb) in a.iter().zip(&b) {
        assert_eq!(pa.len(), pb.len());
        assert_eq!(shown_strings(pa), shown_strings(pb));
        for (oa, ob) in pa.iter().zip(pb) {
            assert_eq!(oa.operator, ob.operator);
            assert_eq!(numbers(oa), numbers(ob));
        }
    }
}

#[test]
fn concurrent_requests_do_not_interfere() {
    let ws = Workspace::new();
    let source = ws.source(2);
    let engine = InsertionEngine::new(EngineConfig::default());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|n| {
                let set = ws.instructions(
                    &source,
                    &format!("out-{n}.pdf"),
                    vec![text(&format!("request {n}"), 50.0, 50.0, PageSelector::First)],
                );
                let engine = &engine;
                scope.spawn(move || (n, engine.process(&set)))
            })
            .collect();

        for handle in handles {
            let (n, result) = handle.join().unwrap();
            let output = result.unwrap();
            let first_page = &page_operations(&output)[0];
            assert!(shown_strings(first_page).contains(&format!("request {n}").into_bytes()));
        }
    });

    let stray: Vec<_> = std::fs::read_dir(ws.dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part"))
        .collect();
    assert!(stray.is_empty(), "leftover temp files: {stray:?}");
}

#[test]
fn remote_source_is_downloaded() {
    let ws = Workspace::new();
    let source = ws.source(1);
    let addr = serve_once("200 OK", std::fs::read(&source).unwrap());

    let set = InstructionSet {
        pdf_path: format!("http://{addr}/docs/contract.pdf"),
        output_path: ws.path("out.pdf").display().to_string(),
        insertions: vec![text("Signed", 100.0, 700.0, PageSelector::All)],
    };
    let output = process(&set).unwrap();
    assert!(shown_strings(&page_operations(&output)[0]).contains(&b"Signed".to_vec()));
}

#[test]
fn remote_image_is_placed_and_its_download_removed() {
    let ws = Workspace::new();
    let source = ws.source(1);
    let mut png = Vec::new();
    RgbImage::new(40, 20)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    let addr = serve_once("200 OK", png);

    let mut request = InsertionRequest::new("image", 10.0, 10.0);
    request.source = Some(format!("http://{addr}/assets/seal.inlayok"));
    let output = process(&ws.instructions(&source, "out.pdf", vec![request])).unwrap();

    let placements = image_placements(&page_operations(&output)[0]);
    assert_eq!(placements.len(), 1);
    assert_close(&placements[0], &[40.0, 0.0, 0.0, 20.0, 10.0, 762.0]);
    assert!(leftover_downloads(".inlayok").is_empty());
}

#[test]
fn failed_remote_image_leaves_no_download_behind() {
    let ws = Workspace::new();
    let source = ws.source(1);

    // Downloaded, then rejected by the decoder.
    let addr = serve_once("200 OK", b"not an image at all".to_vec());
    let mut request = InsertionRequest::new("image", 10.0, 10.0);
    request.source = Some(format!("http://{addr}/assets/seal.inlaybad"));
    let err = process(&ws.instructions(&source, "out.pdf", vec![request])).unwrap_err();
    assert!(matches!(err, InlayError::ImageDecodeError(_)));
    assert!(leftover_downloads(".inlaybad").is_empty());

    // Never downloaded.
    let addr = serve_once("404 Not Found", b"gone".to_vec());
    let mut request = InsertionRequest::new("image", 10.0, 10.0);
    request.source = Some(format!("http://{addr}/assets/seal.inlaymis"));
    let err = process(&ws.instructions(&source, "out.pdf", vec![request])).unwrap_err();
    assert!(matches!(err, InlayError::FetchError { .. }));
    assert!(leftover_downloads(".inlaymis").is_empty());

    assert!(!ws.path("out.pdf").exists());
}

#[test]
fn unreachable_remote_source_is_fetch_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let ws = Workspace::new();
    let set = InstructionSet {
        pdf_path: format!("http://127.0.0.1:{port}/missing.pdf"),
        output_path: ws.path("out.pdf").display().to_string(),
        insertions: vec![],
    };
    assert!(matches!(process(&set), Err(InlayError::FetchError { .. })));
    assert!(!ws.path("out.pdf").exists());
}
