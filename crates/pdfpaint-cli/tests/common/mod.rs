//! Fixture PDFs for the CLI tests.
#![allow(dead_code)]

use std::io::Write;

use assert_cmd::Command;
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use tempfile::NamedTempFile;

pub fn cmd() -> Command {
    Command::cargo_bin("pdfpaint").unwrap()
}

/// Build a PDF with one page per content stream. Every page shares `/F1`
/// (width 600 for 'A') and the extra `resources` entries.
pub fn pdf_with_pages(contents: &[&[u8]], resources: Dictionary) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "FirstChar" => 65,
        "LastChar" => 65,
        "Widths" => vec![600.into()],
    });
    let mut page_resources = resources;
    page_resources.set(
        "Font",
        dictionary! { "F1" => Object::Reference(font_id) },
    );

    let mut kids = Vec::new();
    for content in contents {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => page_resources.clone(),
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Save `doc` to a temporary file that lives as long as the handle.
pub fn save(mut doc: Document) -> NamedTempFile {
    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&buf).unwrap();
    file.flush().unwrap();
    file
}

/// A one-page PDF on disk.
pub fn pdf_file(content: &[u8]) -> NamedTempFile {
    save(pdf_with_pages(&[content], Dictionary::new()))
}

/// Parse each stdout line as JSON.
pub fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
