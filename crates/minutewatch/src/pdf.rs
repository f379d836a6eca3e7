//! Minimal PDF authoring: renders plain-text pages with a Courier font.
//!
//! Each input line becomes its own `BT ... ET` block so per-line text comes
//! back out of `lopdf::Document::extract_text` separated by newlines.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

pub const PAGE_WIDTH: i64 = 612;
pub const PAGE_HEIGHT: i64 = 792;
pub const FONT_SIZE: i64 = 12;
pub const LEFT_MARGIN: i64 = 72;
pub const TOP_BASELINE: i64 = 720;
pub const LINE_HEIGHT: i64 = 16;

/// Builds a PDF with one page per entry of `pages`.
pub fn compose_text_pdf(pages: &[&str]) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for text in pages {
        let content = Stream::new(dictionary! {}, page_content(text).into_bytes());
        let content_id = doc.add_object(content);
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

fn page_content(text: &str) -> String {
    let mut content = String::new();
    for (i, line) in text.lines().enumerate() {
        let y = TOP_BASELINE - LINE_HEIGHT * i as i64;
        content.push_str(&format!(
            "BT\n/F1 {} Tf\n{} {} Td\n({}) Tj\nET\n",
            FONT_SIZE,
            LEFT_MARGIN,
            y,
            escape_pdf_string(line)
        ));
    }
    content
}

fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            c if c.is_ascii() && !c.is_control() => c.to_string(),
            _ => " ".to_string(),
        })
        .collect()
}
