//! Finds where text is drawn on a page by replaying its content stream.
//!
//! Only simple (single-byte) fonts are measured precisely. Glyph widths come
//! from the font's `Widths` array; fonts without one fall back to an average
//! width, so boxes on such pages are approximate.

use std::collections::HashMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::HighlightError;

/// Average glyph width (in text space units per 1000) for unmeasured fonts.
const FALLBACK_WIDTH: f32 = 500.0;
/// Courier and friends are monospaced at 600.
const MONOSPACE_WIDTH: f32 = 600.0;
const DESCENT: f32 = -0.2;
const ASCENT: f32 = 0.8;

/// Affine matrix `[a b c d e f]` as used by PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix([f32; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn translate(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }
}

/// Four corners of a highlighted region in user space, in QuadPoints order:
/// upper-left, upper-right, lower-left, lower-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub points: [(f32, f32); 4],
}

impl Quad {
    /// `[llx lly urx ury]` bounding rectangle.
    pub fn bounds(&self) -> [f32; 4] {
        let xs = self.points.map(|p| p.0);
        let ys = self.points.map(|p| p.1);
        let fold = |v: [f32; 4], f: fn(f32, f32) -> f32| v.into_iter().reduce(f).unwrap_or(0.0);
        [fold(xs, f32::min), fold(ys, f32::min), fold(xs, f32::max), fold(ys, f32::max)]
    }

    pub fn flat(&self) -> [f32; 8] {
        let [p1, p2, p3, p4] = self.points;
        [p1.0, p1.1, p2.0, p2.1, p3.0, p3.1, p4.0, p4.1]
    }
}

#[derive(Debug, Clone)]
struct FontMetrics {
    first_char: i64,
    widths: Vec<f32>,
    default_width: f32,
}

impl FontMetrics {
    fn width(&self, code: u8) -> f32 {
        let idx = i64::from(code) - self.first_char;
        if idx >= 0 {
            if let Some(w) = self.widths.get(idx as usize) {
                return *w;
            }
        }
        self.default_width
    }
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            first_char: 0,
            widths: Vec::new(),
            default_width: FALLBACK_WIDTH,
        }
    }
}

/// One string drawn by a single text-showing operator.
#[derive(Debug, Clone)]
struct TextRun {
    chars: Vec<char>,
    /// Start offset of each glyph plus the end of the last, in text space.
    offsets: Vec<f32>,
    /// Text space to user space at the start of the run.
    matrix: Matrix,
    font_size: f32,
    rise: f32,
}

impl TextRun {
    fn quad(&self, start: usize, end: usize) -> Quad {
        let x0 = self.offsets[start];
        let x1 = self.offsets[end];
        let bottom = self.rise + DESCENT * self.font_size;
        let top = self.rise + ASCENT * self.font_size;
        Quad {
            points: [
                self.matrix.apply(x0, top),
                self.matrix.apply(x1, top),
                self.matrix.apply(x0, bottom),
                self.matrix.apply(x1, bottom),
            ],
        }
    }
}

#[derive(Debug, Clone)]
struct TextState {
    tm: Matrix,
    tlm: Matrix,
    font: Vec<u8>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font: Vec::new(),
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

impl TextState {
    fn next_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(number).collect()
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, obj).and_then(|o| o.as_dict().ok())
}

/// Page resources, following `Parent` links for inherited entries.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..32 {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        node = resolve_dict(doc, node.get(b"Parent").ok()?)?;
    }
    None
}

fn font_metrics(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontMetrics> {
    let mut fonts = HashMap::new();
    let Some(font_dict) = page_resources(doc, page_id)
        .and_then(|r| r.get(b"Font").ok())
        .and_then(|f| resolve_dict(doc, f))
    else {
        return fonts;
    };

    for (name, value) in font_dict.iter() {
        let Some(font) = resolve_dict(doc, value) else {
            continue;
        };
        let monospace = font
            .get(b"BaseFont")
            .ok()
            .and_then(|b| b.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).contains("Courier"))
            .unwrap_or(false);
        let default_width = if monospace { MONOSPACE_WIDTH } else { FALLBACK_WIDTH };

        let widths = font
            .get(b"Widths")
            .ok()
            .and_then(|w| resolve(doc, w))
            .and_then(|w| w.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|o| resolve(doc, o).and_then(number).unwrap_or(default_width))
                    .collect()
            })
            .unwrap_or_default();
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);

        fonts.insert(
            name.clone(),
            FontMetrics {
                first_char,
                widths,
                default_width,
            },
        );
    }
    fonts
}

fn show_string(state: &mut TextState, metrics: &FontMetrics, bytes: &[u8], run: &mut TextRun) {
    for &code in bytes {
        let w0 = metrics.width(code) / 1000.0;
        let mut advance = w0 * state.size + state.char_spacing;
        if code == b' ' {
            advance += state.word_spacing;
        }
        advance *= state.horizontal_scale;

        let start = run.offsets.last().copied().unwrap_or(0.0);
        run.chars.push(char::from(code));
        run.offsets.push(start + advance);
        state.tm = Matrix::translate(advance, 0.0).then(&state.tm);
    }
}

fn new_run(state: &TextState, ctm: &Matrix) -> TextRun {
    TextRun {
        chars: Vec::new(),
        offsets: vec![0.0],
        matrix: state.tm.then(ctm),
        font_size: state.size,
        rise: state.rise,
    }
}

fn collect_runs(doc: &Document, page_id: ObjectId) -> Result<Vec<TextRun>, HighlightError> {
    let bytes = doc.get_page_content(page_id)?;
    let content = Content::decode(&bytes)?;
    let fonts = font_metrics(doc, page_id);
    let fallback = FontMetrics::default();

    let mut runs = Vec::new();
    let mut ctm = Matrix::IDENTITY;
    let mut ctm_stack: Vec<Matrix> = Vec::new();
    let mut state = TextState::default();

    for op in &content.operations {
        let args = &op.operands;
        match op.operator.as_str() {
            "q" => ctm_stack.push(ctm),
            "Q" => ctm = ctm_stack.pop().unwrap_or(Matrix::IDENTITY),
            "cm" => {
                if let [a, b, c, d, e, f] = numbers(args)[..] {
                    ctm = Matrix([a, b, c, d, e, f]).then(&ctm);
                }
            }
            "BT" => {
                state.tm = Matrix::IDENTITY;
                state.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(name) = args.first().and_then(|o| o.as_name().ok()) {
                    state.font = name.to_vec();
                }
                if let Some(size) = args.get(1).and_then(number) {
                    state.size = size;
                }
            }
            "Tc" => state.char_spacing = args.first().and_then(number).unwrap_or(0.0),
            "Tw" => state.word_spacing = args.first().and_then(number).unwrap_or(0.0),
            "Tz" => state.horizontal_scale = args.first().and_then(number).unwrap_or(100.0) / 100.0,
            "TL" => state.leading = args.first().and_then(number).unwrap_or(0.0),
            "Ts" => state.rise = args.first().and_then(number).unwrap_or(0.0),
            "Td" => {
                if let [tx, ty] = numbers(args)[..] {
                    state.next_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = numbers(args)[..] {
                    state.leading = -ty;
                    state.next_line(tx, ty);
                }
            }
            "Tm" => {
                if let [a, b, c, d, e, f] = numbers(args)[..] {
                    state.tm = Matrix([a, b, c, d, e, f]);
                    state.tlm = state.tm;
                }
            }
            "T*" => {
                let leading = state.leading;
                state.next_line(0.0, -leading);
            }
            "Tj" | "'" | "\"" => {
                if op.operator == "\"" {
                    if let Some(aw) = args.first().and_then(number) {
                        state.word_spacing = aw;
                    }
                    if let Some(ac) = args.get(1).and_then(number) {
                        state.char_spacing = ac;
                    }
                }
                if op.operator != "Tj" {
                    let leading = state.leading;
                    state.next_line(0.0, -leading);
                }
                if let Some(Object::String(bytes, _)) = args.last() {
                    let metrics = fonts.get(&state.font).unwrap_or(&fallback);
                    let mut run = new_run(&state, &ctm);
                    show_string(&mut state, metrics, bytes, &mut run);
                    runs.push(run);
                }
            }
            "TJ" => {
                let Some(Ok(items)) = args.first().map(|o| o.as_array()) else {
                    continue;
                };
                let metrics = fonts.get(&state.font).unwrap_or(&fallback);
                let mut run = new_run(&state, &ctm);
                for item in items {
                    match item {
                        Object::String(bytes, _) => {
                            show_string(&mut state, metrics, bytes, &mut run);
                        }
                        other => {
                            if let Some(adjust) = number(other) {
                                let tx = -adjust / 1000.0 * state.size * state.horizontal_scale;
                                if let Some(last) = run.offsets.last_mut() {
                                    *last += tx;
                                }
                                state.tm = Matrix::translate(tx, 0.0).then(&state.tm);
                            }
                        }
                    }
                }
                runs.push(run);
            }
            _ => {}
        }
    }

    Ok(runs)
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Returns one quad per case-insensitive occurrence of `needle` on the page.
///
/// Occurrences split across separate text-showing operators are not found.
pub fn locate_text(doc: &Document, page_id: ObjectId, needle: &str) -> Result<Vec<Quad>, HighlightError> {
    let needle: Vec<char> = needle.chars().map(fold).collect();
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    let mut quads = Vec::new();
    for run in collect_runs(doc, page_id)? {
        let hay: Vec<char> = run.chars.iter().copied().map(fold).collect();
        if hay.len() < needle.len() {
            continue;
        }
        let mut i = 0;
        while i + needle.len() <= hay.len() {
            if hay[i..i + needle.len()] == needle[..] {
                quads.push(run.quad(i, i + needle.len()));
                i += needle.len();
            } else {
                i += 1;
            }
        }
    }
    Ok(quads)
}
