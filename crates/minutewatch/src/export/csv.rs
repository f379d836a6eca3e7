//! RFC 4180 rendering of match results.

use crate::store::MatchResult;

pub const CSV_HEADER: [&str; 5] = ["pdf_filename", "page_number", "keyword", "snippet", "entities"];

/// Quotes a field when it contains a delimiter, quote or line break.
pub fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn push_record<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let record: Vec<String> = fields.into_iter().map(quote_field).collect();
    out.push_str(&record.join(","));
    out.push_str("\r\n");
}

/// Renders `results` with a header row. No results renders as an empty string.
pub fn render_csv(results: &[MatchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    push_record(&mut out, CSV_HEADER);
    for r in results {
        let page = r.page_number.to_string();
        push_record(
            &mut out,
            [
                r.pdf_filename.as_str(),
                page.as_str(),
                r.keyword.as_str(),
                r.snippet.as_str(),
                r.entities.as_str(),
            ],
        );
    }
    out
}
