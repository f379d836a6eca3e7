//! Post-completion annotation of matched documents.
//!
//! Every `(page, keyword)` hit of a job becomes one or more Highlight
//! annotations on a copy of the downloaded document, plus a bookmark per
//! highlighted page.

pub mod locate;
pub mod outline;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::{dictionary, Document, Object, ObjectId};
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::error::HighlightError;
use crate::storage::{StorageCategory, StorageManager};
use crate::store::{JobStore, MatchResult, PageRequest};

pub use locate::{locate_text, Quad};
pub use outline::{append_entries, outline_titles, OutlineEntry};

/// Author recorded on every annotation.
const ANNOTATION_AUTHOR: &str = "minutewatch";
const HIGHLIGHT_COLOR: [f32; 3] = [1.0, 0.92, 0.23];

/// All hits for one document, in result order with duplicates removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHits {
    pub filename: String,
    pub hits: Vec<(u32, String)>,
}

/// Groups results by document filename, keeping first-seen order.
pub fn group_by_document(results: &[MatchResult]) -> Vec<DocumentHits> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<DocumentHits> = Vec::new();
    for result in results {
        let slot = *index.entry(result.pdf_filename.as_str()).or_insert_with(|| {
            groups.push(DocumentHits {
                filename: result.pdf_filename.clone(),
                hits: Vec::new(),
            });
            groups.len() - 1
        });
        let hit = (result.page_number, result.keyword.clone());
        if !groups[slot].hits.contains(&hit) {
            groups[slot].hits.push(hit);
        }
    }
    groups
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightFailure {
    pub filename: String,
    pub error: String,
}

/// Outcome of annotating every document of a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightBatch {
    pub job_id: String,
    pub files_processed: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub output_dir: PathBuf,
    pub failures: Vec<HighlightFailure>,
    pub highlights: usize,
}

pub struct HighlightEngine {
    storage: Arc<StorageManager>,
}

impl HighlightEngine {
    pub fn new(storage: Arc<StorageManager>) -> Self {
        Self { storage }
    }

    /// Annotates every document that produced results for `job_id`.
    pub fn highlight_job(&self, store: &dyn JobStore, job_id: &str) -> Result<HighlightBatch, HighlightError> {
        let results = store.list_results(job_id, PageRequest::all())?;
        self.highlight_documents(job_id, &group_by_document(&results.items))
    }

    /// Annotates each document in `documents`. A failing document is recorded
    /// and skipped; the rest of the batch still runs.
    pub fn highlight_documents(
        &self,
        job_id: &str,
        documents: &[DocumentHits],
    ) -> Result<HighlightBatch, HighlightError> {
        let span = info_span!("highlight", job_id);
        let _enter = span.enter();

        let dirs = self.storage.ensure_job_directories(job_id)?;
        let mut batch = HighlightBatch {
            job_id: job_id.to_string(),
            files_processed: 0,
            files_succeeded: 0,
            files_failed: 0,
            output_dir: dirs.annotated,
            failures: Vec::new(),
            highlights: 0,
        };

        for document in documents {
            batch.files_processed += 1;
            match self.highlight_one(job_id, document) {
                Ok(count) => {
                    batch.files_succeeded += 1;
                    batch.highlights += count;
                }
                Err(e) => {
                    warn!(filename = %document.filename, error = %e, "Failed to highlight document");
                    batch.files_failed += 1;
                    batch.failures.push(HighlightFailure {
                        filename: document.filename.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            processed = batch.files_processed,
            succeeded = batch.files_succeeded,
            failed = batch.files_failed,
            highlights = batch.highlights,
            "Highlighting finished"
        );
        Ok(batch)
    }

    fn highlight_one(&self, job_id: &str, document: &DocumentHits) -> Result<usize, HighlightError> {
        let source = self.storage.raw_pdf_path(job_id, &document.filename)?;
        let output = self.storage.annotated_pdf_path(job_id, &document.filename)?;
        highlight_file(&source, &output, &document.hits)
    }

    pub fn output_dir(&self, job_id: &str) -> Result<PathBuf, HighlightError> {
        Ok(self.storage.job_dir(StorageCategory::Annotated, job_id)?)
    }
}

/// Highlights `hits` in `source` and writes the result to `output`.
///
/// Returns the number of annotations added. The source file is not modified.
pub fn highlight_file(source: &Path, output: &Path, hits: &[(u32, String)]) -> Result<usize, HighlightError> {
    let mut doc = Document::load(source).map_err(|e| HighlightError::Load {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    let pages = doc.get_pages();

    let mut touched: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    let mut added = 0;
    for (page, keyword) in hits {
        let page_id = *pages.get(page).ok_or(HighlightError::PageOutOfRange {
            page: *page,
            page_count: pages.len(),
        })?;
        let quads = locate_text(&doc, page_id, keyword)?;
        for quad in &quads {
            add_highlight(&mut doc, page_id, quad, keyword)?;
        }
        if !quads.is_empty() {
            added += quads.len();
            let keywords = touched.entry(*page).or_default();
            if !keywords.contains(keyword) {
                keywords.push(keyword.clone());
            }
        }
    }

    let entries: Vec<OutlineEntry> = touched
        .iter()
        .filter_map(|(page, keywords)| {
            pages.get(page).map(|id| OutlineEntry {
                title: format!("Page {}: {}", page, keywords.join(", ")),
                page_id: *id,
            })
        })
        .collect();
    append_entries(&mut doc, &entries)?;

    doc.save(output).map_err(|e| HighlightError::Save {
        path: output.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(added)
}

fn real(v: f32) -> Object {
    Object::Real(v.into())
}

fn add_highlight(doc: &mut Document, page_id: ObjectId, quad: &Quad, keyword: &str) -> Result<(), HighlightError> {
    let annot_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Highlight",
        "Rect" => quad.bounds().into_iter().map(real).collect::<Vec<_>>(),
        "QuadPoints" => quad.flat().into_iter().map(real).collect::<Vec<_>>(),
        "C" => HIGHLIGHT_COLOR.into_iter().map(real).collect::<Vec<_>>(),
        "F" => 4_i64,
        "P" => page_id,
        "T" => Object::string_literal(ANNOTATION_AUTHOR),
        "Contents" => Object::string_literal(keyword),
    });

    // Annots may be inline on the page or an indirect array.
    let annots = doc
        .get_object(page_id)?
        .as_dict()?
        .get(b"Annots")
        .ok()
        .cloned();
    match annots {
        Some(Object::Reference(array_id)) => {
            doc.get_object_mut(array_id)?.as_array_mut()?.push(annot_id.into());
        }
        Some(Object::Array(mut items)) => {
            items.push(annot_id.into());
            doc.get_object_mut(page_id)?.as_dict_mut()?.set("Annots", items);
        }
        _ => {
            doc.get_object_mut(page_id)?
                .as_dict_mut()?
                .set("Annots", vec![Object::from(annot_id)]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::compose_text_pdf;
    use crate::storage::RetentionPolicy;
    use chrono::Utc;
    use tempfile::TempDir;

    fn result(filename: &str, page: u32, keyword: &str) -> MatchResult {
        MatchResult {
            id: 0,
            job_id: "job-1".to_string(),
            pdf_filename: filename.to_string(),
            page_number: page,
            keyword_id: 1,
            keyword: keyword.to_string(),
            snippet: String::new(),
            entities: String::new(),
            created_at: Utc::now(),
        }
    }

    fn annotations(doc: &Document, page: u32) -> Vec<String> {
        let page_id = *doc.get_pages().get(&page).unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let Ok(annots) = page.get(b"Annots") else {
            return Vec::new();
        };
        annots
            .as_array()
            .unwrap()
            .iter()
            .map(|a| {
                let dict = doc.get_object(a.as_reference().unwrap()).unwrap().as_dict().unwrap();
                match dict.get(b"Contents").unwrap() {
                    Object::String(bytes, _) => String::from_utf8_lossy(bytes).into_owned(),
                    _ => String::new(),
                }
            })
            .collect()
    }

    #[test]
    fn test_group_by_document_keeps_order_and_dedupes() {
        let results = vec![
            result("b.pdf", 2, "budget"),
            result("a.pdf", 1, "zoning"),
            result("b.pdf", 1, "budget"),
            result("b.pdf", 2, "budget"),
        ];
        let groups = group_by_document(&results);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].filename, "b.pdf");
        assert_eq!(groups[0].hits, vec![(2, "budget".to_string()), (1, "budget".to_string())]);
        assert_eq!(groups[1].hits, vec![(1, "zoning".to_string())]);
    }

    #[test]
    fn test_highlight_file_annotates_and_bookmarks() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("minutes.pdf");
        let output = dir.path().join("minutes_annotated.pdf");
        let bytes = compose_text_pdf(&["Budget review\nbudget approved", "Nothing here"]).unwrap();
        std::fs::write(&source, &bytes).unwrap();

        let added = highlight_file(&source, &output, &[(1, "budget".to_string())]).unwrap();
        assert_eq!(added, 2);

        let annotated = Document::load(&output).unwrap();
        assert_eq!(annotations(&annotated, 1), vec!["budget", "budget"]);
        assert!(annotations(&annotated, 2).is_empty());
        assert_eq!(
            outline_titles(&annotated).unwrap(),
            vec![("Page 1: budget".to_string(), vec![])]
        );

        // Source is untouched.
        assert_eq!(std::fs::read(&source).unwrap(), bytes);
    }

    #[test]
    fn test_keyword_absent_from_page_adds_nothing() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.pdf");
        let output = dir.path().join("a_annotated.pdf");
        std::fs::write(&source, compose_text_pdf(&["Call to order"]).unwrap()).unwrap();

        let added = highlight_file(&source, &output, &[(1, "zoning".to_string())]).unwrap();
        assert_eq!(added, 0);
        let annotated = Document::load(&output).unwrap();
        assert!(outline_titles(&annotated).unwrap().is_empty());
    }

    #[test]
    fn test_page_out_of_range() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.pdf");
        std::fs::write(&source, compose_text_pdf(&["one"]).unwrap()).unwrap();

        let err = highlight_file(&source, &dir.path().join("out.pdf"), &[(3, "one".to_string())]).unwrap_err();
        assert!(matches!(err, HighlightError::PageOutOfRange { page: 3, page_count: 1 }));
    }

    #[test]
    fn test_batch_continues_past_failures() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageManager::new(dir.path(), RetentionPolicy::default()));
        storage
            .save_raw_pdf("job-1", "good.pdf", &compose_text_pdf(&["zoning variance"]).unwrap())
            .unwrap();

        let engine = HighlightEngine::new(storage.clone());
        let documents = vec![
            DocumentHits {
                filename: "missing.pdf".to_string(),
                hits: vec![(1, "zoning".to_string())],
            },
            DocumentHits {
                filename: "good.pdf".to_string(),
                hits: vec![(1, "zoning".to_string())],
            },
        ];
        let batch = engine.highlight_documents("job-1", &documents).unwrap();

        assert_eq!(batch.files_processed, 2);
        assert_eq!(batch.files_succeeded, 1);
        assert_eq!(batch.files_failed, 1);
        assert_eq!(batch.failures[0].filename, "missing.pdf");
        assert_eq!(batch.highlights, 1);
        assert_eq!(batch.output_dir, engine.output_dir("job-1").unwrap());
        assert!(storage.annotated_pdf_path("job-1", "good.pdf").unwrap().exists());
    }
}
