//! Bookmark insertion for annotated documents.

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

use crate::error::HighlightError;

/// One bookmark pointing at a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    pub page_id: ObjectId,
}

fn dict_mut(doc: &mut Document, id: ObjectId) -> Result<&mut Dictionary, HighlightError> {
    Ok(doc.get_object_mut(id)?.as_dict_mut()?)
}

fn reference(dict: &Dictionary, key: &[u8]) -> Option<ObjectId> {
    dict.get(key).ok().and_then(|o| o.as_reference().ok())
}

fn catalog_id(doc: &Document) -> Result<ObjectId, HighlightError> {
    Ok(doc.trailer.get(b"Root")?.as_reference()?)
}

/// Finds the outline root, creating an empty one when the document has none.
fn outline_root(doc: &mut Document) -> Result<ObjectId, HighlightError> {
    let catalog = catalog_id(doc)?;
    if let Some(id) = reference(doc.get_object(catalog)?.as_dict()?, b"Outlines") {
        return Ok(id);
    }
    let root = doc.add_object(dictionary! {
        "Type" => "Outlines",
        "Count" => 0_i64,
    });
    dict_mut(doc, catalog)?.set("Outlines", root);
    Ok(root)
}

fn bump_count(doc: &mut Document, id: ObjectId, added: i64) -> Result<(), HighlightError> {
    let dict = dict_mut(doc, id)?;
    let current = dict.get(b"Count").ok().and_then(|c| c.as_i64().ok()).unwrap_or(0);
    // Negative counts mark a closed item; keep it closed.
    let updated = if current < 0 { current - added } else { current + added };
    dict.set("Count", updated);
    Ok(())
}

/// Appends `entries` to the outline.
///
/// Entries are nested under the last existing top-level item when there is
/// one, otherwise they become top-level items themselves.
pub fn append_entries(doc: &mut Document, entries: &[OutlineEntry]) -> Result<(), HighlightError> {
    if entries.is_empty() {
        return Ok(());
    }

    let root = outline_root(doc)?;
    let parent = reference(doc.get_object(root)?.as_dict()?, b"Last").unwrap_or(root);
    let mut previous = reference(doc.get_object(parent)?.as_dict()?, b"Last");

    let ids: Vec<ObjectId> = entries.iter().map(|_| doc.new_object_id()).collect();
    for (i, (entry, id)) in entries.iter().zip(&ids).enumerate() {
        let mut item = dictionary! {
            "Title" => Object::string_literal(entry.title.as_str()),
            "Parent" => parent,
            "Dest" => vec![entry.page_id.into(), "Fit".into()],
        };
        if let Some(prev) = previous {
            item.set("Prev", prev);
        }
        if let Some(next) = ids.get(i + 1) {
            item.set("Next", *next);
        }
        doc.objects.insert(*id, Object::Dictionary(item));
        previous = Some(*id);
    }

    let first_new = ids[0];
    let last_new = ids[ids.len() - 1];

    let parent_dict = dict_mut(doc, parent)?;
    let old_last = reference(parent_dict, b"Last");
    if reference(parent_dict, b"First").is_none() {
        parent_dict.set("First", first_new);
    }
    parent_dict.set("Last", last_new);
    if let Some(old_last) = old_last {
        dict_mut(doc, old_last)?.set("Next", first_new);
    }

    let added = entries.len() as i64;
    bump_count(doc, parent, added)?;
    if parent != root {
        bump_count(doc, root, added)?;
    }
    Ok(())
}

/// Reads the titles of top-level items and their children, for inspection.
pub fn outline_titles(doc: &Document) -> Result<Vec<(String, Vec<String>)>, HighlightError> {
    let catalog = catalog_id(doc)?;
    let Some(root) = reference(doc.get_object(catalog)?.as_dict()?, b"Outlines") else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for item in siblings(doc, root)? {
        let children = siblings(doc, item)?
            .into_iter()
            .map(|child| title(doc, child))
            .collect::<Result<Vec<_>, _>>()?;
        out.push((title(doc, item)?, children));
    }
    Ok(out)
}

fn siblings(doc: &Document, parent: ObjectId) -> Result<Vec<ObjectId>, HighlightError> {
    let mut ids = Vec::new();
    let mut cursor = reference(doc.get_object(parent)?.as_dict()?, b"First");
    while let Some(id) = cursor {
        if ids.contains(&id) {
            return Err(HighlightError::Structure("outline contains a cycle".to_string()));
        }
        ids.push(id);
        cursor = reference(doc.get_object(id)?.as_dict()?, b"Next");
    }
    Ok(ids)
}

fn title(doc: &Document, id: ObjectId) -> Result<String, HighlightError> {
    match doc.get_object(id)?.as_dict()?.get(b"Title") {
        Ok(Object::String(bytes, _)) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        _ => Ok(String::new()),
    }
}
