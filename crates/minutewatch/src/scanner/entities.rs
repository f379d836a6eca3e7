//! Named-entity extraction over match snippets.
//!
//! The capability is built once at startup and handed to the scanner. When
//! no extractor can be constructed the scanner still runs and records empty
//! entity strings.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityLabel {
    Date,
    Money,
    Person,
    Org,
}

impl EntityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::Date => "DATE",
            EntityLabel::Money => "MONEY",
            EntityLabel::Person => "PERSON",
            EntityLabel::Org => "ORG",
        }
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
}

/// Anything that can pull entities out of a short text window.
pub trait EntityExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, text: &str) -> Vec<Entity>;
}

/// Injected entity capability.
pub enum EntityCapability {
    Available(Box<dyn EntityExtractor>),
    Unavailable { reason: String },
}

impl EntityCapability {
    /// Capability backed by [`PatternEntityExtractor`].
    pub fn pattern() -> Self {
        EntityCapability::Available(Box::new(PatternEntityExtractor::new()))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        EntityCapability::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, EntityCapability::Available(_))
    }

    /// Extracts and serializes entities. Empty when unavailable.
    pub fn extract_serialized(&self, text: &str) -> String {
        match self {
            EntityCapability::Available(extractor) => serialize_entities(&extractor.extract(text)),
            EntityCapability::Unavailable { .. } => String::new(),
        }
    }
}

impl fmt::Debug for EntityCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityCapability::Available(extractor) => {
                f.debug_tuple("Available").field(&extractor.name()).finish()
            }
            EntityCapability::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

/// Serializes entities as `text (LABEL)` items joined by `, `.
pub fn serialize_entities(entities: &[Entity]) -> String {
    entities
        .iter()
        .map(|e| format!("{} ({})", e.text, e.label))
        .collect::<Vec<_>>()
        .join(", ")
}

static RE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}|\d{1,2}/\d{1,2}/\d{2,4}|\d{4}-\d{2}-\d{2})\b",
    )
    .unwrap()
});

static RE_MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?\d{1,3}(?:,\d{3})*(?:\.\d{2})?(?:\s(?:thousand|million|billion)\b)?")
        .unwrap()
});

static RE_PERSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:Mr|Mrs|Ms|Dr|Mayor|Councilmember|Councilman|Councilwoman|Commissioner|Supervisor|Alderman|Alderwoman|Trustee|Chairman|Chairwoman|Chair)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\b",
    )
    .unwrap()
});

static RE_ORG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:[A-Z][a-z]+\s+)+(?:Council|Commission|Board|Committee|Department|Authority|District|Agency)\b",
    )
    .unwrap()
});

/// Regex-based extractor for dates, amounts, titled names and public bodies.
#[derive(Debug, Default)]
pub struct PatternEntityExtractor;

impl PatternEntityExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl EntityExtractor for PatternEntityExtractor {
    fn name(&self) -> &str {
        "pattern"
    }

    fn extract(&self, text: &str) -> Vec<Entity> {
        let patterns: [(&Regex, EntityLabel); 4] = [
            (&*RE_PERSON, EntityLabel::Person),
            (&*RE_ORG, EntityLabel::Org),
            (&*RE_MONEY, EntityLabel::Money),
            (&*RE_DATE, EntityLabel::Date),
        ];

        let mut spans: Vec<(usize, usize, EntityLabel)> = Vec::new();
        for (re, label) in patterns {
            for m in re.find_iter(text) {
                spans.push((m.start(), m.end(), label));
            }
        }
        // Earliest first; on ties the longer span wins.
        spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut entities: Vec<Entity> = Vec::new();
        let mut covered_to = 0;
        for (start, end, label) in spans {
            if start < covered_to {
                continue;
            }
            covered_to = end;
            let entity = Entity {
                text: text[start..end].split_whitespace().collect::<Vec<_>>().join(" "),
                label,
            };
            if !entities.contains(&entity) {
                entities.push(entity);
            }
        }
        entities
    }
}
