//! Variable semantics: walks the prose region of the document and builds a
//! name → description table, resolving value constraints and stated bit
//! lengths along the way.
//!
//! A description starts at a paragraph whose leading run is emphasized; the
//! emphasized text is the variable name. Following paragraphs extend the
//! running description until the next emphasized lead or the end marker.
pub mod constraint;

use std::rc::Rc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::clean::{clean_prose, normalize_whitespace};
use crate::document::Paragraph;
use crate::error::{Diagnostic, Diagnostics};

pub use constraint::{Resolution, VariableConstraint, resolve_constraint};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDescription {
    pub name: String,
    pub description: String,
    pub constraint: VariableConstraint,
    /// Width expression from a "the length of … is … bits" sentence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_length: Option<String>,
}

/// Resolved descriptions keyed by base name (no array suffix). Read-only
/// once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VariableDescriptions {
    entries: IndexMap<String, Rc<VariableDescription>>,
}

impl VariableDescriptions {
    /// Lookup by name; `x[ i ][ j ]` finds `x`.
    pub fn get(&self, name: &str) -> Option<&Rc<VariableDescription>> {
        self.entries.get(base_name(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableDescription> {
        self.entries.values().map(|rc| rc.as_ref())
    }
}

impl FromIterator<VariableDescription> for VariableDescriptions {
    /// Last writer wins on repeated names.
    fn from_iter<I: IntoIterator<Item = VariableDescription>>(iter: I) -> Self {
        let mut entries = IndexMap::new();
        for d in iter {
            entries.insert(d.name.clone(), Rc::new(d));
        }
        Self { entries }
    }
}

pub fn base_name(name: &str) -> &str {
    name.split('[').next().unwrap_or(name).trim()
}

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

static LENGTH_SENTENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bthe length of (?:the )?([a-z_][a-z0-9_]*)(?:\s*\[[^\]]*\])*(?: syntax element)? is ([^.;]+?) bits\b",
    )
    .unwrap()
});

// ————————————————————————————————————————————————————————————————————————————
// RESOLVER
// ————————————————————————————————————————————————————————————————————————————

/// Build the lookup table from the paragraphs strictly between the
/// `start` and `end` marker paragraphs.
pub fn resolve_descriptions<'p, I>(
    paragraphs: I,
    start: &str,
    end: &str,
    diagnostics: &mut Diagnostics,
) -> VariableDescriptions
where
    I: IntoIterator<Item = &'p Paragraph>,
{
    let start = normalize_whitespace(start);
    let end = normalize_whitespace(end);

    let mut raw: Vec<(String, String)> = Vec::new();
    let mut recording = false;
    for paragraph in paragraphs {
        let text = paragraph.text();
        let marker_text = normalize_whitespace(&text);
        if !recording {
            recording = is_heading(&marker_text, &start);
            continue;
        }
        if is_heading(&marker_text, &end) {
            break;
        }
        match emphasized_name(paragraph) {
            Some(name) => raw.push((name, text)),
            None => {
                if let Some((_, body)) = raw.last_mut() {
                    if !marker_text.is_empty() {
                        body.push('\n');
                        body.push_str(&text);
                    }
                }
            }
        }
    }
    if !recording {
        log::warn!("semantics start marker `{start}` not found; no variable descriptions");
    } else if raw.is_empty() {
        log::warn!("semantics region `{start}` .. `{end}` holds no variable descriptions");
    }

    let lengths = stated_lengths(raw.iter().map(|(_, text)| text.as_str()));

    let descriptions: VariableDescriptions = raw
        .into_iter()
        .map(|(name, description)| {
            let constraint = match resolve_constraint(&name, &description) {
                Resolution::Resolved(c) => c,
                Resolution::Unresolved(clause) => {
                    diagnostics.push(Diagnostic::UnresolvedConstraint { variable: name.clone(), clause });
                    VariableConstraint::None
                }
                Resolution::Ignored | Resolution::Absent => VariableConstraint::None,
            };
            let bit_length = lengths.get(&name).cloned();
            VariableDescription { name, description, constraint, bit_length }
        })
        .collect();

    log::info!("resolved {} variable descriptions", descriptions.len());
    descriptions
}

/// `text` is the `marker` heading itself, possibly continued by a title.
/// A table-of-contents entry (marker followed only by a page number) is not.
fn is_heading(text: &str, marker: &str) -> bool {
    let Some(rest) = text.strip_prefix(marker) else { return false };
    if rest.is_empty() {
        return true;
    }
    if !rest.starts_with(char::is_whitespace) {
        return false;
    }
    let rest = rest.trim();
    let leader = rest.trim_end_matches(|c: char| c.is_ascii_digit());
    let page_reference = leader.len() < rest.len()
        && leader.trim_end_matches(|c: char| c == '.' || c == '\u{2026}' || c.is_whitespace()).is_empty();
    !page_reference
}

/// Concatenated leading emphasized runs, up to the first plain run or the
/// first whitespace inside an emphasized run. Only identifier-like names
/// count; bold headings and similar stay plain text.
fn emphasized_name(paragraph: &Paragraph) -> Option<String> {
    let mut name = String::new();
    for run in paragraph.runs.iter().filter(|r| !r.text.is_empty()) {
        if !run.bold {
            break;
        }
        let text = if name.is_empty() { run.text.trim_start() } else { run.text.as_str() };
        match text.find(char::is_whitespace) {
            Some(ws) => {
                name.push_str(&text[..ws]);
                break;
            }
            None => name.push_str(text),
        }
    }
    let base = base_name(&name);
    IDENTIFIER.is_match(base).then(|| base.to_string())
}

/// First "the length of X is E bits" statement per variable, across all
/// descriptions.
fn stated_lengths<'t>(texts: impl Iterator<Item = &'t str>) -> IndexMap<String, String> {
    let mut lengths = IndexMap::new();
    for text in texts {
        let cleaned = clean_prose(text);
        for caps in LENGTH_SENTENCE.captures_iter(&cleaned) {
            let name = caps[1].to_string();
            let expr = normalize_whitespace(&caps[2]);
            lengths.entry(name).or_insert(expr);
        }
    }
    lengths
}
