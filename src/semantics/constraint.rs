use std::fmt;

use serde::Serialize;

use crate::clean::clean_prose;

/// Legal-value restriction pulled out of a `shall be` sentence. Bounds are
/// kept as source text; they are frequently expressions over other elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum VariableConstraint {
    Range { min: String, max: String },
    GreaterThan(String),
    GreaterOrEqual(String),
    LessThan(String),
    LessOrEqual(String),
    EqualTo(String),
    #[default]
    None,
}

impl fmt::Display for VariableConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableConstraint::Range { min, max } => write!(f, "range [{min}, {max}]"),
            VariableConstraint::GreaterThan(v) => write!(f, "> {v}"),
            VariableConstraint::GreaterOrEqual(v) => write!(f, ">= {v}"),
            VariableConstraint::LessThan(v) => write!(f, "< {v}"),
            VariableConstraint::LessOrEqual(v) => write!(f, "<= {v}"),
            VariableConstraint::EqualTo(v) => write!(f, "== {v}"),
            VariableConstraint::None => f.write_str("unconstrained"),
        }
    }
}

/// Outcome of scanning one description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(VariableConstraint),
    /// The clause restates cross-picture consistency; nothing to record.
    Ignored,
    /// First clause that matched no known phrasing.
    Unresolved(String),
    /// No `shall be` sentence about the variable.
    Absent,
}

// Phrasings that constrain consistency rather than value.
const IGNORABLE: &[&str] = &[
    "the same in all",
    "the same for all",
    "the same value",
    "identical in all",
];

/// Scan `text` for `<name> shall be …` (case-insensitive, optional array
/// subscripts between the name and the verb) and resolve the first clause
/// that matches a known phrasing.
pub fn resolve_constraint(name: &str, text: &str) -> Resolution {
    let cleaned = clean_prose(text);
    let lower = cleaned.to_ascii_lowercase();
    let needle = name.to_ascii_lowercase();
    if needle.is_empty() {
        return Resolution::Absent;
    }

    let mut first_unresolved = None;
    let mut saw_ignorable = false;
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&needle) {
        let start = from + pos;
        from = start + needle.len();
        if !is_boundary_before(&lower, start) {
            continue;
        }
        let Some(clause_start) = shall_be_after(&lower, from) else { continue };
        let clause_end = sentence_end(&lower, clause_start);
        let clause = cleaned[clause_start..clause_end].trim();
        let clause_lower = &lower[clause_start..clause_end];
        match parse_clause(clause, clause_lower.trim()) {
            Some(constraint) => return Resolution::Resolved(constraint),
            None if is_ignorable(clause_lower) => saw_ignorable = true,
            None => {
                first_unresolved.get_or_insert_with(|| clause.to_string());
            }
        }
    }

    match (first_unresolved, saw_ignorable) {
        (Some(clause), _) => Resolution::Unresolved(clause),
        (None, true) => Resolution::Ignored,
        (None, false) => Resolution::Absent,
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_boundary_before(text: &str, at: usize) -> bool {
    text[..at].chars().next_back().is_none_or(|c| !is_identifier_char(c))
}

/// After the variable name: skip whitespace and `[ … ]` subscripts, then
/// expect `shall be `. Returns the byte offset just past it.
fn shall_be_after(lower: &str, mut at: usize) -> Option<usize> {
    const VERB: &str = "shall be ";
    if lower[at..].chars().next().is_some_and(is_identifier_char) {
        return None;
    }
    loop {
        let rest = &lower[at..];
        let trimmed = rest.trim_start();
        at += rest.len() - trimmed.len();
        if trimmed.starts_with('[') {
            let close = matching_bracket(trimmed)?;
            at += close + 1;
            continue;
        }
        return trimmed.starts_with(VERB).then(|| at + VERB.len());
    }
}

fn matching_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// A `.` followed by whitespace or end of text, or a `;`.
fn sentence_end(text: &str, from: usize) -> usize {
    let bytes = text.as_bytes();
    for i in from..bytes.len() {
        match bytes[i] {
            b';' => return i,
            b'.' if bytes.get(i + 1).is_none_or(|b| b.is_ascii_whitespace()) => return i,
            _ => {}
        }
    }
    bytes.len()
}

fn is_ignorable(clause_lower: &str) -> bool {
    IGNORABLE.iter().any(|p| clause_lower.contains(p))
}

/// Ordered phrase table; `clause` and `lower` are the same text with
/// case as written and lowercased.
fn parse_clause(clause: &str, lower: &str) -> Option<VariableConstraint> {
    const RANGE: &str = "in the range of ";
    if lower.starts_with(RANGE) {
        let body = &lower[RANGE.len()..];
        let to = body.find(" to ")?;
        let inclusive = body.rfind(" inclusive")?;
        let min = clause[RANGE.len()..RANGE.len() + to].trim();
        let max = clause[RANGE.len() + to + 4..RANGE.len() + inclusive]
            .trim()
            .trim_end_matches(',')
            .trim();
        if min.is_empty() || max.is_empty() {
            return None;
        }
        return Some(VariableConstraint::Range { min: min.to_string(), max: max.to_string() });
    }

    let phrases: [(&[&str], fn(String) -> VariableConstraint); 5] = [
        (&["greater than or equal to ", "greater then or equal to "], VariableConstraint::GreaterOrEqual),
        (&["greater than ", "greater then "], VariableConstraint::GreaterThan),
        (&["less than or equal to ", "less then or equal to "], VariableConstraint::LessOrEqual),
        (&["less than ", "less then "], VariableConstraint::LessThan),
        (&["equal to "], VariableConstraint::EqualTo),
    ];
    for (prefixes, make) in phrases {
        for &prefix in prefixes {
            if lower.starts_with(prefix) {
                let value = clause[prefix.len()..].trim().trim_end_matches(',').trim();
                if value.is_empty() {
                    return None;
                }
                return Some(make(value.to_string()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn resolved(name: &str, text: &str) -> VariableConstraint {
        match resolve_constraint(name, text) {
            Resolution::Resolved(c) => c,
            other => panic!("expected a constraint, got {other:?}"),
        }
    }

    #[test]
    fn inclusive_range() {
        assert_eq!(
            resolved("x", "x shall be in the range of 0 to 15, inclusive."),
            VariableConstraint::Range { min: "0".into(), max: "15".into() }
        );
    }

    #[test]
    fn equal_to() {
        assert_eq!(resolved("y", "y shall be equal to 0."), VariableConstraint::EqualTo("0".into()));
    }

    #[rstest]
    #[case("z shall be greater than 0.", VariableConstraint::GreaterThan("0".into()))]
    #[case("z shall be greater then 2.", VariableConstraint::GreaterThan("2".into()))]
    #[case("z shall be less than 64.", VariableConstraint::LessThan("64".into()))]
    #[case("z shall be less then 8.", VariableConstraint::LessThan("8".into()))]
    #[case("z shall be greater than or equal to 1.", VariableConstraint::GreaterOrEqual("1".into()))]
    #[case("z shall be less than or equal to sps_max_x.", VariableConstraint::LessOrEqual("sps_max_x".into()))]
    fn comparison_phrases(#[case] text: &str, #[case] expected: VariableConstraint) {
        assert_eq!(resolved("z", text), expected);
    }

    #[test]
    fn value_of_prefix_and_case_folding() {
        assert_eq!(
            resolved("sps_id", "The value of SPS_ID shall be in the range of 0 to 15, inclusive. More."),
            VariableConstraint::Range { min: "0".into(), max: "15".into() }
        );
    }

    #[test]
    fn subscripted_name_and_unicode_minus() {
        assert_eq!(
            resolved("num_x", "num_x[ i ]\u{a0}shall be in the range of 0 to MaxX \u{2212} 1, inclusive."),
            VariableConstraint::Range { min: "0".into(), max: "MaxX - 1".into() }
        );
    }

    #[test]
    fn longer_names_do_not_match_suffixes() {
        assert_eq!(resolve_constraint("x_minus1", "sps_x_minus1 shall be equal to 0."), Resolution::Absent);
        assert_eq!(resolve_constraint("sps_x", "sps_x_minus1 shall be equal to 0."), Resolution::Absent);
    }

    #[test]
    fn decimal_point_does_not_end_the_sentence() {
        assert_eq!(resolved("r", "r shall be less than 0.5 times w."), VariableConstraint::LessThan("0.5 times w".into()));
    }

    #[test]
    fn consistency_clauses_are_ignored() {
        assert_eq!(
            resolve_constraint("v", "The value of v shall be the same in all pictures of a layer."),
            Resolution::Ignored
        );
    }

    #[test]
    fn unknown_phrasing_is_unresolved() {
        assert_eq!(
            resolve_constraint("v", "v shall be a multiple of 8."),
            Resolution::Unresolved("a multiple of 8".into())
        );
    }

    #[test]
    fn later_resolvable_clause_wins_over_unknown_one() {
        let text = "v shall be a multiple of 8. Otherwise v shall be equal to 2.";
        assert_eq!(resolved("v", text), VariableConstraint::EqualTo("2".into()));
    }
}
