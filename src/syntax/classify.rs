//! Line classification and the small bracket parsers used on line bodies.
//!
//! Precedence is fixed: bare identifier, then call, then keyword openers.
//! An element literally named `forward_count` is therefore a variable and
//! never the start of a `for` loop.
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    VariableDecl,
    StructureCall,
    If,
    While,
    Do,
    For,
    /// Bare `}`.
    Closing,
    Comment,
}

const KEYWORDS: &[&str] = &["if", "else", "while", "do", "for"];

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9]*(?:_[a-z0-9]+)*$").unwrap());

/// `code` is a trimmed line with comments already stripped.
pub fn classify(code: &str) -> LineKind {
    if is_variable_line(code) {
        return LineKind::VariableDecl;
    }
    if is_call_line(code) {
        return LineKind::StructureCall;
    }
    if starts_with_keyword(code, "for") {
        return LineKind::For;
    }
    let after_closer = strip_closer(code);
    if starts_with_keyword(code, "if") || starts_with_keyword(after_closer, "else") {
        return LineKind::If;
    }
    if starts_with_keyword(code, "while") {
        return LineKind::While;
    }
    if starts_with_keyword(code, "do") {
        return LineKind::Do;
    }
    if !code.is_empty() && code.chars().all(|c| c == '}' || c.is_whitespace()) {
        return LineKind::Closing;
    }
    LineKind::Comment
}

pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text) && !KEYWORDS.contains(&text)
}

fn is_variable_line(code: &str) -> bool {
    let (base, rest) = match code.find('[') {
        Some(open) => (&code[..open], &code[open..]),
        None => (code, ""),
    };
    is_identifier(base.trim()) && (rest.is_empty() || rest.ends_with(']'))
}

fn is_call_line(code: &str) -> bool {
    let code = code.trim_end_matches(';').trim_end();
    let Some(open) = code.find('(') else { return false };
    is_identifier(code[..open].trim()) && code.ends_with(')')
}

pub fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.strip_prefix(keyword)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_'))
}

/// `} else` → `else`; anything else is returned unchanged.
pub fn strip_closer(text: &str) -> &str {
    text.strip_prefix('}').map(str::trim_start).unwrap_or(text)
}

/// Contents of the first balanced `( … )` group.
pub fn first_parenthesized(text: &str) -> Option<&str> {
    let open = text.find('(')?;
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open + 1..open + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// `name[ a ][ b[ c ] ]` → (`name`, [`a`, `b[ c ]`]). `None` when brackets
/// are unbalanced or something other than subscripts follows the name.
pub fn split_indices(text: &str) -> Option<(String, Vec<String>)> {
    let Some(open) = text.find('[') else {
        return Some((text.trim().to_string(), Vec::new()));
    };
    let name = text[..open].trim().to_string();
    let mut indices = Vec::new();
    let mut rest = &text[open..];
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Some((name, indices));
        }
        if !rest.starts_with('[') {
            return None;
        }
        let mut depth = 0usize;
        let mut close = None;
        for (i, c) in rest.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close = close?;
        indices.push(rest[1..close].to_string());
        rest = &rest[close + 1..];
    }
}

/// Split on commas that are not nested inside `()` or `[]`.
pub fn split_arguments(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                out.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&text[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("sps_video_parameter_set_id", LineKind::VariableDecl)]
    #[case("x", LineKind::VariableDecl)]
    #[case("ref_idx[ i ][ j ]", LineKind::VariableDecl)]
    #[case("forward_count", LineKind::VariableDecl)]
    #[case("double_flag", LineKind::VariableDecl)]
    #[case("profile_tier_level( 1, sps_max_sublayers_minus1 )", LineKind::StructureCall)]
    #[case("byte_alignment( )", LineKind::StructureCall)]
    #[case("for( i = 0; i < n; i++ )", LineKind::For)]
    #[case("for(i = 0; i < n; i++) {", LineKind::For)]
    #[case("if( a_flag ) {", LineKind::If)]
    #[case("} else if( b )", LineKind::If)]
    #[case("} else {", LineKind::If)]
    #[case("else", LineKind::If)]
    #[case("while( more_data( ) )", LineKind::While)]
    #[case("do {", LineKind::Do)]
    #[case("do", LineKind::Do)]
    #[case("}", LineKind::Closing)]
    #[case("} while( x )", LineKind::Comment)]
    #[case("NumEntries[ i ] = 0", LineKind::Comment)]
    #[case("ref_idx[ i ] = 0", LineKind::Comment)]
    #[case("Descriptor", LineKind::Comment)]
    fn classification_precedence(#[case] line: &str, #[case] expected: LineKind) {
        assert_eq!(classify(line), expected);
    }

    #[test]
    fn keywords_are_not_identifiers() {
        for kw in KEYWORDS {
            assert!(!is_identifier(kw));
        }
        assert!(is_identifier("do_it"));
        assert!(!is_identifier("Upper_case"));
        assert!(!is_identifier("trailing_"));
    }

    #[test]
    fn parenthesized_is_balanced() {
        assert_eq!(first_parenthesized("if( a && ( b || c ) ) {"), Some(" a && ( b || c ) "));
        assert_eq!(first_parenthesized("while( x"), None);
        assert_eq!(first_parenthesized("else"), None);
    }

    #[test]
    fn indices_are_extracted_in_order() {
        assert_eq!(
            split_indices("ref_idx[ i ][ list[ j ] ]"),
            Some(("ref_idx".to_string(), vec![" i ".to_string(), " list[ j ] ".to_string()]))
        );
        assert_eq!(split_indices("plain_name"), Some(("plain_name".to_string(), vec![])));
        assert_eq!(split_indices("broken[ i"), None);
        assert_eq!(split_indices("x[ i ] y"), None);
    }

    #[test]
    fn arguments_split_on_top_level_commas() {
        assert_eq!(split_arguments(" a, f( b, c ), d[ e, f ] "), vec![" a", " f( b, c )", " d[ e, f ] "]);
        assert_eq!(split_arguments(""), vec![""]);
    }
}
