//! Normalisation of text copied out of the document. Table cells and prose
//! carry non-breaking spaces, typographic minus signs and padding inside
//! brackets that have to go before anything is matched or emitted.

const NBSP: char = '\u{a0}';

fn is_minus_variant(c: char) -> bool {
    matches!(c, '\u{2212}' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}')
}

fn ascii_minus(text: &str) -> String {
    text.chars().map(|c| if is_minus_variant(c) { '-' } else { c }).collect()
}

fn collapse_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = false;
    for c in text.chars() {
        if c == ' ' {
            if !last_space {
                out.push(c);
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

/// Leading tab count; the only indentation signal the tables carry.
pub fn indentation(text: &str) -> usize {
    text.chars().take_while(|c| *c == '\t').count()
}

/// Whitespace runs (any kind) collapsed to one ASCII space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace()).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ")
}

/// Removes every `/* … */`. An unterminated comment is left in place.
pub fn strip_comments(text: &str) -> String {
    let mut out = text.to_string();
    while let Some(start) = out.find("/*") {
        let Some(len) = out[start + 2..].find("*/") else { break };
        out.replace_range(start..start + 2 + len + 2, "");
    }
    out.trim().to_string()
}

/// Text of a `/* … */` comment line, markers removed.
pub fn comment_body(text: &str) -> String {
    let t = text.trim();
    let t = t.strip_prefix("/*").unwrap_or(t);
    let t = t.strip_suffix("*/").unwrap_or(t);
    t.trim().to_string()
}

pub fn clean_prose(text: &str) -> String {
    ascii_minus(&text.replace(NBSP, " "))
}

pub fn clean_condition(text: &str) -> String {
    let text = text
        .trim()
        .replace("=\u{a0}=", "==")
        .replace("|\u{a0}|", "||")
        .replace("[\u{a0}", "[")
        .replace("\u{a0}]", "]")
        .replace(NBSP, " ")
        .replace(['\n', '\t'], "");
    collapse_spaces(&ascii_minus(&text)).trim().to_string()
}

pub fn clean_argument(text: &str) -> String {
    let text = text
        .trim()
        .replace("[\u{a0}", "[")
        .replace("\u{a0}]", "]")
        .replace(NBSP, " ");
    ascii_minus(&text).trim().to_string()
}

pub fn clean_comment(text: &str) -> String {
    let text = text
        .trim()
        .replace("=\u{a0}=", "==")
        .replace("[\u{a0}", "[")
        .replace("\u{a0}]", "]")
        .replace(NBSP, " ")
        .replace('\n', " ")
        .replace('\t', "")
        .replace("( ", "(")
        .replace(" )", ")");
    collapse_spaces(&ascii_minus(&text)).trim().to_string()
}
