//! Recursive-descent builder turning one syntax table into a
//! [`SyntaxStructure`].
//!
//! Tables are read as a flat run of cells, two per entry: the code line and
//! its descriptor. Nesting is encoded only by leading tabs on the code line,
//! so every container takes its depth from its first child and stops at the
//! first shallower line, which is left for the caller.
//!
//! Source tables sometimes repeat a cell verbatim (a transcription glitch).
//! Before moving past an entry the builder compares the descriptor cell with
//! the cell after it; when they match, one extra cell is skipped and a
//! [`Diagnostic::GlitchAmbiguity`] is recorded so the skip can be audited.
//! Empty cells count too, except where the following cell opens a row that
//! is blank throughout.
pub mod classify;

use crate::clean::{
    clean_argument, clean_comment, clean_condition, comment_body, indentation, strip_comments,
};
use crate::descriptor::Descriptor;
use crate::document::{Cells, TableGrid};
use crate::error::{Diagnostic, Diagnostics, TableError};
use crate::ir::{
    CommentLine, DoWhileBlock, ForBlock, IfBlock, Scope, ScopeId, StructureCall, SyntaxNode,
    SyntaxStructure, VariableDecl, WhileBlock,
};
use crate::semantics::VariableDescriptions;

use classify::{
    LineKind, classify, first_parenthesized, split_arguments, split_indices, starts_with_keyword,
    strip_closer,
};

/// Parse a table into a structure. Errors inside the table are recorded as a
/// [`Diagnostic::StructureFailure`]; whatever was parsed before the failure
/// is kept.
pub fn build_structure<T: TableGrid + ?Sized>(
    table: &T,
    descriptions: &VariableDescriptions,
    diagnostics: &mut Diagnostics,
) -> SyntaxStructure {
    let cells = Cells::new(table);
    let (name, parameters) = parse_header(cells.text(0).unwrap_or(""));
    log::debug!("building `{name}`");

    let mut builder = TreeBuilder {
        cells,
        descriptions,
        diagnostics,
        name,
        scopes: vec![Scope { depth: 0, parent: None }],
    };
    let mut children = Vec::new();
    let start = builder.advance(0);
    if let Err(error) = builder.parse_root(&mut children, start) {
        let structure = builder.name.clone();
        builder.diagnostics.push(Diagnostic::StructureFailure { structure, error });
    }

    let TreeBuilder { name, scopes, .. } = builder;
    SyntaxStructure { name, parameters, children, scopes }
}

/// `name( a, b )` → (`name`, [`a`, `b`]). A header without parentheses is a
/// structure without parameters.
pub fn parse_header(header: &str) -> (String, Vec<String>) {
    let header = header.replace('\u{a0}', " ");
    let Some(open) = header.find('(') else {
        return (header.trim().to_string(), Vec::new());
    };
    let name = header[..open].trim().to_string();
    let inner = first_parenthesized(&header[open..])
        .unwrap_or_else(|| header[open + 1..].trim_end_matches(')'));
    let parameters = split_arguments(inner)
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    (name, parameters)
}

struct TreeBuilder<'a, T: TableGrid + ?Sized> {
    cells: Cells<'a, T>,
    descriptions: &'a VariableDescriptions,
    diagnostics: &'a mut Diagnostics,
    name: String,
    scopes: Vec<Scope>,
}

type Parsed<T> = Result<T, TableError>;

impl<'a, T: TableGrid + ?Sized> TreeBuilder<'a, T> {
    // ---- cursor ----

    /// Index of the entry after the one at `index`, compensating for a
    /// duplicated cell.
    fn advance(&mut self, index: usize) -> usize {
        let next = self.cells.text(index + 1).map(str::trim);
        let after = self.cells.text(index + 2).map(str::trim);
        match (next, after) {
            (Some(a), Some(b)) if a == b && !self.cells.starts_blank_row(index + 2) => {
                self.diagnostics.push(Diagnostic::GlitchAmbiguity {
                    structure: self.name.clone(),
                    cell: index + 2,
                    text: b.to_string(),
                });
                index + 3
            }
            _ => index + 2,
        }
    }

    fn open_scope(&mut self, parent: ScopeId) -> ScopeId {
        let depth = self.scopes[parent.0].depth + 1;
        self.scopes.push(Scope { depth, parent: Some(parent) });
        ScopeId(self.scopes.len() - 1)
    }

    // ---- containers ----

    fn parse_root(&mut self, children: &mut Vec<SyntaxNode>, index: usize) -> Parsed<usize> {
        let first = (index..)
            .step_by(2)
            .map_while(|i| self.cells.text(i))
            .find(|raw| !raw.trim().is_empty());
        self.scopes[ScopeId::ROOT.0].depth = first.map(indentation).unwrap_or(0);
        self.parse_children(ScopeId::ROOT, children, index)
    }

    /// Body of a block opened at `index`: exactly one level deeper than the
    /// parent, or empty when the next line is not deeper at all.
    fn parse_block(&mut self, scope: ScopeId, children: &mut Vec<SyntaxNode>, index: usize) -> Parsed<usize> {
        let expected = self.scopes[scope.0].depth;
        let mut index = index;
        let raw = loop {
            let Some(raw) = self.cells.text(index) else { return Ok(index) };
            if !raw.trim().is_empty() {
                break raw;
            }
            index = self.advance(index);
        };
        let found = indentation(raw);
        if found < expected {
            return Ok(index);
        }
        if found > expected {
            return Err(TableError::Depth { expected, found, line: raw.trim().to_string() });
        }
        self.parse_children(scope, children, index)
    }

    fn parse_children(&mut self, scope: ScopeId, children: &mut Vec<SyntaxNode>, mut index: usize) -> Parsed<usize> {
        let depth = self.scopes[scope.0].depth;
        while let Some(raw) = self.cells.text(index) {
            if raw.trim().is_empty() {
                index = self.advance(index);
                continue;
            }
            let found = indentation(raw);
            if found < depth {
                return Ok(index);
            }
            if found > depth {
                return Err(TableError::Depth { expected: depth, found, line: raw.trim().to_string() });
            }

            let line = raw.trim();
            let code = strip_comments(line);
            if code.parse::<Descriptor>().is_ok() {
                return Err(TableError::MisalignedDescriptor { line: code });
            }
            let descriptor = self.cells.text(index + 1).unwrap_or("");
            let next = self.advance(index);

            index = match classify(&code) {
                LineKind::VariableDecl => {
                    children.push(self.variable(scope, &code, descriptor)?);
                    next
                }
                LineKind::StructureCall => {
                    children.push(self.call(scope, &code)?);
                    next
                }
                LineKind::Comment => {
                    let text = if code.is_empty() { comment_body(line) } else { line.to_string() };
                    children.push(SyntaxNode::Comment(CommentLine { owner: scope, text: clean_comment(&text) }));
                    next
                }
                LineKind::Closing => next,
                LineKind::If => {
                    let (condition, is_else_if, is_else) = parse_if(&code)?;
                    let mut block = IfBlock {
                        owner: scope,
                        scope: self.open_scope(scope),
                        condition,
                        is_else_if,
                        is_else,
                        children: Vec::new(),
                    };
                    let parsed = self.parse_block(block.scope, &mut block.children, next);
                    children.push(SyntaxNode::If(block));
                    parsed?
                }
                LineKind::While => {
                    let condition = parenthesized_condition(&code)?;
                    let mut block = WhileBlock {
                        owner: scope,
                        scope: self.open_scope(scope),
                        condition,
                        children: Vec::new(),
                    };
                    let parsed = self.parse_block(block.scope, &mut block.children, next);
                    children.push(SyntaxNode::While(block));
                    parsed?
                }
                LineKind::For => {
                    let (loop_variable, initial_value, break_condition, increment) = parse_for(&code)?;
                    let mut block = ForBlock {
                        owner: scope,
                        scope: self.open_scope(scope),
                        loop_variable,
                        initial_value,
                        break_condition,
                        increment,
                        children: Vec::new(),
                    };
                    let parsed = self.parse_block(block.scope, &mut block.children, next);
                    children.push(SyntaxNode::For(block));
                    parsed?
                }
                LineKind::Do => {
                    let mut block = DoWhileBlock {
                        owner: scope,
                        scope: self.open_scope(scope),
                        condition: String::new(),
                        children: Vec::new(),
                    };
                    let closed = self
                        .parse_block(block.scope, &mut block.children, next)
                        .and_then(|at| self.closing_while(at));
                    match closed {
                        Ok((condition, after)) => {
                            block.condition = condition;
                            children.push(SyntaxNode::DoWhile(block));
                            after
                        }
                        Err(error) => {
                            children.push(SyntaxNode::DoWhile(block));
                            return Err(error);
                        }
                    }
                }
            };
        }
        Ok(index)
    }

    /// The `} while( … )` line that terminates a `do` body.
    fn closing_while(&mut self, index: usize) -> Parsed<(String, usize)> {
        let Some(raw) = self.cells.text(index) else {
            return Err(TableError::StructureBoundary { keyword: "do", line: "<end of table>".into() });
        };
        let line = strip_comments(raw.trim());
        let rest = strip_closer(&line);
        if !starts_with_keyword(rest, "while") {
            return Err(TableError::StructureBoundary { keyword: "do", line });
        }
        let condition = parenthesized_condition(rest)?;
        Ok((condition, self.advance(index)))
    }

    // ---- leaves ----

    fn variable(&self, scope: ScopeId, code: &str, descriptor: &str) -> Parsed<SyntaxNode> {
        let (name, indices) = split_indices(code).ok_or_else(|| TableError::Brackets { line: code.to_string() })?;
        let descriptor: Descriptor = descriptor.parse()?;
        let description = self.descriptions.get(&name).cloned();
        Ok(SyntaxNode::VariableDecl(VariableDecl {
            owner: scope,
            name,
            indices: indices.iter().map(|i| clean_argument(i)).collect(),
            descriptor,
            description,
        }))
    }

    fn call(&self, scope: ScopeId, code: &str) -> Parsed<SyntaxNode> {
        let open = code.find('(').unwrap_or(code.len());
        let inner = first_parenthesized(code).ok_or_else(|| TableError::Brackets { line: code.to_string() })?;
        let arguments = split_arguments(inner)
            .into_iter()
            .map(clean_argument)
            .filter(|a| !a.is_empty())
            .collect();
        Ok(SyntaxNode::StructureCall(StructureCall {
            owner: scope,
            name: code[..open].trim().to_string(),
            arguments,
        }))
    }
}

// ---- opener bodies ----

fn parenthesized_condition(code: &str) -> Parsed<String> {
    first_parenthesized(code)
        .map(clean_condition)
        .ok_or_else(|| TableError::Condition { line: code.to_string() })
}

/// (`condition`, `is_else_if`, `is_else`)
fn parse_if(code: &str) -> Parsed<(Option<String>, bool, bool)> {
    let text = strip_closer(code);
    if let Some(rest) = text.strip_prefix("else") {
        let rest = rest.trim_start();
        if starts_with_keyword(rest, "if") {
            return Ok((Some(parenthesized_condition(rest)?), true, false));
        }
        return Ok((None, false, true));
    }
    if starts_with_keyword(text, "if") {
        return Ok((Some(parenthesized_condition(text)?), false, false));
    }
    Err(TableError::StructureBoundary { keyword: "if", line: code.to_string() })
}

/// `for( i = 0; i < n; i++ )` → (`i`, `0`, `i < n`, `i++`)
fn parse_for(code: &str) -> Parsed<(String, String, String, String)> {
    let inner = first_parenthesized(code).ok_or_else(|| TableError::Condition { line: code.to_string() })?;
    let boundary = || TableError::StructureBoundary { keyword: "for", line: code.to_string() };
    let parts: Vec<&str> = inner.split(';').collect();
    let [init, condition, increment] = parts.as_slice() else { return Err(boundary()) };
    let (variable, initial) = init.split_once('=').ok_or_else(boundary)?;
    let variable = clean_argument(variable);
    if variable.is_empty() {
        return Err(boundary());
    }
    Ok((variable, clean_argument(initial), clean_condition(condition), clean_argument(increment)))
}
