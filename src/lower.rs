//! Lowering: syntax trees → flat records ready for code generation.
//!
//! Every variable read anywhere in a structure becomes one field of its
//! record; control flow is kept as a statement tree that refers to those
//! fields by name. Call targets become owned instances, boxed when the
//! target can reach back to the caller.
use std::collections::{HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};

use crate::descriptor::Descriptor;
use crate::error::{Diagnostic, Diagnostics};
use crate::ir::{SyntaxNode, SyntaxStructure, VariableDecl};
use crate::semantics::VariableConstraint;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarTy {
    Bool,
    Unsigned,
    Signed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTy {
    pub scalar: ScalarTy,
    /// Nesting of growable sequences around the scalar.
    pub dimensions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOp {
    Flag,
    /// Width expression, a literal count or a stated length.
    Bits(String),
    /// `u(v)` without a stated width; emitted as a placeholder.
    UnknownBits,
    UnsignedExpGolomb,
    SignedExpGolomb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: FieldTy,
    pub constraint: VariableConstraint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Member name, `<structure>_instance`.
    pub field: String,
    pub structure: String,
    /// Heap-allocated so that mutually recursive records stay finite.
    pub indirect: bool,
    /// `false` when no recorded table defines the target.
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Read { field: String, indices: Vec<String>, op: ReadOp },
    Parse { instance: String, structure: String, indirect: bool, arguments: Vec<String> },
    /// `condition: None` is a plain `else`; `chained` marks `else if`.
    If { condition: Option<String>, chained: bool, body: Vec<Stmt> },
    While { condition: String, body: Vec<Stmt> },
    DoWhile { condition: String, body: Vec<Stmt> },
    For { variable: String, initial: String, condition: String, increment: String, body: Vec<Stmt> },
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub parameters: Vec<String>,
    pub fields: Vec<Field>,
    pub instances: Vec<Instance>,
    pub body: Vec<Stmt>,
}

impl FieldTy {
    pub fn of(descriptor: Descriptor, dimensions: usize) -> Self {
        let scalar = match descriptor {
            _ if descriptor.bits() == Some(1) => ScalarTy::Bool,
            Descriptor::SignedExpGolomb => ScalarTy::Signed,
            _ => ScalarTy::Unsigned,
        };
        Self { scalar, dimensions }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REFERENCE GRAPH
// ————————————————————————————————————————————————————————————————————————————

/// Structure → distinct call targets, over every recorded structure.
#[derive(Debug, Default)]
pub struct ReferenceGraph {
    edges: IndexMap<String, IndexSet<String>>,
}

impl ReferenceGraph {
    pub fn new(structures: &[SyntaxStructure]) -> Self {
        let mut edges: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for s in structures {
            let targets = edges.entry(s.name.clone()).or_default();
            s.visit(&mut |node| {
                if let SyntaxNode::StructureCall(call) = node {
                    targets.insert(call.name.clone());
                }
            });
        }
        Self { edges }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Whether a path of one or more calls leads from `from` to `to`.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            let Some(targets) = self.edges.get(current) else { continue };
            for target in targets {
                if target == to {
                    return true;
                }
                if seen.insert(target.as_str()) {
                    queue.push_back(target.as_str());
                }
            }
        }
        false
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LOWERING
// ————————————————————————————————————————————————————————————————————————————

pub fn lower_structures(structures: &[SyntaxStructure], diagnostics: &mut Diagnostics) -> Vec<Record> {
    let graph = ReferenceGraph::new(structures);
    structures.iter().map(|s| lower_structure(s, &graph, diagnostics)).collect()
}

pub fn lower_structure(structure: &SyntaxStructure, graph: &ReferenceGraph, diagnostics: &mut Diagnostics) -> Record {
    let mut lowering = Lowering {
        structure: &structure.name,
        graph,
        diagnostics,
        fields: IndexMap::new(),
        instances: IndexMap::new(),
        reported: HashSet::new(),
    };
    let body = lowering.nodes(&structure.children);
    Record {
        name: structure.name.clone(),
        parameters: structure.parameters.clone(),
        fields: lowering.fields.into_values().collect(),
        instances: lowering.instances.into_values().collect(),
        body,
    }
}

struct Lowering<'a> {
    structure: &'a str,
    graph: &'a ReferenceGraph,
    diagnostics: &'a mut Diagnostics,
    fields: IndexMap<String, Field>,
    instances: IndexMap<String, Instance>,
    /// Fields already reported, so each problem is logged once per record.
    reported: HashSet<String>,
}

impl Lowering<'_> {
    fn nodes(&mut self, nodes: &[SyntaxNode]) -> Vec<Stmt> {
        nodes.iter().map(|n| self.node(n)).collect()
    }

    fn node(&mut self, node: &SyntaxNode) -> Stmt {
        match node {
            SyntaxNode::VariableDecl(v) => self.read(v),
            SyntaxNode::StructureCall(call) => {
                let instance = self.instance(&call.name);
                Stmt::Parse {
                    instance: instance.field.clone(),
                    structure: instance.structure.clone(),
                    indirect: instance.indirect,
                    arguments: call.arguments.clone(),
                }
            }
            SyntaxNode::If(b) => Stmt::If {
                condition: b.condition.clone(),
                chained: b.is_else_if,
                body: self.nodes(&b.children),
            },
            SyntaxNode::While(w) => Stmt::While { condition: w.condition.clone(), body: self.nodes(&w.children) },
            SyntaxNode::DoWhile(d) => Stmt::DoWhile { condition: d.condition.clone(), body: self.nodes(&d.children) },
            SyntaxNode::For(l) => Stmt::For {
                variable: l.loop_variable.clone(),
                initial: l.initial_value.clone(),
                condition: l.break_condition.clone(),
                increment: l.increment.clone(),
                body: self.nodes(&l.children),
            },
            SyntaxNode::Comment(c) => Stmt::Comment(c.text.clone()),
        }
    }

    fn read(&mut self, v: &VariableDecl) -> Stmt {
        let ty = FieldTy::of(v.descriptor, v.indices.len());
        self.hoist(v, ty);
        let op = match v.descriptor {
            _ if ty.scalar == ScalarTy::Bool => ReadOp::Flag,
            Descriptor::FixedCode(n) | Descriptor::UnsignedFixed(n) => ReadOp::Bits(n.to_string()),
            Descriptor::UnsignedExpGolomb => ReadOp::UnsignedExpGolomb,
            Descriptor::SignedExpGolomb => ReadOp::SignedExpGolomb,
            Descriptor::UnsignedVariable => match v.description.as_ref().and_then(|d| d.bit_length.clone()) {
                Some(width) => ReadOp::Bits(width),
                None => {
                    if self.reported.insert(format!("length:{}", v.name)) {
                        self.diagnostics.push(Diagnostic::UnknownLength {
                            structure: self.structure.to_string(),
                            variable: v.name.clone(),
                        });
                    }
                    ReadOp::UnknownBits
                }
            },
        };
        Stmt::Read { field: v.name.clone(), indices: v.indices.clone(), op }
    }

    /// First occurrence fixes the scalar type; later ones can only add
    /// dimensions.
    fn hoist(&mut self, v: &VariableDecl, ty: FieldTy) {
        match self.fields.get_mut(&v.name) {
            Some(field) => {
                field.ty.dimensions = field.ty.dimensions.max(ty.dimensions);
                if field.ty.scalar != ty.scalar && self.reported.insert(format!("conflict:{}", v.name)) {
                    self.diagnostics.push(Diagnostic::FieldConflict {
                        structure: self.structure.to_string(),
                        field: v.name.clone(),
                    });
                }
                if field.constraint == VariableConstraint::None {
                    if let Some(d) = &v.description {
                        field.constraint = d.constraint.clone();
                    }
                }
            }
            None => {
                let constraint = v.description.as_ref().map(|d| d.constraint.clone()).unwrap_or_default();
                self.fields.insert(v.name.clone(), Field { name: v.name.clone(), ty, constraint });
            }
        }
    }

    fn instance(&mut self, target: &str) -> &Instance {
        if !self.instances.contains_key(target) {
            let resolved = self.graph.contains(target);
            if !resolved {
                self.diagnostics.push(Diagnostic::UnresolvedCall {
                    structure: self.structure.to_string(),
                    target: target.to_string(),
                });
            }
            let indirect = target == self.structure || self.graph.reaches(target, self.structure);
            self.instances.insert(
                target.to_string(),
                Instance { field: format!("{target}_instance"), structure: target.to_string(), indirect, resolved },
            );
        }
        &self.instances[target]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Table;
    use crate::semantics::{VariableDescription, VariableDescriptions};
    use crate::syntax::build_structure;

    fn structure(rows: &[(&str, &str)], descriptions: &VariableDescriptions) -> SyntaxStructure {
        let table = Table::from_rows(rows.iter().map(|(a, b)| vec![a.to_string(), b.to_string()]));
        let mut diagnostics = Diagnostics::new();
        let s = build_structure(&table, descriptions, &mut diagnostics);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        s
    }

    fn plain(rows: &[(&str, &str)]) -> SyntaxStructure {
        structure(rows, &VariableDescriptions::default())
    }

    #[test]
    fn nested_reads_are_hoisted_with_widened_dimensions() {
        let s = plain(&[
            ("foo( )", "Descriptor"),
            ("a_flag", "u(1)"),
            ("if( a_flag )", ""),
            ("\tb_val", "ue(v)"),
            ("for( i = 0; i < 3; i++ )", ""),
            ("\tb_val[ i ]", "ue(v)"),
            ("\tc_val[ i ]", "se(v)"),
            ("d_code", "f(8)"),
        ]);
        let mut diagnostics = Diagnostics::new();
        let records = lower_structures(&[s], &mut diagnostics);
        let fields: Vec<_> = records[0].fields.iter().map(|f| (f.name.as_str(), f.ty.scalar, f.ty.dimensions)).collect();
        assert_eq!(
            fields,
            vec![
                ("a_flag", ScalarTy::Bool, 0),
                ("b_val", ScalarTy::Unsigned, 1),
                ("c_val", ScalarTy::Signed, 1),
                ("d_code", ScalarTy::Unsigned, 0),
            ]
        );
        assert!(diagnostics.is_empty());
        match &records[0].body[3] {
            Stmt::Read { field, op, .. } => {
                assert_eq!(field, "d_code");
                assert_eq!(op, &ReadOp::Bits("8".into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tables_lower_to_records() {
        let foo = plain(&[("foo( a, b )", "Descriptor"), ("bar_baz", "u(4)"), ("qux( a )", "")]);
        let qux = plain(&[("qux( n )", "Descriptor"), ("do {", ""), ("\tx", "u(1)"), ("} while( cond )", "")]);
        let mut diagnostics = Diagnostics::new();
        let records = lower_structures(&[foo, qux], &mut diagnostics);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");

        let foo = &records[0];
        assert_eq!(foo.parameters, vec!["a", "b"]);
        assert_eq!(foo.fields[0].name, "bar_baz");
        assert_eq!(foo.fields[0].ty, FieldTy { scalar: ScalarTy::Unsigned, dimensions: 0 });
        assert_eq!(
            foo.body,
            vec![
                Stmt::Read { field: "bar_baz".into(), indices: vec![], op: ReadOp::Bits("4".into()) },
                Stmt::Parse {
                    instance: "qux_instance".into(),
                    structure: "qux".into(),
                    indirect: false,
                    arguments: vec!["a".into()],
                },
            ]
        );

        let qux = &records[1];
        assert_eq!(qux.fields[0].name, "x");
        assert_eq!(qux.fields[0].ty, FieldTy { scalar: ScalarTy::Bool, dimensions: 0 });
        assert_eq!(
            qux.body,
            vec![Stmt::DoWhile {
                condition: "cond".into(),
                body: vec![Stmt::Read { field: "x".into(), indices: vec![], op: ReadOp::Flag }],
            }]
        );
    }

    #[test]
    fn conflicting_scalar_types_are_reported_once() {
        let s = plain(&[
            ("foo( )", "Descriptor"),
            ("if( x )", ""),
            ("\tv_val", "u(1)"),
            ("else", ""),
            ("\tv_val", "se(v)"),
            ("v_val", "se(v)"),
        ]);
        let mut diagnostics = Diagnostics::new();
        let records = lower_structures(&[s], &mut diagnostics);
        assert_eq!(records[0].fields[0].ty.scalar, ScalarTy::Bool);
        assert_eq!(
            diagnostics.iter().cloned().collect::<Vec<_>>(),
            vec![Diagnostic::FieldConflict { structure: "foo".into(), field: "v_val".into() }]
        );
    }

    #[test]
    fn variable_length_uses_stated_width_or_placeholder() {
        let descriptions: VariableDescriptions = [VariableDescription {
            name: "poc_lsb".into(),
            description: String::new(),
            constraint: VariableConstraint::None,
            bit_length: Some("log2_max_lsb + 4".into()),
        }]
        .into_iter()
        .collect();
        let s = structure(
            &[("foo( )", "Descriptor"), ("poc_lsb", "u(v)"), ("mystery", "u(v)"), ("mystery", "u(v)")],
            &descriptions,
        );
        let mut diagnostics = Diagnostics::new();
        let records = lower_structures(&[s], &mut diagnostics);
        let ops: Vec<_> = records[0]
            .body
            .iter()
            .map(|st| match st {
                Stmt::Read { op, .. } => op.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(ops, vec![ReadOp::Bits("log2_max_lsb + 4".into()), ReadOp::UnknownBits, ReadOp::UnknownBits]);
        assert_eq!(
            diagnostics.iter().cloned().collect::<Vec<_>>(),
            vec![Diagnostic::UnknownLength { structure: "foo".into(), variable: "mystery".into() }]
        );
    }

    #[test]
    fn recursive_and_undefined_calls() {
        let a = plain(&[("a( )", "Descriptor"), ("b( 1 )", ""), ("c( )", ""), ("c( )", "")]);
        let b = plain(&[("b( n )", "Descriptor"), ("a( )", ""), ("b( n )", "")]);
        let c = plain(&[("c( )", "Descriptor"), ("missing( )", "")]);
        let mut diagnostics = Diagnostics::new();
        let records = lower_structures(&[a, b, c], &mut diagnostics);

        let summary = |r: &Record| -> Vec<(String, bool, bool)> {
            r.instances.iter().map(|i| (i.structure.clone(), i.indirect, i.resolved)).collect()
        };
        assert_eq!(summary(&records[0]), vec![("b".into(), true, true), ("c".into(), false, true)]);
        assert_eq!(summary(&records[1]), vec![("a".into(), true, true), ("b".into(), true, true)]);
        assert_eq!(summary(&records[2]), vec![("missing".into(), false, false)]);
        assert_eq!(records[0].body.len(), 3);
        assert_eq!(
            diagnostics.iter().cloned().collect::<Vec<_>>(),
            vec![Diagnostic::UnresolvedCall { structure: "c".into(), target: "missing".into() }]
        );
    }

    #[test]
    fn reachability_follows_paths() {
        let a = plain(&[("a( )", "Descriptor"), ("b( )", "")]);
        let b = plain(&[("b( )", "Descriptor"), ("c( )", "")]);
        let c = plain(&[("c( )", "Descriptor"), ("d_val", "u(2)")]);
        let graph = ReferenceGraph::new(&[a, b, c]);
        assert!(graph.reaches("a", "c"));
        assert!(!graph.reaches("c", "a"));
        assert!(!graph.reaches("a", "a"));
    }
}
