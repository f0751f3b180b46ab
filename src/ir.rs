// Syntax tree for one document table. Built once, immutable afterwards.
//
// Containers own their children by value. Every node also records the scope
// it lives in as a `ScopeId` into the structure's scope arena; that handle is
// only used to recover depth when printing.
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::descriptor::Descriptor;
use crate::semantics::VariableDescription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ScopeId(pub usize);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    /// Leading-tab count shared by every child of the scope.
    pub depth: usize,
    pub parent: Option<ScopeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxStructure {
    pub name: String,
    pub parameters: Vec<String>,
    pub children: Vec<SyntaxNode>,
    /// Arena of scopes; index 0 is the structure root.
    pub scopes: Vec<Scope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum SyntaxNode {
    VariableDecl(VariableDecl),
    StructureCall(StructureCall),
    If(IfBlock),
    While(WhileBlock),
    DoWhile(DoWhileBlock),
    For(ForBlock),
    Comment(CommentLine),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableDecl {
    pub owner: ScopeId,
    pub name: String,
    /// One expression per `[ … ]`, outermost first.
    pub indices: Vec<String>,
    pub descriptor: Descriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Rc<VariableDescription>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureCall {
    pub owner: ScopeId,
    pub name: String,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IfBlock {
    pub owner: ScopeId,
    pub scope: ScopeId,
    /// `None` for a plain `else`.
    pub condition: Option<String>,
    pub is_else_if: bool,
    pub is_else: bool,
    pub children: Vec<SyntaxNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhileBlock {
    pub owner: ScopeId,
    pub scope: ScopeId,
    pub condition: String,
    pub children: Vec<SyntaxNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoWhileBlock {
    pub owner: ScopeId,
    pub scope: ScopeId,
    /// Read from the `} while( … )` line that closes the body.
    pub condition: String,
    pub children: Vec<SyntaxNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForBlock {
    pub owner: ScopeId,
    pub scope: ScopeId,
    pub loop_variable: String,
    pub initial_value: String,
    pub break_condition: String,
    pub increment: String,
    pub children: Vec<SyntaxNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentLine {
    pub owner: ScopeId,
    pub text: String,
}

impl SyntaxNode {
    pub fn owner(&self) -> ScopeId {
        match self {
            SyntaxNode::VariableDecl(n) => n.owner,
            SyntaxNode::StructureCall(n) => n.owner,
            SyntaxNode::If(n) => n.owner,
            SyntaxNode::While(n) => n.owner,
            SyntaxNode::DoWhile(n) => n.owner,
            SyntaxNode::For(n) => n.owner,
            SyntaxNode::Comment(n) => n.owner,
        }
    }

    pub fn children(&self) -> &[SyntaxNode] {
        match self {
            SyntaxNode::If(n) => &n.children,
            SyntaxNode::While(n) => &n.children,
            SyntaxNode::DoWhile(n) => &n.children,
            SyntaxNode::For(n) => &n.children,
            SyntaxNode::VariableDecl(_) | SyntaxNode::StructureCall(_) | SyntaxNode::Comment(_) => &[],
        }
    }
}

impl SyntaxStructure {
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Number of enclosing containers between `id` and the root.
    pub fn nesting(&self, id: ScopeId) -> usize {
        let mut level = 0;
        let mut current = self.scope(id).parent;
        while let Some(p) = current {
            level += 1;
            current = self.scope(p).parent;
        }
        level
    }

    /// Pre-order walk over the whole tree.
    pub fn visit<'s>(&'s self, f: &mut impl FnMut(&'s SyntaxNode)) {
        fn go<'s>(nodes: &'s [SyntaxNode], f: &mut impl FnMut(&'s SyntaxNode)) {
            for node in nodes {
                f(node);
                go(node.children(), f);
            }
        }
        go(&self.children, f);
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TREE DUMP
// ————————————————————————————————————————————————————————————————————————————

impl fmt::Display for SyntaxStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}({})", self.name, self.parameters.join(", "))?;
        for node in &self.children {
            self.fmt_node(f, node)?;
        }
        Ok(())
    }
}

impl SyntaxStructure {
    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, node: &SyntaxNode) -> fmt::Result {
        let pad = "  ".repeat(self.nesting(node.owner()) + 1);
        match node {
            SyntaxNode::VariableDecl(v) => {
                write!(f, "{pad}{}", v.name)?;
                for index in &v.indices {
                    write!(f, "[{index}]")?;
                }
                writeln!(f, " --> {}", v.descriptor)?;
            }
            SyntaxNode::StructureCall(c) => writeln!(f, "{pad}{}({})", c.name, c.arguments.join(", "))?,
            SyntaxNode::If(b) => match (&b.condition, b.is_else_if) {
                (Some(c), true) => writeln!(f, "{pad}else if({c})")?,
                (Some(c), false) => writeln!(f, "{pad}if({c})")?,
                (None, _) => writeln!(f, "{pad}else")?,
            },
            SyntaxNode::While(w) => writeln!(f, "{pad}while({})", w.condition)?,
            SyntaxNode::DoWhile(_) => writeln!(f, "{pad}do")?,
            SyntaxNode::For(l) => writeln!(
                f,
                "{pad}for({} = {}; {}; {})",
                l.loop_variable, l.initial_value, l.break_condition, l.increment
            )?,
            SyntaxNode::Comment(c) => writeln!(f, "{pad}// {}", c.text)?,
        }
        for child in node.children() {
            self.fmt_node(f, child)?;
        }
        if let SyntaxNode::DoWhile(d) = node {
            writeln!(f, "{pad}while({})", d.condition)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SyntaxStructure {
        let decl = VariableDecl {
            owner: ScopeId(1),
            name: "x_flag".into(),
            indices: vec!["i".into()],
            descriptor: Descriptor::UnsignedFixed(1),
            description: None,
        };
        let block = IfBlock {
            owner: ScopeId::ROOT,
            scope: ScopeId(1),
            condition: Some("a".into()),
            is_else_if: false,
            is_else: false,
            children: vec![SyntaxNode::VariableDecl(decl)],
        };
        SyntaxStructure {
            name: "foo".into(),
            parameters: vec!["a".into()],
            children: vec![SyntaxNode::If(block)],
            scopes: vec![Scope { depth: 0, parent: None }, Scope { depth: 1, parent: Some(ScopeId::ROOT) }],
        }
    }

    #[test]
    fn dump_indents_by_nesting() {
        assert_eq!(sample().to_string(), "foo(a)\n  if(a)\n    x_flag[i] --> u(1)\n");
    }

    #[test]
    fn visit_is_pre_order() {
        let s = sample();
        let mut kinds = Vec::new();
        s.visit(&mut |n| kinds.push(matches!(n, SyntaxNode::If(_))));
        assert_eq!(kinds, vec![true, false]);
        assert_eq!(s.nesting(ScopeId(1)), 1);
    }
}
