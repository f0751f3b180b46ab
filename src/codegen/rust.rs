//! Rust backend: `mod.rs` with the `BitReader` trait and the growable slot
//! helper, then `<group>.rs` (types) and `<group>_parse.rs` (parse
//! routines) per output group.
//!
//! Expressions are copied from the tables as written; only references to
//! record fields are qualified with `self.`.
use std::collections::HashSet;

use indexmap::IndexMap;

use super::{Backend, EmittedUnit, Group, Writer, rewrite_identifiers};
use crate::lower::{FieldTy, ReadOp, Record, ScalarTy, Stmt};
use crate::semantics::VariableConstraint;

pub struct Rust;

const PRELUDE: &str = r#"#![allow(
    non_camel_case_types,
    non_snake_case,
    unused_imports,
    unused_mut,
    unused_parens,
    unused_variables
)]

pub trait BitReader {
    fn read_flag(&mut self, name: &str) -> bool;
    fn read_bits(&mut self, name: &str, bits: u32) -> u32;
    fn read_unsigned_exp_golomb(&mut self, name: &str) -> u32;
    fn read_signed_exp_golomb(&mut self, name: &str) -> i32;
}

/// Element `index` of `items`, growing the sequence with defaults as needed.
pub fn slot<T: Default>(items: &mut Vec<T>, index: usize) -> &mut T {
    if items.len() <= index {
        items.resize_with(index + 1, T::default);
    }
    &mut items[index]
}
"#;

impl Backend for Rust {
    fn prelude(&self, groups: &[Group<'_>]) -> EmittedUnit {
        let mut w = Writer::new("    ");
        for line in PRELUDE.lines() {
            w.line(line);
        }
        for group in groups {
            w.blank();
            w.line(format!("pub mod {};", group.name));
            w.line(format!("mod {}_parse;", group.name));
            w.line(format!("pub use {}::*;", group.name));
        }
        EmittedUnit { file_name: "mod.rs".into(), contents: w.finish() }
    }

    fn declarations(&self, group: &Group<'_>) -> EmittedUnit {
        let mut w = Writer::new("    ");
        w.line("use super::*;");
        for record in &group.records {
            w.blank();
            w.line(format!("/// `{}({})`", record.name, record.parameters.join(", ")));
            w.line("#[derive(Debug, Clone, Default)]");
            w.line(format!("pub struct {} {{", record.name));
            w.indent();
            for field in &record.fields {
                if field.constraint != VariableConstraint::None {
                    w.line(format!("/// {}", field.constraint));
                }
                w.line(format!("pub {}: {},", field.name, type_name(field.ty)));
            }
            for instance in &record.instances {
                if !instance.resolved {
                    w.line(format!("// `{}` is not defined by any recorded table", instance.structure));
                }
                let ty = if instance.indirect {
                    format!("Option<Box<{}>>", instance.structure)
                } else {
                    instance.structure.clone()
                };
                w.line(format!("pub {}: {ty},", instance.field));
            }
            w.dedent();
            w.line("}");
        }
        EmittedUnit { file_name: format!("{}.rs", group.name), contents: w.finish() }
    }

    fn definitions(&self, group: &Group<'_>, _owners: &IndexMap<&str, &str>) -> EmittedUnit {
        let mut w = Writer::new("    ");
        w.line("use super::*;");
        for record in &group.records {
            let scope = Scope::new(record);
            let parameters: String = record.parameters.iter().map(|p| format!(", {p}: u32")).collect();
            w.blank();
            w.line(format!("impl {} {{", record.name));
            w.indent();
            w.line(format!("pub fn parse<R: BitReader + ?Sized>(&mut self, reader: &mut R{parameters}) {{"));
            w.indent();
            scope.statements(&mut w, &record.body);
            w.dedent();
            w.line("}");
            w.dedent();
            w.line("}");
        }
        EmittedUnit { file_name: format!("{}_parse.rs", group.name), contents: w.finish() }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn type_name(ty: FieldTy) -> String {
    let scalar = match ty.scalar {
        ScalarTy::Bool => "bool",
        ScalarTy::Unsigned => "u32",
        ScalarTy::Signed => "i32",
    };
    (0..ty.dimensions).fold(scalar.to_string(), |inner, _| format!("Vec<{inner}>"))
}

fn is_atom(expr: &str) -> bool {
    !expr.is_empty() && expr.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn cast(expr: &str, ty: &str) -> String {
    if is_atom(expr) { format!("{expr} as {ty}") } else { format!("({expr}) as {ty}") }
}

/// `i++` / `++i` / `i--` / `--i` → compound assignment; anything else is
/// taken as a statement.
fn increment_statement(increment: &str) -> String {
    let inc = increment.trim();
    let step = |name: &str, op: &str| format!("{} {op}= 1;", name.trim());
    if let Some(name) = inc.strip_suffix("++").or_else(|| inc.strip_prefix("++")) {
        return step(name, "+");
    }
    if let Some(name) = inc.strip_suffix("--").or_else(|| inc.strip_prefix("--")) {
        return step(name, "-");
    }
    format!("{inc};")
}

/// Names that resolve to `self` members inside one record's routine.
struct Scope {
    members: HashSet<String>,
}

impl Scope {
    fn new(record: &Record) -> Self {
        let parameters: HashSet<&str> = record.parameters.iter().map(String::as_str).collect();
        let members = record
            .fields
            .iter()
            .map(|f| f.name.clone())
            .chain(record.instances.iter().map(|i| i.field.clone()))
            .filter(|name| !parameters.contains(name.as_str()))
            .collect();
        Self { members }
    }

    fn expr(&self, expr: &str) -> String {
        rewrite_identifiers(expr, |name| self.members.contains(name).then(|| format!("self.{name}")))
    }

    fn statements(&self, w: &mut Writer, body: &[Stmt]) {
        for stmt in body {
            self.statement(w, stmt);
        }
    }

    fn block(&self, w: &mut Writer, head: String, body: &[Stmt]) {
        w.line(format!("{head} {{"));
        w.indent();
        self.statements(w, body);
        w.dedent();
        w.line("}");
    }

    fn statement(&self, w: &mut Writer, stmt: &Stmt) {
        match stmt {
            Stmt::Read { field, indices, op } => {
                let value = match op {
                    ReadOp::Flag => format!("reader.read_flag(\"{field}\")"),
                    ReadOp::Bits(width) if width.chars().all(|c| c.is_ascii_digit()) => {
                        format!("reader.read_bits(\"{field}\", {width})")
                    }
                    ReadOp::Bits(width) => {
                        format!("reader.read_bits(\"{field}\", {})", cast(&self.expr(width), "u32"))
                    }
                    ReadOp::UnknownBits => {
                        w.line(format!("// bit length of {field} is not stated in the document"));
                        format!("reader.read_bits(\"{field}\", unknown)")
                    }
                    ReadOp::UnsignedExpGolomb => format!("reader.read_unsigned_exp_golomb(\"{field}\")"),
                    ReadOp::SignedExpGolomb => format!("reader.read_signed_exp_golomb(\"{field}\")"),
                };
                if indices.is_empty() {
                    w.line(format!("self.{field} = {value};"));
                } else {
                    let target = indices.iter().fold(format!("&mut self.{field}"), |inner, index| {
                        format!("slot({inner}, {})", cast(&self.expr(index), "usize"))
                    });
                    w.line(format!("*{target} = {value};"));
                }
            }
            Stmt::Parse { instance, indirect, arguments, .. } => {
                let args: String = arguments.iter().map(|a| format!(", {}", cast(&self.expr(a), "u32"))).collect();
                if *indirect {
                    w.line(format!("self.{instance}.get_or_insert_with(Default::default).parse(reader{args});"));
                } else {
                    w.line(format!("self.{instance}.parse(reader{args});"));
                }
            }
            Stmt::If { condition, chained, body } => {
                let head = match (condition, chained) {
                    (Some(c), true) => format!("else if {}", self.expr(c)),
                    (Some(c), false) => format!("if {}", self.expr(c)),
                    (None, _) => "else".to_string(),
                };
                self.block(w, head, body);
            }
            Stmt::While { condition, body } => self.block(w, format!("while {}", self.expr(condition)), body),
            Stmt::DoWhile { condition, body } => {
                w.line("loop {");
                w.indent();
                self.statements(w, body);
                w.line(format!("if !({}) {{", self.expr(condition)));
                w.indent();
                w.line("break;");
                w.dedent();
                w.line("}");
                w.dedent();
                w.line("}");
            }
            Stmt::For { variable, initial, condition, increment, body } => {
                w.line("{");
                w.indent();
                w.line(format!("let mut {variable} = {};", self.expr(initial)));
                w.line(format!("while {} {{", self.expr(condition)));
                w.indent();
                self.statements(w, body);
                w.line(increment_statement(&self.expr(increment)));
                w.dedent();
                w.line("}");
                w.dedent();
                w.line("}");
            }
            Stmt::Comment(text) => w.line(format!("// {text}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{owners, plan_groups};
    use crate::lower::{Field, Instance};
    use rstest::rstest;

    fn record() -> Record {
        Record {
            name: "foo".into(),
            parameters: vec!["n".into()],
            fields: vec![
                Field {
                    name: "num_items".into(),
                    ty: FieldTy { scalar: ScalarTy::Unsigned, dimensions: 0 },
                    constraint: VariableConstraint::LessOrEqual("16".into()),
                },
                Field {
                    name: "item_flag".into(),
                    ty: FieldTy { scalar: ScalarTy::Bool, dimensions: 1 },
                    constraint: VariableConstraint::None,
                },
                Field {
                    name: "poc_lsb".into(),
                    ty: FieldTy { scalar: ScalarTy::Unsigned, dimensions: 0 },
                    constraint: VariableConstraint::None,
                },
            ],
            instances: vec![Instance {
                field: "foo_instance".into(),
                structure: "foo".into(),
                indirect: true,
                resolved: true,
            }],
            body: vec![
                Stmt::Read { field: "num_items".into(), indices: vec![], op: ReadOp::UnsignedExpGolomb },
                Stmt::For {
                    variable: "i".into(),
                    initial: "0".into(),
                    condition: "i < num_items".into(),
                    increment: "i++".into(),
                    body: vec![Stmt::Read {
                        field: "item_flag".into(),
                        indices: vec!["i".into()],
                        op: ReadOp::Flag,
                    }],
                },
                Stmt::Read { field: "poc_lsb".into(), indices: vec![], op: ReadOp::Bits("num_items + 4".into()) },
                Stmt::DoWhile {
                    condition: "n > 0".into(),
                    body: vec![Stmt::Parse {
                        instance: "foo_instance".into(),
                        structure: "foo".into(),
                        indirect: true,
                        arguments: vec!["n - 1".into()],
                    }],
                },
            ],
        }
    }

    fn emit(records: &[Record]) -> Vec<EmittedUnit> {
        let groups = plan_groups(records, &[]);
        let owners = owners(&groups);
        let mut units = vec![Rust.prelude(&groups)];
        for g in &groups {
            units.push(Rust.declarations(g));
            units.push(Rust.definitions(g, &owners));
        }
        units
    }

    #[test]
    fn struct_declaration() {
        let units = emit(&[record()]);
        assert_eq!(units[1].file_name, "foo.rs");
        assert_eq!(
            units[1].contents,
            "use super::*;\n\
             \n\
             /// `foo(n)`\n\
             #[derive(Debug, Clone, Default)]\n\
             pub struct foo {\n\
             \x20   /// <= 16\n\
             \x20   pub num_items: u32,\n\
             \x20   pub item_flag: Vec<bool>,\n\
             \x20   pub poc_lsb: u32,\n\
             \x20   pub foo_instance: Option<Box<foo>>,\n\
             }\n"
        );
    }

    #[test]
    fn parse_routine() {
        let units = emit(&[record()]);
        assert_eq!(units[2].file_name, "foo_parse.rs");
        let expected = [
            "use super::*;",
            "",
            "impl foo {",
            "    pub fn parse<R: BitReader + ?Sized>(&mut self, reader: &mut R, n: u32) {",
            "        self.num_items = reader.read_unsigned_exp_golomb(\"num_items\");",
            "        {",
            "            let mut i = 0;",
            "            while i < self.num_items {",
            "                *slot(&mut self.item_flag, i as usize) = reader.read_flag(\"item_flag\");",
            "                i += 1;",
            "            }",
            "        }",
            "        self.poc_lsb = reader.read_bits(\"poc_lsb\", (self.num_items + 4) as u32);",
            "        loop {",
            "            self.foo_instance.get_or_insert_with(Default::default).parse(reader, (n - 1) as u32);",
            "            if !(n > 0) {",
            "                break;",
            "            }",
            "        }",
            "    }",
            "}",
            "",
        ];
        assert_eq!(units[2].contents, expected.join("\n"));
    }

    #[test]
    fn module_file_declares_every_group() {
        let mut other = record();
        other.name = "bar".into();
        let units = emit(&[record(), other]);
        assert_eq!(units[0].file_name, "mod.rs");
        assert!(units[0].contents.contains("pub trait BitReader {\n"));
        assert!(units[0].contents.ends_with("pub mod foo;\nmod foo_parse;\npub use foo::*;\n\npub mod bar;\nmod bar_parse;\npub use bar::*;\n"));
    }

    #[rstest]
    #[case("i++", "i += 1;")]
    #[case("++j", "j += 1;")]
    #[case("k--", "k -= 1;")]
    #[case("i += 2", "i += 2;")]
    fn increments(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(increment_statement(input), expected);
    }
}
