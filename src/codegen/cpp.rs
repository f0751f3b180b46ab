//! C++ backend: `common.h` with the abstract `Reader`, then `<group>.h`
//! and `<group>.cpp` per output group.
use indexmap::{IndexMap, IndexSet};

use super::{Backend, EmittedUnit, Group, Writer};
use crate::lower::{FieldTy, ReadOp, Record, ScalarTy, Stmt};
use crate::semantics::VariableConstraint;

pub struct Cpp;

const COMMON: &str = r#"#pragma once

#include <cstddef>
#include <string>
#include <vector>

class Reader
{
public:
  virtual ~Reader() = default;

  virtual bool     readFlag(const std::string &name) = 0;
  virtual unsigned readBits(const std::string &name, unsigned nrBits) = 0;
  virtual unsigned readUnsignedExpGolomb(const std::string &name) = 0;
  virtual int      readSignedExpGolomb(const std::string &name) = 0;
};

// Element `index` of `items`, growing the vector as needed.
template <typename T>
typename std::vector<T>::reference slot(std::vector<T> &items, std::size_t index)
{
  if (items.size() <= index)
    items.resize(index + 1);
  return items[index];
}
"#;

impl Backend for Cpp {
    fn prelude(&self, _groups: &[Group<'_>]) -> EmittedUnit {
        EmittedUnit { file_name: "common.h".into(), contents: COMMON.to_string() }
    }

    fn declarations(&self, group: &Group<'_>) -> EmittedUnit {
        let mut w = Writer::new("  ");
        w.line("#pragma once");
        w.blank();
        w.line("#include \"common.h\"");
        w.blank();
        w.line("#include <memory>");
        w.line("#include <vector>");
        if !group.includes.is_empty() {
            w.blank();
            for include in &group.includes {
                w.line(format!("#include \"{include}.h\""));
            }
        }

        let forward: IndexSet<&str> = group
            .records
            .iter()
            .flat_map(|r| r.instances.iter())
            .filter(|i| i.indirect && i.resolved)
            .map(|i| i.structure.as_str())
            .collect();
        if !forward.is_empty() {
            w.blank();
            for name in forward {
                w.line(format!("class {name};"));
            }
        }

        for record in &group.records {
            w.blank();
            class_declaration(&mut w, record);
        }
        EmittedUnit { file_name: format!("{}.h", group.name), contents: w.finish() }
    }

    fn definitions(&self, group: &Group<'_>, owners: &IndexMap<&str, &str>) -> EmittedUnit {
        let mut w = Writer::new("  ");
        w.line(format!("#include \"{}.h\"", group.name));

        // Indirect members are only complete here.
        let completing: IndexSet<&str> = group
            .records
            .iter()
            .flat_map(|r| r.instances.iter())
            .filter(|i| i.indirect)
            .filter_map(|i| owners.get(i.structure.as_str()).copied())
            .filter(|owner| *owner != group.name && !group.includes.iter().any(|inc| inc == owner))
            .collect();
        if !completing.is_empty() {
            w.blank();
            for owner in completing {
                w.line(format!("#include \"{owner}.h\""));
            }
        }

        for record in &group.records {
            w.blank();
            w.line(format!("{0}::{0}() = default;", record.name));
            w.line(format!("{0}::~{0}() = default;", record.name));
            w.blank();
            w.line(format!("void {}::parse({})", record.name, parameter_list(record)));
            w.line("{");
            w.indent();
            statements(&mut w, &record.body);
            w.dedent();
            w.line("}");
        }
        EmittedUnit { file_name: format!("{}.cpp", group.name), contents: w.finish() }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn class_declaration(w: &mut Writer, record: &Record) {
    w.line(format!("class {}", record.name));
    w.line("{");
    w.line("public:");
    w.indent();
    w.line(format!("{}();", record.name));
    w.line(format!("~{}();", record.name));
    w.blank();
    w.line(format!("void parse({});", parameter_list(record)));
    if !record.fields.is_empty() || !record.instances.is_empty() {
        w.blank();
    }
    for field in &record.fields {
        let init = if field.ty.dimensions == 0 { " {}" } else { "" };
        let decl = format!("{} {}{init};", type_name(field.ty), field.name);
        match &field.constraint {
            VariableConstraint::None => w.line(decl),
            constraint => w.line(format!("{decl} // {constraint}")),
        }
    }
    for instance in &record.instances {
        if !instance.resolved {
            w.line(format!("// `{}` is not defined by any recorded table", instance.structure));
        }
        if instance.indirect {
            w.line(format!("std::unique_ptr<{}> {};", instance.structure, instance.field));
        } else {
            w.line(format!("{} {};", instance.structure, instance.field));
        }
    }
    w.dedent();
    w.line("};");
}

fn parameter_list(record: &Record) -> String {
    std::iter::once("Reader &reader".to_string())
        .chain(record.parameters.iter().map(|p| format!("int {p}")))
        .collect::<Vec<_>>()
        .join(", ")
}

fn type_name(ty: FieldTy) -> String {
    let scalar = match ty.scalar {
        ScalarTy::Bool => "bool",
        ScalarTy::Unsigned => "unsigned",
        ScalarTy::Signed => "int",
    };
    (0..ty.dimensions).fold(scalar.to_string(), |inner, _| format!("std::vector<{inner}>"))
}

fn statements(w: &mut Writer, body: &[Stmt]) {
    for stmt in body {
        statement(w, stmt);
    }
}

fn block(w: &mut Writer, head: String, body: &[Stmt]) {
    w.line(head);
    w.line("{");
    w.indent();
    statements(w, body);
    w.dedent();
    w.line("}");
}

fn statement(w: &mut Writer, stmt: &Stmt) {
    match stmt {
        Stmt::Read { field, indices, op } => {
            let target = indices
                .iter()
                .fold(format!("this->{field}"), |inner, index| format!("slot({inner}, {index})"));
            let value = match op {
                ReadOp::Flag => format!("reader.readFlag(\"{field}\")"),
                ReadOp::Bits(width) => format!("reader.readBits(\"{field}\", {width})"),
                ReadOp::UnknownBits => {
                    w.line(format!("// bit length of {field} is not stated in the document"));
                    format!("reader.readBits(\"{field}\", unknown)")
                }
                ReadOp::UnsignedExpGolomb => format!("reader.readUnsignedExpGolomb(\"{field}\")"),
                ReadOp::SignedExpGolomb => format!("reader.readSignedExpGolomb(\"{field}\")"),
            };
            w.line(format!("{target} = {value};"));
        }
        Stmt::Parse { instance, structure, indirect, arguments } => {
            let args: String = arguments.iter().map(|a| format!(", {a}")).collect();
            if *indirect {
                w.line(format!("if (!this->{instance})"));
                w.indent();
                w.line(format!("this->{instance} = std::make_unique<{structure}>();"));
                w.dedent();
                w.line(format!("this->{instance}->parse(reader{args});"));
            } else {
                w.line(format!("this->{instance}.parse(reader{args});"));
            }
        }
        Stmt::If { condition, chained, body } => {
            let head = match (condition, chained) {
                (Some(c), true) => format!("else if ({c})"),
                (Some(c), false) => format!("if ({c})"),
                (None, _) => "else".to_string(),
            };
            block(w, head, body);
        }
        Stmt::While { condition, body } => block(w, format!("while ({condition})"), body),
        Stmt::DoWhile { condition, body } => {
            w.line("do");
            w.line("{");
            w.indent();
            statements(w, body);
            w.dedent();
            w.line(format!("}} while ({condition});"));
        }
        Stmt::For { variable, initial, condition, increment, body } => {
            block(w, format!("for (int {variable} = {initial}; {condition}; {increment})"), body)
        }
        Stmt::Comment(text) => w.line(format!("// {text}")),
    }
}
