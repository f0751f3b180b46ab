//! Source generation from lowered records.
//!
//! ```ignore
//! let mut cg = Codegen::new(Target::Cpp);
//! cg.emit(&records, &config.output.groups);
//! for unit in cg.into_units() { /* write unit.file_name */ }
//! ```
//!
//! Records are distributed over output groups first; each backend then
//! writes one shared prelude plus a declaration and a definition file per
//! group.
pub mod cpp;
pub mod rust;

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{OutputGroup, Target};
use crate::lower::Record;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedUnit {
    pub file_name: String,
    pub contents: String,
}

/// Records emitted together, in definition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group<'r> {
    pub name: String,
    pub records: Vec<&'r Record>,
    /// Groups whose declarations this group needs, configured ones first.
    pub includes: Vec<String>,
}

pub(crate) trait Backend {
    fn prelude(&self, groups: &[Group<'_>]) -> EmittedUnit;
    fn declarations(&self, group: &Group<'_>) -> EmittedUnit;
    fn definitions(&self, group: &Group<'_>, owners: &IndexMap<&str, &str>) -> EmittedUnit;
}

pub struct Codegen {
    target: Target,
    units: Vec<EmittedUnit>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Codegen {
    pub fn new(target: Target) -> Self {
        Self { target, units: Vec::new() }
    }

    pub fn emit(&mut self, records: &[Record], configured: &[OutputGroup]) {
        let groups = plan_groups(records, configured);
        let owners = owners(&groups);
        let backend: Box<dyn Backend> = match self.target {
            Target::Cpp => Box::new(cpp::Cpp),
            Target::Rust => Box::new(rust::Rust),
        };
        self.units.push(backend.prelude(&groups));
        for group in &groups {
            log::debug!("emitting group `{}` ({} records)", group.name, group.records.len());
            self.units.push(backend.declarations(group));
            self.units.push(backend.definitions(group, &owners));
        }
    }

    pub fn into_units(self) -> Vec<EmittedUnit> {
        self.units
    }
}

pub fn write_units(directory: &Path, units: &[EmittedUnit]) -> anyhow::Result<()> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("creating output directory {}", directory.display()))?;
    for unit in units {
        let path = directory.join(&unit.file_name);
        std::fs::write(&path, &unit.contents).with_context(|| format!("writing {}", path.display()))?;
    }
    log::info!("wrote {} files to {}", units.len(), directory.display());
    Ok(())
}

/// One group per record unless groups are configured; then every record not
/// claimed by a configured group lands in `other`.
pub fn plan_groups<'r>(records: &'r [Record], configured: &[OutputGroup]) -> Vec<Group<'r>> {
    let mut groups: Vec<(String, Vec<&'r Record>, Vec<String>)> = if configured.is_empty() {
        records.iter().map(|r| (r.name.clone(), vec![r], Vec::new())).collect()
    } else {
        let mut claimed = HashSet::new();
        let mut groups: Vec<_> = configured
            .iter()
            .map(|g| {
                for name in &g.structures {
                    if !records.iter().any(|r| &r.name == name) {
                        log::warn!("group `{}` names unknown structure `{name}`", g.name);
                    }
                }
                let members: Vec<&Record> = records
                    .iter()
                    .filter(|r| g.structures.contains(&r.name) && claimed.insert(r.name.as_str()))
                    .collect();
                (g.name.clone(), members, g.includes.clone())
            })
            .collect();
        let rest: Vec<&Record> = records.iter().filter(|r| !claimed.contains(r.name.as_str())).collect();
        if !rest.is_empty() {
            groups.push(("other".to_string(), rest, Vec::new()));
        }
        groups
    };

    let owners: IndexMap<&str, &str> = groups
        .iter()
        .flat_map(|(name, members, _)| members.iter().map(move |r| (r.name.as_str(), name.as_str())))
        .collect();
    let derived: Vec<Vec<String>> = groups
        .iter()
        .map(|(name, members, _)| {
            members
                .iter()
                .flat_map(|r| r.instances.iter())
                .filter(|i| i.resolved && !i.indirect)
                .filter_map(|i| owners.get(i.structure.as_str()).copied())
                .filter(|owner| owner != name)
                .map(str::to_string)
                .collect()
        })
        .collect();

    for ((_, members, includes), derived) in groups.iter_mut().zip(derived) {
        let merged: IndexSet<String> = includes.drain(..).chain(derived).collect();
        includes.extend(merged);
        *members = definition_order(members);
    }
    groups
        .into_iter()
        .map(|(name, records, includes)| Group { name, records, includes })
        .collect()
}

/// Structure name → name of the group that defines it.
pub fn owners<'g>(groups: &'g [Group<'_>]) -> IndexMap<&'g str, &'g str> {
    groups
        .iter()
        .flat_map(|g| g.records.iter().map(move |r| (r.name.as_str(), g.name.as_str())))
        .collect()
}

/// Records reordered so that every directly embedded instance type is
/// defined before its user. Indirect instances never constrain the order.
fn definition_order<'r>(records: &[&'r Record]) -> Vec<&'r Record> {
    fn visit<'r>(index: usize, records: &[&'r Record], done: &mut Vec<bool>, out: &mut Vec<&'r Record>) {
        if done[index] {
            return;
        }
        done[index] = true;
        for instance in records[index].instances.iter().filter(|i| !i.indirect) {
            if let Some(dep) = records.iter().position(|r| r.name == instance.structure) {
                visit(dep, records, done, out);
            }
        }
        out.push(records[index]);
    }
    let mut done = vec![false; records.len()];
    let mut out = Vec::with_capacity(records.len());
    for index in 0..records.len() {
        visit(index, records, &mut done, &mut out);
    }
    out
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Indented line buffer.
pub(crate) struct Writer {
    out: String,
    level: usize,
    unit: &'static str,
}

impl Writer {
    pub(crate) fn new(unit: &'static str) -> Self {
        Self { out: String::new(), level: 0, unit }
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.level {
                self.out.push_str(self.unit);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        self.out.push('\n');
    }

    pub(crate) fn indent(&mut self) {
        self.level += 1;
    }

    pub(crate) fn dedent(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

/// Rewrites every standalone identifier for which `rename` returns a
/// replacement. Member accesses (`a.b`) and identifiers glued to a number
/// (`0x1F`) are left alone.
pub(crate) fn rewrite_identifiers(expr: &str, rename: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut last = 0;
    for m in IDENT.find_iter(expr) {
        let before = expr[..m.start()].chars().next_back();
        let glued = before.is_some_and(|c| c == '.' || c.is_ascii_alphanumeric());
        out.push_str(&expr[last..m.start()]);
        match rename(m.as_str()).filter(|_| !glued) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(m.as_str()),
        }
        last = m.end();
    }
    out.push_str(&expr[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::Instance;

    fn record(name: &str, calls: &[(&str, bool)]) -> Record {
        Record {
            name: name.into(),
            parameters: vec![],
            fields: vec![],
            instances: calls
                .iter()
                .map(|(target, indirect)| Instance {
                    field: format!("{target}_instance"),
                    structure: target.to_string(),
                    indirect: *indirect,
                    resolved: true,
                })
                .collect(),
            body: vec![],
        }
    }

    fn summary(groups: &[Group<'_>]) -> Vec<(String, Vec<String>, Vec<String>)> {
        groups
            .iter()
            .map(|g| (g.name.clone(), g.records.iter().map(|r| r.name.clone()).collect(), g.includes.clone()))
            .collect()
    }

    #[test]
    fn default_grouping_is_one_group_per_structure() {
        let records = vec![record("sps", &[("ptl", false)]), record("ptl", &[])];
        let groups = plan_groups(&records, &[]);
        assert_eq!(
            summary(&groups),
            vec![
                ("sps".into(), vec!["sps".into()], vec!["ptl".into()]),
                ("ptl".into(), vec!["ptl".into()], vec![]),
            ]
        );
    }

    #[test]
    fn configured_groups_collect_the_rest_into_other() {
        let records = vec![
            record("seq", &[("ptl", false), ("vui", false)]),
            record("extra", &[("seq", true)]),
            record("ptl", &[]),
            record("vui", &[]),
        ];
        let configured = vec![
            OutputGroup { name: "sps".into(), structures: vec!["seq".into(), "vui".into()], includes: vec!["common_defs".into()] },
            OutputGroup { name: "ptl".into(), structures: vec!["ptl".into()], includes: vec![] },
        ];
        let groups = plan_groups(&records, &configured);
        assert_eq!(
            summary(&groups),
            vec![
                ("sps".into(), vec!["vui".into(), "seq".into()], vec!["common_defs".into(), "ptl".into()]),
                ("ptl".into(), vec!["ptl".into()], vec![]),
                ("other".into(), vec!["extra".into()], vec![]),
            ]
        );
    }

    #[test]
    fn identifiers_are_rewritten_outside_member_access() {
        let rename = |name: &str| (name == "num").then(|| format!("self.{name}"));
        assert_eq!(rewrite_identifiers("i < num && x.num > 0x1F", rename), "i < self.num && x.num > 0x1F");
        assert_eq!(rewrite_identifiers("num[ i ] - 1", rename), "self.num[ i ] - 1");
    }

    #[test]
    fn writer_indents_non_empty_lines() {
        let mut w = Writer::new("  ");
        w.line("a {");
        w.indent();
        w.line("b;");
        w.line("");
        w.dedent();
        w.line("}");
        assert_eq!(w.finish(), "a {\n  b;\n\n}\n");
    }
}
