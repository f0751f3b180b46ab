//! Document-level driver: selects the tables between the configured markers
//! and builds one structure per recorded table.
use crate::config::{Config, TableMarkers};
use crate::document::{Document, Table};
use crate::error::{AssembleError, Diagnostics};
use crate::ir::SyntaxStructure;
use crate::semantics::{VariableDescriptions, resolve_descriptions};
use crate::syntax::{build_structure, parse_header};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug)]
pub struct Translation {
    pub descriptions: VariableDescriptions,
    pub structures: Vec<SyntaxStructure>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Resolve the semantics region, then parse every recorded table against it.
pub fn translate(
    document: &Document,
    config: &Config,
    diagnostics: &mut Diagnostics,
) -> Result<Translation, AssembleError> {
    let descriptions = resolve_descriptions(
        document.paragraphs(),
        &config.semantics.start,
        &config.semantics.end,
        diagnostics,
    );
    let structures = assemble(document.tables(), &config.tables, &descriptions, diagnostics)?;
    Ok(Translation { descriptions, structures })
}

/// Tables are named by their header cell. Recording starts at the start
/// marker and stops before the end marker; skipped names never record.
pub fn assemble<'t, I>(
    tables: I,
    markers: &TableMarkers,
    descriptions: &VariableDescriptions,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<SyntaxStructure>, AssembleError>
where
    I: IntoIterator<Item = &'t Table>,
{
    let mut structures = Vec::new();
    let mut recording = false;
    let mut ended = false;
    for table in tables {
        let (name, _) = parse_header(table.header());
        if !recording && name == markers.start {
            recording = true;
        }
        if !recording {
            continue;
        }
        if name == markers.end {
            ended = true;
            break;
        }
        if markers.skip.contains(&name) {
            log::debug!("skipping `{name}`");
            continue;
        }
        structures.push(build_structure(table, descriptions, diagnostics));
    }

    if !recording {
        return Err(AssembleError::StartMarkerNotFound { marker: markers.start.clone() });
    }
    if !ended {
        log::info!("end marker `{}` not found; recorded through the last table", markers.end);
    }
    log::info!("assembled {} structures", structures.len());
    Ok(structures)
}
