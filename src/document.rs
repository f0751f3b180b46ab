//! Read-only view of the source document: syntax tables as cell grids and
//! prose as paragraphs of styled runs.
//!
//! The on-disk form is a JSON export of the document body, blocks in
//! document order:
//!
//! ```json
//! { "blocks": [
//!     { "paragraph": [ { "text": "sps_id", "bold": true }, { "text": " identifies ..." } ] },
//!     { "table": [ ["foo( a )", "Descriptor"], ["\tbar_baz", "u(4)"] ] }
//! ] }
//! ```
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A table addressable by `(row, column)`.
pub trait TableGrid {
    fn rows(&self) -> usize;
    fn columns(&self) -> usize;
    /// `None` outside the grid; ragged rows read as empty cells.
    fn cell(&self, row: usize, column: usize) -> Option<&str>;
}

/// Row-major flattening of a [`TableGrid`]; the tree builder walks tables
/// through this view.
pub struct Cells<'a, T: TableGrid + ?Sized> {
    table: &'a T,
    columns: usize,
}

impl<'a, T: TableGrid + ?Sized> Cells<'a, T> {
    pub fn new(table: &'a T) -> Self {
        Self { table, columns: table.columns() }
    }

    pub fn text(&self, index: usize) -> Option<&'a str> {
        if self.columns == 0 {
            return None;
        }
        self.table.cell(index / self.columns, index % self.columns)
    }

    /// `index` opens a row whose cells are all blank.
    pub fn starts_blank_row(&self, index: usize) -> bool {
        if self.columns == 0 || index % self.columns != 0 {
            return false;
        }
        (index..index + self.columns).all(|i| self.text(i).is_some_and(|t| t.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Vec<String>>", into = "Vec<Vec<String>>")]
pub struct Table {
    rows: Vec<Vec<String>>,
    /// Widest row.
    width: usize,
}

impl From<Vec<Vec<String>>> for Table {
    fn from(rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width }
    }
}

impl From<Table> for Vec<Vec<String>> {
    fn from(table: Table) -> Self {
        table.rows
    }
}

impl Table {
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows: Vec<Vec<String>> = rows.into_iter().map(|r| r.into_iter().map(Into::into).collect()).collect();
        rows.into()
    }

    /// Top-left cell, `name( params )` for a syntax table.
    pub fn header(&self) -> &str {
        self.cell(0, 0).unwrap_or("")
    }
}

impl TableGrid for Table {
    fn rows(&self) -> usize {
        self.rows.len()
    }

    fn columns(&self) -> usize {
        self.width
    }

    fn cell(&self, row: usize, column: usize) -> Option<&str> {
        if column >= self.width {
            return None;
        }
        let row = self.rows.get(row)?;
        Some(row.get(column).map(String::as_str).unwrap_or(""))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    #[serde(default)]
    pub bold: bool,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), bold: false }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self { text: text.into(), bold: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn new(runs: Vec<Run>) -> Self {
        Self { runs }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Block {
    Table(Table),
    Paragraph(Paragraph),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read document {}", path.display()))?;
        Self::from_json_str(&source)
            .with_context(|| format!("failed to parse document {}", path.display()))
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        from_str_with_path(source)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            Block::Paragraph(_) => None,
        })
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        })
    }
}

/// Deserialize with JSON-path context in error messages.
fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        anyhow::anyhow!("at JSON path {path} → {}", err.into_inner())
    })
}
