//! Run configuration, read from TOML. Every key is optional; command-line
//! flags override whatever the file sets.
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tables: TableMarkers,
    pub semantics: SemanticsMarkers,
    pub output: OutputConfig,
}

/// Which document tables are recorded as structures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableMarkers {
    /// First recorded structure.
    pub start: String,
    /// Last recorded structure.
    pub end: String,
    /// Structures inside the region that are left out.
    pub skip: Vec<String>,
}

impl Default for TableMarkers {
    fn default() -> Self {
        Self {
            start: "nal_unit_header".into(),
            end: "slice_data".into(),
            skip: vec!["sei_rbsp".into()],
        }
    }
}

/// Paragraph prefixes bounding the variable semantics region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticsMarkers {
    pub start: String,
    pub end: String,
}

impl Default for SemanticsMarkers {
    fn default() -> Self {
        Self {
            start: "7.4 Semantics".into(),
            end: "8 Decoding process".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub target: Target,
    /// Empty means one group per structure.
    pub groups: Vec<OutputGroup>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("generated"),
            target: Target::default(),
            groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Cpp,
    Rust,
}

/// Structures emitted together into one declaration/definition file pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputGroup {
    pub name: String,
    #[serde(default)]
    pub structures: Vec<String>,
    /// Other groups this one depends on.
    #[serde(default)]
    pub includes: Vec<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let markers = [
            ("tables.start", &self.tables.start),
            ("tables.end", &self.tables.end),
            ("semantics.start", &self.semantics.start),
            ("semantics.end", &self.semantics.end),
        ];
        for (key, value) in markers {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyMarker { key });
            }
        }
        let mut seen = std::collections::HashSet::new();
        for group in &self.output.groups {
            if !seen.insert(group.name.as_str()) {
                return Err(ConfigError::DuplicateGroup { name: group.name.clone() });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_the_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tables.start, "nal_unit_header");
        assert_eq!(config.tables.skip, vec!["sei_rbsp"]);
        assert_eq!(config.output.target, Target::Cpp);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tables]
            end = "slice_segment_header"

            [output]
            target = "rust"

            [[output.groups]]
            name = "sps"
            structures = ["seq_parameter_set_rbsp"]
            includes = ["ptl"]
            "#,
        )
        .unwrap();
        assert_eq!(config.tables.start, "nal_unit_header");
        assert_eq!(config.tables.end, "slice_segment_header");
        assert_eq!(config.semantics, SemanticsMarkers::default());
        assert_eq!(config.output.target, Target::Rust);
        assert_eq!(config.output.directory, PathBuf::from("generated"));
        assert_eq!(config.output.groups[0].includes, vec!["ptl"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn shipped_vvc_layout_is_valid() {
        let config: Config = toml::from_str(include_str!("../configs/vvc.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.tables, TableMarkers::default());
        let names: Vec<_> = config.output.groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names[..3], ["vps", "sps", "pps"]);
        assert!(config.output.groups[2].includes.is_empty());
    }

    #[test]
    fn validation_rejects_blank_markers_and_duplicate_groups() {
        let mut config = Config::default();
        config.semantics.end = "  ".into();
        assert_eq!(config.validate(), Err(ConfigError::EmptyMarker { key: "semantics.end" }));

        let mut config = Config::default();
        let group = OutputGroup { name: "vps".into(), structures: vec![], includes: vec![] };
        config.output.groups = vec![group.clone(), group];
        assert_eq!(config.validate(), Err(ConfigError::DuplicateGroup { name: "vps".into() }));
    }
}
