//! The ordered collection of all authored phases.

use super::source::{PhaseSource, YamlPhaseSource};
use super::MigrationPhase;
use crate::error::MigrationError;
use crate::version::Version;
use std::path::Path;

/// All phases of a project, sorted by ascending version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roadmap {
    phases: Vec<MigrationPhase>,
}

impl Roadmap {
    /// Build a roadmap from phases in any order.
    ///
    /// Fails when two phases share a version.
    pub fn new(mut phases: Vec<MigrationPhase>) -> Result<Self, MigrationError> {
        phases.sort_by_key(|p| p.version);
        if let Some(pair) = phases.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(MigrationError::Validation {
                source_name: "roadmap".to_string(),
                message: format!(
                    "version {} is declared by both '{}' and '{}'",
                    pair[0].version, pair[0].title, pair[1].title
                ),
            });
        }
        Ok(Self { phases })
    }

    /// Load every `*.yaml` / `*.yml` document in a directory.
    pub fn load_dir(path: impl AsRef<Path>) -> Result<Self, MigrationError> {
        Self::load_dir_with(&YamlPhaseSource, path)
    }

    /// Load every `*.yaml` / `*.yml` document in a directory with a custom source.
    pub fn load_dir_with(
        source: &dyn PhaseSource,
        path: impl AsRef<Path>,
    ) -> Result<Self, MigrationError> {
        let path = path.as_ref();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let file = entry.path();
            let is_yaml = file
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
            if is_yaml && entry.file_type()?.is_file() {
                files.push(file);
            }
        }
        files.sort();

        let mut phases = Vec::with_capacity(files.len());
        for file in files {
            let document = std::fs::read_to_string(&file)?;
            let phase = source.deserialize(&document, &file.display().to_string())?;
            tracing::debug!(
                path = %file.display(),
                version = %phase.version,
                title = %phase.title,
                "loaded roadmap phase"
            );
            phases.push(phase);
        }

        Self::new(phases)
    }

    /// All phases, ascending.
    pub fn phases(&self) -> &[MigrationPhase] {
        &self.phases
    }

    /// Number of phases.
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Whether the roadmap has no phases.
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Highest declared version.
    pub fn latest_version(&self) -> Option<Version> {
        self.phases.last().map(|p| p.version)
    }

    /// Look up a phase by version.
    pub fn get(&self, version: Version) -> Option<&MigrationPhase> {
        self.phases
            .binary_search_by_key(&version, |p| p.version)
            .ok()
            .map(|idx| &self.phases[idx])
    }

    /// Phases with `version <= upto`.
    pub fn up_to(&self, upto: Version) -> impl Iterator<Item = &MigrationPhase> {
        self.phases.iter().filter(move |p| p.version <= upto)
    }

    /// Phases with `after < version <= upto`; `after = None` means from the start.
    pub fn between(&self, after: Option<Version>, upto: Version) -> Vec<&MigrationPhase> {
        self.phases
            .iter()
            .filter(|p| after.map_or(true, |a| p.version > a) && p.version <= upto)
            .collect()
    }
}
