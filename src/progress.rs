use std::collections::HashSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::GeneSymbol;
use crate::error::GdcError;
use crate::store::{remove_if_exists, write_bytes_atomic};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressFile {
    #[serde(default)]
    completed_genes: Vec<String>,
}

/// Ordered list of genes whose processing finished, persisted after every gene.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    path: Utf8PathBuf,
    completed: Vec<String>,
    index: HashSet<String>,
}

impl ProgressLog {
    /// Loads the log at `path`, or starts an empty one if the file does not exist.
    pub fn load(path: &Utf8Path) -> Result<Self, GdcError> {
        let completed = if path.as_std_path().exists() {
            let content = fs::read_to_string(path.as_std_path())
                .map_err(|err| GdcError::Filesystem(format!("read {path}: {err}")))?;
            let file: ProgressFile = serde_json::from_str(&content)
                .map_err(|err| GdcError::Filesystem(format!("parse {path}: {err}")))?;
            file.completed_genes
        } else {
            Vec::new()
        };
        let index = completed.iter().cloned().collect();
        Ok(Self {
            path: path.to_path_buf(),
            completed,
            index,
        })
    }

    pub fn contains(&self, symbol: &GeneSymbol) -> bool {
        self.index.contains(symbol.as_str())
    }

    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Appends the gene and rewrites the whole file.
    pub fn mark_completed(&mut self, symbol: &GeneSymbol) -> Result<(), GdcError> {
        if self.index.insert(symbol.to_string()) {
            self.completed.push(symbol.to_string());
        }
        self.save()
    }

    pub fn save(&self) -> Result<(), GdcError> {
        let file = ProgressFile {
            completed_genes: self.completed.clone(),
        };
        let content =
            serde_json::to_vec(&file).map_err(|err| GdcError::Filesystem(err.to_string()))?;
        write_bytes_atomic(&self.path, &content)
    }

    /// Forgets all progress and removes the file.
    pub fn clear(&mut self) -> Result<(), GdcError> {
        self.completed.clear();
        self.index.clear();
        remove_if_exists(&self.path)
    }
}
