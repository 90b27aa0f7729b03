// src/config.rs
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// All filesystem locations used by the pipeline hang off a single data
/// directory, so tests (and deployments) can redirect every read and write by
/// constructing a config over a scratch directory instead of mutating
/// process-wide state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of all pipeline data. Defaults to `./data`.
    pub data_dir: PathBuf,
    /// Name stamped into the roster deliverable, `Teste_{name}.zip`.
    pub deliverable_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            deliverable_name: "resultadofinal".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Build a config from the environment: `ANS_DATA_DIR` overrides the data
    /// root, `ANS_TESTE_NOME` the deliverable name.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(dir) = env::var("ANS_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(name) = env::var("ANS_TESTE_NOME") {
            cfg.deliverable_name = name;
        }
        cfg
    }

    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Downloaded source files (archives, registry CSV, annex PDFs).
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// Quarterly financial-statement ZIPs as downloaded.
    pub fn statements_dir(&self) -> PathBuf {
        self.raw_dir().join("demonstracoes_contabeis")
    }

    /// Statement archives unpacked into `<year>/<quarter>T/` subfolders.
    pub fn extracted_dir(&self) -> PathBuf {
        self.raw_dir().join("demonstracoes_contabeis_extracted")
    }

    /// Intermediate outputs (consolidated dataset, audit trail, roster CSV).
    pub fn interim_dir(&self) -> PathBuf {
        self.data_dir.join("interim")
    }

    /// Final deliverables (the roster ZIP).
    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    /// The CADOP operator-registry CSV.
    pub fn registry_csv(&self) -> PathBuf {
        self.raw_dir().join("operadoras_ativas").join("relatorio_cadop.csv")
    }

    pub fn consolidated_csv(&self) -> PathBuf {
        self.interim_dir().join("demonstracoes_contabeis_consolidado.csv")
    }

    pub fn audit_csv(&self) -> PathBuf {
        self.interim_dir().join("validacao_demonstracoes_contabeis.csv")
    }

    pub fn roster_csv(&self) -> PathBuf {
        self.interim_dir().join("rol_procedimentos_ans.csv")
    }

    pub fn roster_zip(&self) -> PathBuf {
        self.processed_dir()
            .join(format!("Teste_{}.zip", self.deliverable_name))
    }

    /// Create every directory the pipeline writes into.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.statements_dir(),
            self.extracted_dir(),
            self.registry_csv()
                .parent()
                .unwrap_or(Path::new("."))
                .to_path_buf(),
            self.interim_dir(),
            self.processed_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_hang_off_data_dir() {
        let cfg = PipelineConfig::with_data_dir("/tmp/ans");
        assert_eq!(
            cfg.consolidated_csv(),
            PathBuf::from("/tmp/ans/interim/demonstracoes_contabeis_consolidado.csv")
        );
        assert_eq!(
            cfg.statements_dir(),
            PathBuf::from("/tmp/ans/raw/demonstracoes_contabeis")
        );
        assert_eq!(
            cfg.roster_zip(),
            PathBuf::from("/tmp/ans/processed/Teste_resultadofinal.zip")
        );
    }

    #[test]
    fn ensure_dirs_creates_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig::with_data_dir(tmp.path().join("data"));
        cfg.ensure_dirs().unwrap();
        assert!(cfg.statements_dir().is_dir());
        assert!(cfg.interim_dir().is_dir());
        assert!(cfg.processed_dir().is_dir());
    }
}
