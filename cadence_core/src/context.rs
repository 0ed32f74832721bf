//! Shared application state: configuration, identity and data file layout.

use crate::library::ProgramLibrary;
use crate::wal::JsonlHistory;
use crate::{Config, Error, Program, Result, UserIdentity, WorkoutLog};
use std::path::{Path, PathBuf};

/// Locations of the data files under the data directory
#[derive(Clone, Debug)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn library(&self) -> PathBuf {
        self.root.join("library.json")
    }

    pub fn wal_dir(&self) -> PathBuf {
        self.root.join("wal")
    }

    pub fn wal(&self) -> PathBuf {
        self.wal_dir().join("history.wal")
    }

    pub fn csv(&self) -> PathBuf {
        self.root.join("history.csv")
    }
}

/// Everything a front end needs to reach programs and history
#[derive(Clone, Debug)]
pub struct AppContext {
    pub config: Config,
    pub identity: Option<UserIdentity>,
    pub paths: DataPaths,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        let identity = config.user.identity();
        let paths = DataPaths::new(config.data.data_dir.clone());
        Self {
            config,
            identity,
            paths,
        }
    }

    /// The signed-in rider, or `NotSignedIn`
    pub fn require_identity(&self) -> Result<&UserIdentity> {
        self.identity.as_ref().ok_or(Error::NotSignedIn)
    }

    pub fn open_library(&self) -> Result<ProgramLibrary> {
        ProgramLibrary::open(self.paths.library())
    }

    pub fn history_recorder(&self) -> JsonlHistory {
        JsonlHistory::new(self.paths.wal())
    }

    /// Look a program up among the presets, then the rider's library
    pub fn find_program(&self, library: &ProgramLibrary, id: &str) -> Result<Program> {
        let preset: Option<&Program> = crate::presets::find_preset(id);
        preset
            .or_else(|| library.get(id))
            .or_else(|| library.get_community(id))
            .cloned()
            .ok_or_else(|| Error::ProgramNotFound(id.to_string()))
    }

    /// Every rider's logs, newest first
    pub fn load_history(&self) -> Result<Vec<WorkoutLog>> {
        crate::history::load_history(&self.paths.wal(), &self.paths.csv())
    }

    /// The signed-in rider's logs, newest first; empty when signed out
    pub fn my_history(&self) -> Result<Vec<WorkoutLog>> {
        let Some(user) = &self.identity else {
            return Ok(Vec::new());
        };
        let mut logs = self.load_history()?;
        logs.retain(|l| l.user_id == user.id);
        Ok(logs)
    }

    /// Move the history WAL into the CSV archive
    pub fn rollup(&self) -> Result<usize> {
        crate::csv_rollup::wal_to_csv_and_archive(&self.paths.wal(), &self.paths.csv())
    }

    pub fn cleanup_processed(&self) -> Result<usize> {
        crate::csv_rollup::cleanup_processed_wals(&self.paths.wal_dir())
    }
}
