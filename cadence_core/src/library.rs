//! Program library persistence with file locking.
//!
//! The library holds the rider's own programs and the community board of
//! published programs. Every mutation is saved atomically and then pushed to
//! subscribers.

use crate::{Error, Phase, Program, Result, UserIdentity};
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Handle returned by `subscribe`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&[Program])>;

/// On-disk layout; entries are validated one by one when loading
#[derive(Serialize, Deserialize)]
struct LibraryFile<T> {
    #[serde(default)]
    programs: Vec<T>,
    #[serde(default)]
    community: Vec<T>,
}

/// File-backed store of user and community programs
pub struct ProgramLibrary {
    path: PathBuf,
    programs: Vec<Program>,
    community: Vec<Program>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl ProgramLibrary {
    /// Open the library at `path`
    ///
    /// A missing file is an empty library. A corrupt file is logged and
    /// treated as empty; invalid entries are dropped individually.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (programs, community) = load_entries(&path)?;
        Ok(Self {
            path,
            programs,
            community,
            listeners: Vec::new(),
            next_subscription: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The rider's own programs, in creation order
    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    /// Published programs, newest first
    pub fn community(&self) -> &[Program] {
        &self.community
    }

    pub fn get(&self, id: &str) -> Option<&Program> {
        self.programs.iter().find(|p| p.id == id)
    }

    pub fn get_community(&self, id: &str) -> Option<&Program> {
        self.community.iter().find(|p| p.id == id)
    }

    /// Add a new program with a fresh id
    pub fn create(
        &mut self,
        name: &str,
        phases: Vec<Phase>,
        owner: Option<&UserIdentity>,
    ) -> Result<Program> {
        let mut program = Program::new(Uuid::new_v4().to_string(), name, phases)?;
        program.is_custom = true;
        program.creator_id = owner.map(|u| u.id.clone());
        program.created_at = Some(Utc::now());

        let mut programs = self.programs.clone();
        programs.push(program.clone());
        self.commit(programs, self.community.clone())?;
        tracing::info!("Created program '{}' ({})", program.name, program.id);
        Ok(program)
    }

    /// Replace a program's name and phases, keeping its id
    pub fn update(&mut self, id: &str, name: &str, phases: Vec<Phase>) -> Result<Program> {
        let mut programs = self.programs.clone();
        let program = programs
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::ProgramNotFound(id.to_string()))?;

        program.set_phases(phases)?;
        program.name = name.to_string();
        let updated = program.clone();

        self.commit(programs, self.community.clone())?;
        tracing::info!("Updated program '{}' ({})", updated.name, updated.id);
        Ok(updated)
    }

    /// Remove a program and any community entry published from it
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let mut programs = self.programs.clone();
        programs.retain(|p| p.id != id);
        if programs.len() == self.programs.len() {
            return Err(Error::ProgramNotFound(id.to_string()));
        }

        let mut community = self.community.clone();
        community.retain(|p| p.original_id.as_deref() != Some(id));
        if community.len() != self.community.len() {
            tracing::info!("Unpublished deleted program {}", id);
        }

        self.commit(programs, community)?;
        tracing::info!("Deleted program {}", id);
        Ok(())
    }

    /// Share one of the rider's programs on the community board
    ///
    /// Publishing again refreshes the existing entry and moves it to the top.
    pub fn publish(&mut self, id: &str, owner: &UserIdentity) -> Result<Program> {
        let program = self
            .get(id)
            .ok_or_else(|| Error::ProgramNotFound(id.to_string()))?
            .clone();

        let mut community = self.community.clone();
        let existing = community.iter().position(|p| {
            p.original_id.as_deref() == Some(id) && p.creator_id.as_deref() == Some(&owner.id)
        });

        let entry = match existing {
            Some(idx) => {
                let previous = community.remove(idx);
                let mut entry = program.published_copy(previous.id, owner);
                entry.downloads = previous.downloads;
                entry
            }
            None => program.published_copy(Uuid::new_v4().to_string(), owner),
        };

        community.insert(0, entry.clone());
        self.commit(self.programs.clone(), community)?;
        tracing::info!("Published '{}' as {}", entry.name, entry.id);
        Ok(entry)
    }

    /// Withdraw a program from the community board; returns whether it was published
    pub fn unpublish(&mut self, id: &str) -> Result<bool> {
        let mut community = self.community.clone();
        community.retain(|p| p.original_id.as_deref() != Some(id));
        let removed = community.len() != self.community.len();

        if removed {
            self.commit(self.programs.clone(), community)?;
            tracing::info!("Unpublished program {}", id);
        }
        Ok(removed)
    }

    /// Copy a community program into the rider's own programs
    pub fn download(&mut self, community_id: &str, owner: &UserIdentity) -> Result<Program> {
        let mut community = self.community.clone();
        let entry = community
            .iter_mut()
            .find(|p| p.id == community_id)
            .ok_or_else(|| Error::ProgramNotFound(community_id.to_string()))?;

        entry.downloads += 1;
        let copy = entry.downloaded_copy(Uuid::new_v4().to_string(), owner);

        let mut programs = self.programs.clone();
        programs.push(copy.clone());
        self.commit(programs, community)?;
        tracing::info!("Downloaded '{}' as {}", copy.name, copy.id);
        Ok(copy)
    }

    /// Register a listener that receives the program list after every change
    pub fn subscribe(&mut self, listener: impl FnMut(&[Program]) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Save the library atomically
    pub fn save(&self) -> Result<()> {
        write_entries(&self.path, &self.programs, &self.community)
    }

    /// Write the new state and adopt it only once it is on disk
    fn commit(&mut self, programs: Vec<Program>, community: Vec<Program>) -> Result<()> {
        write_entries(&self.path, &programs, &community)?;
        self.programs = programs;
        self.community = community;
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.programs);
        }
        Ok(())
    }
}

/// 1. Write to a temp file in the same directory
/// 2. Sync to disk
/// 3. Rename over the original
fn write_entries(path: &Path, programs: &[Program], community: &[Program]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let temp = NamedTempFile::new_in(&parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let file = LibraryFile {
            programs: programs.iter().collect::<Vec<_>>(),
            community: community.iter().collect::<Vec<_>>(),
        };
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string(&file)?;
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Saved program library to {:?}", path);
    Ok(())
}

fn load_entries(path: &Path) -> Result<(Vec<Program>, Vec<Program>)> {
    if !path.exists() {
        tracing::info!("No program library at {:?}, starting empty", path);
        return Ok((Vec::new(), Vec::new()));
    }

    let file = File::open(path)?;
    file.lock_shared()
        .map_err(|e| Error::Store(format!("unable to lock {:?}: {}", path, e)))?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    let raw: LibraryFile<serde_json::Value> = match serde_json::from_str(&contents) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(
                "Failed to parse program library {:?}: {}. Starting empty.",
                path,
                e
            );
            return Ok((Vec::new(), Vec::new()));
        }
    };

    Ok((validated(raw.programs), validated(raw.community)))
}

fn validated(entries: Vec<serde_json::Value>) -> Vec<Program> {
    entries
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Program>(value) {
            Ok(program) => Some(program),
            Err(e) => {
                tracing::warn!("Dropping invalid program from library: {}", e);
                None
            }
        })
        .collect()
}
