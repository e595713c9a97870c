//! Signal store backings
//!
//! `FileStore` is the production backing (the `.memes` JSON file), `MemoryStore`
//! keeps the serialized document in memory for tests. Both go through the same
//! JSON encoding so the boundary validation is identical.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::MemeState;
use super::error::{MemeError, MemeResult};
use super::lock::{LockOptions, StoreLock};

/// Durable home of a `MemeState`
pub trait SignalStore {
    /// Read the persisted state; an absent store is the empty state
    fn load(&self) -> MemeResult<MemeState>;

    /// Replace the persisted state entirely
    fn save(&self, state: &MemeState) -> MemeResult<()>;

    /// Lock guarding a load → mutate → save cycle, if the backing needs one
    fn lock(&self) -> MemeResult<Option<StoreLock>> {
        Ok(None)
    }

    /// Human-readable location, for logs and CLI output
    fn location(&self) -> String;
}

/// Run load → `mutate` → save while holding the store lock.
/// Nothing is saved if `mutate` fails.
pub fn update<S, T, F>(store: &S, mutate: F) -> MemeResult<T>
where
    S: SignalStore + ?Sized,
    F: FnOnce(&mut MemeState) -> MemeResult<T>,
{
    let cycle = || -> MemeResult<T> {
        let mut state = store.load()?;
        let out = mutate(&mut state)?;
        store.save(&state)?;
        Ok(out)
    };

    match store.lock()? {
        Some(mut lock) => lock.hold(cycle),
        None => cycle(),
    }
}

fn encode(state: &MemeState) -> MemeResult<String> {
    serde_json::to_string_pretty(state).map_err(MemeError::Serialization)
}

/// Store backed by a JSON file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    lock_options: LockOptions,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock_options: LockOptions::default(),
        }
    }

    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

impl SignalStore for FileStore {
    fn load(&self) -> MemeResult<MemeState> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No meme state at {}, starting empty", self.path.display());
                return Ok(MemeState::default());
            }
            Err(e) => return Err(MemeError::io(&self.path, e)),
        };

        let state: MemeState =
            serde_json::from_str(&content).map_err(|e| MemeError::deserialization(&self.path, e))?;
        log::debug!(
            "Loaded {} signals and {} registry records from {}",
            state.signals.len(),
            state.documentation_registry.len(),
            self.path.display()
        );
        Ok(state)
    }

    fn save(&self, state: &MemeState) -> MemeResult<()> {
        let json = encode(state)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| MemeError::io(&dir, e))?;

        // Write beside the target and rename over it so readers never see a partial file
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| MemeError::io(&dir, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| MemeError::io(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| MemeError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| MemeError::io(&self.path, e.error))?;

        log::info!(
            "Saved {} signals to {}",
            state.signals.len(),
            self.path.display()
        );
        Ok(())
    }

    fn lock(&self) -> MemeResult<Option<StoreLock>> {
        StoreLock::open(&self.path, self.lock_options).map(Some)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store holding the serialized document
#[allow(dead_code)] // injected by tests and embedders, never by the CLI
#[derive(Debug, Default)]
pub struct MemoryStore {
    content: Mutex<Option<String>>,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from raw persisted content, well-formed or not
    pub fn with_content(content: &str) -> Self {
        Self {
            content: Mutex::new(Some(content.to_string())),
        }
    }

    pub fn content(&self) -> Option<String> {
        self.content.lock().ok().and_then(|c| c.clone())
    }
}

impl SignalStore for MemoryStore {
    fn load(&self) -> MemeResult<MemeState> {
        let guard = self
            .content
            .lock()
            .map_err(|_| MemeError::io("<memory>", std::io::Error::other("memory store poisoned")))?;
        match guard.as_deref() {
            None => Ok(MemeState::default()),
            Some(content) => {
                serde_json::from_str(content).map_err(|e| MemeError::deserialization("<memory>", e))
            }
        }
    }

    fn save(&self, state: &MemeState) -> MemeResult<()> {
        let json = encode(state)?;
        let mut guard = self
            .content
            .lock()
            .map_err(|_| MemeError::io("<memory>", std::io::Error::other("memory store poisoned")))?;
        *guard = Some(json);
        Ok(())
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}
