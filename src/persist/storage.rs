use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key-value string storage the persisted state is written to
pub trait StateStorage: Send + Sync {
    fn get_item(&self, name: &str) -> io::Result<Option<String>>;

    fn set_item(&self, name: &str, value: &str) -> io::Result<()>;

    fn remove_item(&self, name: &str) -> io::Result<()>;
}

/// In-process storage, lost on exit
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.items
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory storage lock poisoned"))
    }
}

impl StateStorage for MemoryStorage {
    fn get_item(&self, name: &str) -> io::Result<Option<String>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn set_item(&self, name: &str, value: &str) -> io::Result<()> {
        self.lock()?.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, name: &str) -> io::Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}

/// One `<name>.json` file per key inside a directory
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at `dir`, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl StateStorage for FileStorage {
    fn get_item(&self, name: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(name)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_item(&self, name: &str, value: &str) -> io::Result<()> {
        let path = self.path_for(name);
        let tmp_path = self.dir.join(format!(".{}.json.tmp", name));

        // Write then rename so readers never see a half-written blob
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(value.as_bytes())?;
        file.flush()?;
        file.sync_all()?;
        fs::rename(&tmp_path, &path)
    }

    fn remove_item(&self, name: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(name)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
