use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

lazy_static! {
    pub static ref RE_SUBCKT: Regex = Regex::new(r"(?mi)^\s*\.subckt\s+([^\s]+)").unwrap();
    pub static ref RE_MODEL: Regex = Regex::new(r"(?mi)^\s*\.model\s+([^\s(]+)").unwrap();
    pub static ref RE_INCLUDE: Regex = Regex::new(r"(?mi)^\s*\.include\s+(.+?)\s*$").unwrap();
}

const EXTENSIONS: [&str; 4] = ["lib", "mod", "cir", "sub"];

/// Index of the models and sub-circuits found below a directory.
#[derive(Debug, Clone, Default)]
pub struct SpiceLibrary {
    root: PathBuf,
    entries: HashMap<String, PathBuf>,
}

impl SpiceLibrary {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(Error::LibraryPath(root));
        }
        let mut library = Self {
            root: root.clone(),
            entries: HashMap::new(),
        };
        library.scan(&root)?;
        debug!(
            path = %root.display(),
            entries = library.entries.len(),
            "spice library indexed"
        );
        Ok(library)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The file defining `name`. Names compare case-insensitively.
    pub fn get(&self, name: &str) -> Result<&Path> {
        self.entries
            .get(&name.to_lowercase())
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::SpiceModelNotFound(name.to_string()))
    }

    /// The defining file of `name` followed by the files it includes.
    pub fn includes(&self, name: &str) -> Result<Vec<PathBuf>> {
        let path = self.get(name)?;
        let mut result = vec![path.to_path_buf()];
        let content = read_lossy(path)?;
        for cap in RE_INCLUDE.captures_iter(&content) {
            let include = cap[1].trim_matches('"');
            let include = Path::new(include);
            let resolved = if include.is_absolute() {
                include.to_path_buf()
            } else {
                //relative includes are relative to the including file
                path.parent()
                    .map(|parent| parent.join(include))
                    .unwrap_or_else(|| include.to_path_buf())
            };
            if !result.contains(&resolved) {
                result.push(resolved);
            }
        }
        Ok(result)
    }

    fn scan(&mut self, dir: &Path) -> Result<()> {
        let mut entries = fs::read_dir(dir)?
            .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (path, file_type) in entries {
            //symlinked directories are not followed, they may form loops
            let is_file = if file_type.is_symlink() {
                let is_file = fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false);
                if !is_file {
                    debug!(path = %path.display(), "skip symlink");
                }
                is_file
            } else {
                file_type.is_file()
            };
            if file_type.is_dir() {
                self.scan(&path)?;
            } else if is_file && is_spice_file(&path) {
                let content = read_lossy(&path)?;
                for cap in RE_SUBCKT.captures_iter(&content).chain(RE_MODEL.captures_iter(&content)) {
                    let key = cap[1].to_lowercase();
                    if let Some(existing) = self.entries.get(&key) {
                        warn!(
                            name = %key,
                            kept = %existing.display(),
                            ignored = %path.display(),
                            "duplicate spice definition"
                        );
                        continue;
                    }
                    self.entries.insert(key, path.clone());
                }
            }
        }
        Ok(())
    }
}

/// Model files are not always UTF-8, the directives are ASCII.
fn read_lossy(path: &Path) -> Result<String> {
    Ok(String::from_utf8_lossy(&fs::read(path)?).into_owned())
}

fn is_spice_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
