//! Migration sources.
//!
//! Declared migrations come either from a zip archive of numbered scripts or
//! from two folders:
//!
//! ```text
//! changesets/
//!   0001_create_orders.sql
//!   0002_add_index.sql
//! objects/
//!   procedures/recalc_totals.sql
//!   triggers/orders_bi.sql
//! ```
//!
//! The archive wins when it exists.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::migration::{check_unique_identities, Migration};

/// Default folder of numbered migrations.
pub const DEFAULT_CHANGESETS_DIR: &str = "changesets";

/// Default folder of object migrations.
pub const DEFAULT_OBJECTS_DIR: &str = "objects";

/// Default archive of numbered migrations.
pub const DEFAULT_ARCHIVE: &str = "db_scripts.zip";

const SCRIPT_EXTENSION: &str = "sql";

const UTF8_BOM: char = '\u{feff}';

/// Where declared migrations are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocations {
    /// Folder of numbered migrations.
    pub changesets: PathBuf,
    /// Folder of object migrations, searched recursively.
    pub objects: PathBuf,
    /// Archive of numbered migrations, preferred when it exists.
    pub archive: Option<PathBuf>,
}

impl Default for SourceLocations {
    fn default() -> Self {
        Self {
            changesets: PathBuf::from(DEFAULT_CHANGESETS_DIR),
            objects: PathBuf::from(DEFAULT_OBJECTS_DIR),
            archive: Some(PathBuf::from(DEFAULT_ARCHIVE)),
        }
    }
}

impl SourceLocations {
    /// Default locations relative to `root`.
    pub fn in_dir(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            changesets: root.join(DEFAULT_CHANGESETS_DIR),
            objects: root.join(DEFAULT_OBJECTS_DIR),
            archive: Some(root.join(DEFAULT_ARCHIVE)),
        }
    }

    /// Set the changesets folder.
    pub fn changesets(mut self, dir: impl Into<PathBuf>) -> Self {
        self.changesets = dir.into();
        self
    }

    /// Set the objects folder.
    pub fn objects(mut self, dir: impl Into<PathBuf>) -> Self {
        self.objects = dir.into();
        self
    }

    /// Set the archive path; `None` disables archive lookup.
    pub fn archive(mut self, path: Option<PathBuf>) -> Self {
        self.archive = path;
        self
    }

    /// Load declared migrations from the first location that exists.
    pub fn load(&self) -> MigrateResult<Vec<Migration>> {
        if let Some(archive) = self.archive.as_ref().filter(|p| p.is_file()) {
            debug!(path = %archive.display(), "Reading migrations from archive");
            return read_archive(archive);
        }

        if self.changesets.is_dir() || self.objects.is_dir() {
            debug!(
                changesets = %self.changesets.display(),
                objects = %self.objects.display(),
                "Reading migrations from folders"
            );
            return FolderSource::new(&self.changesets, &self.objects).load();
        }

        Err(MigrationError::source_error("migrations are not found"))
    }
}

/// Numbered and object migrations read from two folders.
#[derive(Debug, Clone)]
pub struct FolderSource {
    changesets: PathBuf,
    objects: PathBuf,
}

impl FolderSource {
    /// Create a folder source. Missing folders contribute nothing.
    pub fn new(changesets: impl Into<PathBuf>, objects: impl Into<PathBuf>) -> Self {
        Self {
            changesets: changesets.into(),
            objects: objects.into(),
        }
    }

    /// Numbered migrations sorted by file name, then object migrations sorted
    /// by relative path.
    ///
    /// Two files resolving to the same identity are rejected, naming both
    /// paths. Objects are identified by file name alone, so
    /// `objects/a/p.sql` and `objects/b/p.sql` collide.
    pub fn load(&self) -> MigrateResult<Vec<Migration>> {
        let mut sourced = self.load_changesets()?;
        sourced.extend(self.load_objects()?);

        check_unique_identities(sourced.iter().map(|(path, m)| (path.display().to_string(), m)))?;
        Ok(sourced.into_iter().map(|(_, m)| m).collect())
    }

    fn load_changesets(&self) -> MigrateResult<Vec<(PathBuf, Migration)>> {
        if !self.changesets.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.changesets)? {
            let path = entry?.path();
            if path.is_file() && is_script(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        paths
            .into_iter()
            .map(|path| {
                let file_name = file_name_of(&path)?;
                let migration = Migration::from_source_name(&file_name, read_script(&path)?)?;
                Ok((path, migration))
            })
            .collect()
    }

    fn load_objects(&self) -> MigrateResult<Vec<(PathBuf, Migration)>> {
        if !self.objects.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        collect_scripts(&self.objects, &mut paths)?;
        paths.sort();

        paths
            .into_iter()
            .map(|path| {
                let migration = Migration::object(file_name_of(&path)?, read_script(&path)?);
                Ok((path, migration))
            })
            .collect()
    }
}

fn collect_scripts(dir: &Path, paths: &mut Vec<PathBuf>) -> MigrateResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_scripts(&path, paths)?;
        } else if is_script(&path) {
            paths.push(path);
        }
    }
    Ok(())
}

fn is_script(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
}

fn file_name_of(path: &Path) -> MigrateResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
        .ok_or_else(|| {
            MigrationError::source_error(format!("invalid file name: {}", path.display()))
        })
}

fn read_script(path: &Path) -> MigrateResult<String> {
    let content = fs::read_to_string(path)?;
    Ok(strip_bom(content))
}

fn strip_bom(content: String) -> String {
    match content.strip_prefix(UTF8_BOM) {
        Some(rest) => rest.to_string(),
        None => content,
    }
}

#[cfg(feature = "archive")]
fn read_archive(path: &Path) -> MigrateResult<Vec<Migration>> {
    ArchiveSource::new(path).load()
}

#[cfg(not(feature = "archive"))]
fn read_archive(path: &Path) -> MigrateResult<Vec<Migration>> {
    Err(MigrationError::unsupported(format!(
        "{} found but archive support is not enabled",
        path.display()
    )))
}

/// Numbered migrations read from a zip archive.
#[cfg(feature = "archive")]
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    path: PathBuf,
}

#[cfg(feature = "archive")]
impl ArchiveSource {
    /// Create an archive source.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Every `*.sql` entry as a numbered migration, sorted by entry file name.
    /// Directory entries are ignored and entry paths are reduced to their
    /// file name. Entries resolving to the same identity are rejected.
    pub fn load(&self) -> MigrateResult<Vec<Migration>> {
        use std::io::Read;

        let file = fs::File::open(&self.path)?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| self.zip_error(e))?;

        let mut scripts = Vec::new();
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index).map_err(|e| self.zip_error(e))?;
            if entry.is_dir() {
                continue;
            }

            let entry_path = PathBuf::from(entry.name());
            if !is_script(&entry_path) {
                continue;
            }

            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            let file_name = file_name_of(&entry_path)?;
            scripts.push((file_name, entry.name().to_string(), strip_bom(content)));
        }
        scripts.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let sourced = scripts
            .into_iter()
            .map(|(file_name, entry_name, content)| {
                Ok((entry_name, Migration::from_source_name(&file_name, content)?))
            })
            .collect::<MigrateResult<Vec<_>>>()?;

        check_unique_identities(sourced.iter().map(|(entry_name, m)| (entry_name.clone(), m)))?;
        Ok(sourced.into_iter().map(|(_, m)| m).collect())
    }

    fn zip_error(&self, err: zip::result::ZipError) -> MigrationError {
        MigrationError::source_error(format!("{}: {}", self.path.display(), err))
    }
}
