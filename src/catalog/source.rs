//! Physical layouts that list candidate type paths.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use super::{descriptor_path, Namespace, TypeLoader};

const CLASSES_PREFIX: &str = "classes/";
const LIB_PREFIX: &str = "lib/";
const ARCHIVE_EXTENSION: &str = ".zip";

/// Enumerates candidate type paths under a namespace.
///
/// Implementations never fail: unreadable input is logged and yields nothing.
/// Paths returned here are only candidates; the catalog resolves them.
pub trait TypeSource {
    fn enumerate(&self, namespace: &Namespace, loader: &TypeLoader) -> Vec<String>;
}

/// Every type linked into the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkedTypes;

impl TypeSource for LinkedTypes {
    fn enumerate(&self, namespace: &Namespace, loader: &TypeLoader) -> Vec<String> {
        loader
            .paths()
            .filter(|path| namespace.contains(path))
            .map(str::to_string)
            .collect()
    }
}

/// A directory tree of `*.type` descriptor files.
#[derive(Debug, Clone)]
pub struct DescriptorDirectory {
    root: PathBuf,
}

impl DescriptorDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TypeSource for DescriptorDirectory {
    fn enumerate(&self, namespace: &Namespace, _loader: &TypeLoader) -> Vec<String> {
        let mut paths = Vec::new();
        let walker = ignore::WalkBuilder::new(&self.root)
            .standard_filters(false)
            .build();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(
                        root = %self.root.display(),
                        error = %e,
                        "cannot read descriptor directory entry"
                    );
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let entry_name = relative
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect::<Vec<_>>()
                .join("/");
            if let Some(path) = descriptor_path(&entry_name) {
                if namespace.contains(&path) {
                    paths.push(path);
                }
            }
        }
        debug!(root = %self.root.display(), count = paths.len(), "scanned descriptor directory");
        paths
    }
}

/// A zip archive of `*.type` descriptor entries.
#[derive(Debug, Clone)]
pub struct DescriptorArchive {
    path: PathBuf,
}

impl DescriptorArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TypeSource for DescriptorArchive {
    fn enumerate(&self, namespace: &Namespace, _loader: &TypeLoader) -> Vec<String> {
        let mut paths = Vec::new();
        match open_archive(&self.path) {
            Some(mut archive) => scan_archive(&mut archive, "", false, namespace, &mut paths),
            None => return paths,
        }
        debug!(archive = %self.path.display(), count = paths.len(), "scanned descriptor archive");
        paths
    }
}

/// An outer archive whose `classes/` entries are descriptors and whose
/// `lib/*.zip` entries are nested descriptor archives.
#[derive(Debug, Clone)]
pub struct DeploymentArchive {
    path: PathBuf,
}

impl DeploymentArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TypeSource for DeploymentArchive {
    fn enumerate(&self, namespace: &Namespace, _loader: &TypeLoader) -> Vec<String> {
        let mut paths = Vec::new();
        match open_archive(&self.path) {
            Some(mut archive) => {
                scan_archive(&mut archive, CLASSES_PREFIX, true, namespace, &mut paths)
            }
            None => return paths,
        }
        debug!(archive = %self.path.display(), count = paths.len(), "scanned deployment archive");
        paths
    }
}

fn open_archive(path: &Path) -> Option<ZipArchive<BufReader<File>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!(archive = %path.display(), error = %e, "cannot open archive");
            return None;
        }
    };
    match ZipArchive::new(BufReader::new(file)) {
        Ok(archive) => Some(archive),
        Err(e) => {
            warn!(archive = %path.display(), error = %e, "cannot read archive");
            None
        }
    }
}

/// Collect descriptor entries below `prefix`; with `nested`, also descend into
/// `lib/*.zip` entries.
fn scan_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    prefix: &str,
    nested: bool,
    namespace: &Namespace,
    paths: &mut Vec<String>,
) {
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(index, error = %e, "cannot read archive entry");
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();

        if nested && name.starts_with(LIB_PREFIX) && name.ends_with(ARCHIVE_EXTENSION) {
            let mut bytes = Vec::new();
            if let Err(e) = entry.read_to_end(&mut bytes) {
                warn!(entry = %name, error = %e, "cannot read nested archive");
                continue;
            }
            match ZipArchive::new(Cursor::new(bytes)) {
                Ok(mut inner) => scan_archive(&mut inner, "", false, namespace, paths),
                Err(e) => warn!(entry = %name, error = %e, "cannot open nested archive"),
            }
            continue;
        }

        let Some(relative) = name.strip_prefix(prefix) else {
            continue;
        };
        if let Some(path) = descriptor_path(relative) {
            if namespace.contains(&path) {
                paths.push(path);
            }
        }
    }
}
