//! In-memory copy of an Office Open XML zip container.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::session::SessionError;

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// Every entry of a package, in archive order.
#[derive(Debug, Clone)]
pub(crate) struct Package {
    path: PathBuf,
    entries: Vec<Entry>,
}

impl Package {
    /// Reads every entry of the package at `path` into memory.
    pub(crate) fn read(path: &Path) -> Result<Self, SessionError> {
        let file = File::open(path).map_err(|source| SessionError::io(path, source))?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|error| package_error(path, error))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|error| package_error(path, error))?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|source| SessionError::io(path, source))?;
            entries.push(Entry {
                name: file.name().to_owned(),
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Path the package was read from.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Raw bytes of the named entry.
    pub(crate) fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| !entry.is_dir && entry.name == name)
            .map(|entry| entry.data.as_slice())
    }

    /// Names of the file entries accepted by `filter`, sorted.
    pub(crate) fn names_matching(&self, filter: impl Fn(&str) -> bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_dir && filter(&entry.name))
            .map(|entry| entry.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Writes the package to `target`, substituting the bytes of any entry
    /// named in `replaced`.
    pub(crate) fn write(
        &self,
        target: &Path,
        replaced: &HashMap<String, Vec<u8>>,
    ) -> Result<(), SessionError> {
        let file = File::create(target).map_err(|source| SessionError::io(target, source))?;
        let mut zip = ZipWriter::new(file);

        for entry in &self.entries {
            let options = SimpleFileOptions::default().compression_method(writable(entry.compression));
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)
                    .map_err(|error| package_error(target, error))?;
                continue;
            }
            zip.start_file(entry.name.as_str(), options)
                .map_err(|error| package_error(target, error))?;
            let data = replaced.get(&entry.name).unwrap_or(&entry.data);
            zip.write_all(data)
                .map_err(|source| SessionError::io(target, source))?;
        }

        zip.finish().map_err(|error| package_error(target, error))?;
        Ok(())
    }
}

// Packages written by office suites are stored or deflated; anything else is
// re-deflated.
fn writable(method: CompressionMethod) -> CompressionMethod {
    match method {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    }
}

fn package_error(path: &Path, error: zip::result::ZipError) -> SessionError {
    SessionError::Package {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}
