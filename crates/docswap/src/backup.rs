//! Dated copies of originals taken before they are edited.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use time::macros::format_description;
use time::{Date, OffsetDateTime};

/// Directory under `source_dir` holding the backups taken on `date`.
///
/// # Errors
///
/// Returns an error when the date cannot be rendered as `YYYYMMDD`.
pub fn backup_dir(source_dir: &Utf8Path, date: Date) -> io::Result<Utf8PathBuf> {
    let stamp = date
        .format(format_description!("[year][month][day]"))
        .map_err(io::Error::other)?;
    Ok(source_dir.join(format!("backup_{stamp}")))
}

/// Copies `input` into today's backup directory (UTC) and returns the path
/// of the copy. An existing copy with the same name is replaced.
///
/// # Errors
///
/// Returns an error when the directory cannot be created or the copy fails.
pub fn back_up(source_dir: &Utf8Path, input: &Utf8Path) -> io::Result<Utf8PathBuf> {
    let directory = backup_dir(source_dir, OffsetDateTime::now_utc().date())?;
    fs::create_dir_all(&directory)?;
    let file_name = input
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "input has no file name"))?;
    let copy = directory.join(file_name);
    fs::copy(input, &copy)?;
    Ok(copy)
}
