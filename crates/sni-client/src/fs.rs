//! Filesystem operations on the connected device.

use std::cmp::Ordering;

use sni_proto::sni::{DirEntry as RawDirEntry, DirEntryType};
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    session::SniClient,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Folder,
    File,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Parent path joined with `name`.
    pub path: String,
}

impl DirEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Only rejects the empty path; SNI devices disagree on everything else.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        warn!("could not validate path '{path}': no path provided");
        return Err(Error::InvalidPath);
    }
    Ok(())
}

/// Collapses runs of `/` into one.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(ch);
    }
    out
}

pub fn join_path(parent: &str, name: &str) -> String {
    normalize_path(&format!("{parent}/{name}"))
}

/// Folder holding `path`: everything before the last `/`.
pub fn parent_folder(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn finish_partition(
    mut names: Vec<String>,
    kind: EntryKind,
    parent: &str,
    ignore: &[String],
) -> Vec<DirEntry> {
    names.retain(|name| !name.starts_with('.') && !ignore.iter().any(|ig| ig == name));
    names.sort_by(|a, b| compare_names(a, b));
    names
        .into_iter()
        .map(|name| DirEntry {
            path: join_path(parent, &name),
            name,
            kind,
        })
        .collect()
}

/// Folders first, then files, each sorted case-insensitively. Hidden
/// (dot-prefixed) entries are dropped; `ignore_folders` applies to folders only.
pub fn normalize_listing(
    raw: Vec<RawDirEntry>,
    parent: &str,
    ignore_folders: &[String],
) -> Vec<DirEntry> {
    let mut folders = Vec::new();
    let mut files = Vec::new();
    for entry in raw {
        match DirEntryType::try_from(entry.r#type) {
            Ok(DirEntryType::Directory) => folders.push(entry.name),
            Ok(DirEntryType::File) => files.push(entry.name),
            Err(_) => debug!("skipping {} with unknown entry type {}", entry.name, entry.r#type),
        }
    }
    let mut listing = finish_partition(folders, EntryKind::Folder, parent, ignore_folders);
    listing.extend(finish_partition(files, EntryKind::File, parent, &[]));
    listing
}

impl SniClient {
    pub async fn read_directory(&self, path: &str) -> Result<Vec<DirEntry>> {
        let uri = self.require_session()?;
        let raw = self
            .inner
            .backend
            .read_directory(&uri, path)
            .await
            .map_err(Error::rpc("ReadDirectory"))?;
        Ok(normalize_listing(raw, path, &self.inner.options.ignore_folders))
    }

    /// Returns `path` once the device accepted the upload.
    pub async fn put_file(&self, path: &str, contents: Vec<u8>) -> Result<String> {
        let uri = self.require_session()?;
        validate_path(path)?;
        debug!("put {path} ({} bytes) on {uri}", contents.len());
        self.inner
            .backend
            .put_file(&uri, path, contents)
            .await
            .map_err(Error::rpc("PutFile"))?;
        Ok(path.to_string())
    }

    pub async fn boot_file(&self, path: &str) -> Result<String> {
        let uri = self.require_session()?;
        validate_path(path)?;
        self.inner
            .backend
            .boot_file(&uri, path)
            .await
            .map_err(Error::rpc("BootFile"))?;
        Ok(path.to_string())
    }

    pub async fn delete_file(&self, path: &str) -> Result<String> {
        let uri = self.require_session()?;
        validate_path(path)?;
        self.inner
            .backend
            .remove_file(&uri, path)
            .await
            .map_err(Error::rpc("RemoveFile"))?;
        Ok(path.to_string())
    }

    pub async fn make_directory(&self, path: &str) -> Result<String> {
        let uri = self.require_session()?;
        validate_path(path)?;
        self.inner
            .backend
            .make_directory(&uri, path)
            .await
            .map_err(Error::rpc("MakeDirectory"))?;
        Ok(path.to_string())
    }

    /// Renames within the same folder; returns the new path.
    pub async fn rename_file(&self, path: &str, new_filename: &str) -> Result<String> {
        let uri = self.require_session()?;
        validate_path(path)?;
        validate_path(new_filename)?;
        self.inner
            .backend
            .rename_file(&uri, path, new_filename)
            .await
            .map_err(Error::rpc("RenameFile"))?;
        Ok(join_path(parent_folder(path), new_filename))
    }

    pub async fn get_file(&self, path: &str) -> Result<Vec<u8>> {
        let uri = self.require_session()?;
        validate_path(path)?;
        self.inner
            .backend
            .get_file(&uri, path)
            .await
            .map_err(Error::rpc("GetFile"))
    }
}
