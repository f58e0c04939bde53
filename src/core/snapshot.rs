//! Directory snapshots for finding the file a download produced

use crate::error::Result;
use std::collections::HashSet;
use std::path::Path;
use std::time::SystemTime;
use tokio::fs;

/// Suffixes the tool uses for unfinished artifacts
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

/// One directory entry as seen after a download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub name: String,
    pub modified: SystemTime,
}

fn is_partial(name: &str) -> bool {
    PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Names currently in `dir`, taken before the tool runs
pub async fn capture(dir: &Path) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Files in `dir` with their modification times, in listing order
pub async fn list_files(dir: &Path) -> Result<Vec<EntrySnapshot>> {
    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        files.push(EntrySnapshot {
            name: entry.file_name().to_string_lossy().into_owned(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    Ok(files)
}

/// Pick the produced file: the first new name, else the newest file.
///
/// When several new files appear the first in listing order wins; listing
/// order is whatever the filesystem returns.
pub fn pick_new_file(before: &HashSet<String>, after: &[EntrySnapshot]) -> Option<String> {
    let candidates = || after.iter().filter(|e| !is_partial(&e.name));

    if let Some(fresh) = candidates().find(|e| !before.contains(&e.name)) {
        return Some(fresh.name.clone());
    }

    candidates()
        .max_by_key(|e| e.modified)
        .map(|e| e.name.clone())
}

/// Compare `dir` against an earlier snapshot
pub async fn find_new_file(dir: &Path, before: &HashSet<String>) -> Result<Option<String>> {
    let after = list_files(dir).await?;
    Ok(pick_new_file(before, &after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(name: &str, secs: u64) -> EntrySnapshot {
        EntrySnapshot {
            name: name.into(),
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_file_is_found() {
        let before = names(&["a", "b"]);
        let after = [entry("a", 1), entry("b", 2), entry("c", 3)];
        assert_eq!(pick_new_file(&before, &after).as_deref(), Some("c"));
    }

    #[test]
    fn test_overwrite_falls_back_to_newest() {
        let before = names(&["a"]);
        let after = [entry("a", 10)];
        assert_eq!(pick_new_file(&before, &after).as_deref(), Some("a"));

        let before = names(&["old", "touched"]);
        let after = [entry("old", 5), entry("touched", 50)];
        assert_eq!(pick_new_file(&before, &after).as_deref(), Some("touched"));
    }

    #[test]
    fn test_empty_directory_is_not_found() {
        assert_eq!(pick_new_file(&names(&["a"]), &[]), None);
    }

    #[test]
    fn test_partial_artifacts_are_ignored() {
        let before = names(&["a.mp4"]);
        let after = [entry("a.mp4", 1), entry("b.mp4.part", 9)];
        assert_eq!(pick_new_file(&before, &after).as_deref(), Some("a.mp4"));

        let after = [entry("c.f137.mp4.ytdl", 9)];
        assert_eq!(pick_new_file(&HashSet::new(), &after), None);
    }

    #[tokio::test]
    async fn test_directory_round() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("existing.mp4"), b"old").unwrap();

        let before = capture(dir.path()).await.unwrap();
        assert!(before.contains("existing.mp4"));

        std::fs::write(dir.path().join("Fresh Clip.webm"), b"new").unwrap();
        let found = find_new_file(dir.path(), &before).await.unwrap();
        assert_eq!(found.as_deref(), Some("Fresh Clip.webm"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(capture(&gone).await.is_err());
    }
}
