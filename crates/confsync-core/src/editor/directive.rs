//! CRUD over the auxiliary name-resolution entries file

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use super::{ensure_file, read_or_empty};
use crate::entry::{self, DirectiveEntry, ParsedLine};
use crate::error::{Error, Result};
use crate::traits::ServiceReloader;

/// Structured editor for name-resolution directives
///
/// Lines that are not directives (comments, unrelated statements) survive all
/// operations byte-for-byte.
pub struct DirectiveEditor {
    path: PathBuf,
    reloader: Arc<dyn ServiceReloader>,
}

impl DirectiveEditor {
    pub fn new(path: impl Into<PathBuf>, reloader: Arc<dyn ServiceReloader>) -> Self {
        Self {
            path: path.into(),
            reloader,
        }
    }

    /// All directives currently in the file, in file order
    ///
    /// A missing file reads as empty.
    pub async fn entries(&self) -> Result<Vec<DirectiveEntry>> {
        let blob = read_or_empty(&self.path).await?;
        Ok(blob
            .lines()
            .filter_map(|line| match entry::parse_line(line) {
                Some(ParsedLine::Directive(e)) => Some(e),
                _ => None,
            })
            .collect())
    }

    /// Append a directive, creating the file and parent directories on demand
    pub async fn add(&self, entry: &DirectiveEntry) -> Result<()> {
        ensure_file(&self.path).await?;
        let mut blob = tokio::fs::read_to_string(&self.path).await?;
        blob.push('\n');
        blob.push_str(&entry::attach_comment(entry.to_line(), &entry.comment));
        tokio::fs::write(&self.path, blob).await?;

        info!(path = %self.path.display(), kind = %entry.kind, domain = %entry.domain, "directive added");
        self.reloader.reload().await
    }

    /// Replace the first line matching `old` with the canonical line for `new`
    ///
    /// Matching ignores trailing comments on both sides. The replacement line
    /// carries no comment: the original one is dropped, not transferred.
    pub async fn update(&self, old: &DirectiveEntry, new: &DirectiveEntry) -> Result<()> {
        self.modify(old, Some(new)).await
    }

    /// Remove the first line matching `entry`
    pub async fn delete(&self, entry: &DirectiveEntry) -> Result<()> {
        self.modify(entry, None).await
    }

    async fn modify(&self, target: &DirectiveEntry, new: Option<&DirectiveEntry>) -> Result<()> {
        let blob = tokio::fs::read_to_string(&self.path).await?;
        let target_line = target.to_line();

        let mut out: Vec<String> = Vec::new();
        let mut found = false;
        for line in blob.split('\n') {
            let (content, _comment) = entry::split_comment(line);
            if !found && content == target_line {
                found = true;
                if let Some(new) = new {
                    out.push(new.to_line());
                }
                continue;
            }
            out.push(line.to_string());
        }

        if !found {
            return Err(Error::not_found(format!(
                "directive entry {target_line} not present in {}",
                self.path.display()
            )));
        }

        tokio::fs::write(&self.path, out.join("\n")).await?;
        info!(path = %self.path.display(), line = %target_line, "directive modified");
        self.reloader.reload().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::DirectiveKind;
    use crate::traits::reloader::NoopReloader;
    use tempfile::tempdir;

    fn editor(path: &std::path::Path) -> DirectiveEditor {
        DirectiveEditor::new(path, Arc::new(NoopReloader))
    }

    #[tokio::test]
    async fn entries_preserve_comments_and_skip_unmatched_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.conf");
        tokio::fs::write(
            &path,
            "\naddress=/domain1.com/1.2.3.4 # Comment 1\ncname=domain2.com,target.com # Comment 2\ntxt-record=domain3.com,\"some text\" # Comment 3\naddress=/domain4.com/5.6.7.8\n",
        )
        .await
        .unwrap();

        let entries = editor(&path).entries().await.unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].comment, "Comment 1");
        assert_eq!(entries[1].comment, "Comment 2");
        assert_eq!(entries[2].comment, "Comment 3");
        assert_eq!(entries[3].comment, "");
    }

    #[tokio::test]
    async fn entries_of_missing_file_are_empty() {
        let dir = tempdir().unwrap();
        let entries = editor(&dir.path().join("absent.conf")).entries().await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn add_appends_canonical_line_with_comment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/custom.conf");
        let ed = editor(&path);

        ed.add(&DirectiveEntry::new(
            DirectiveKind::AddressMap,
            "new.com",
            "9.9.9.9",
            "note",
        ))
        .await
        .unwrap();

        let blob = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(blob.contains("address=/new.com/9.9.9.9 # note"));

        let entries = ed.entries().await.unwrap();
        assert_eq!(entries.last().unwrap().domain, "new.com");
        assert_eq!(entries.last().unwrap().comment, "note");
    }

    #[tokio::test]
    async fn update_replaces_only_first_match_in_file_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.conf");
        tokio::fs::write(
            &path,
            "address=/dup.com/1.1.1.1\naddress=/dup.com/1.1.1.1\n",
        )
        .await
        .unwrap();

        let ed = editor(&path);
        let old = DirectiveEntry::new(DirectiveKind::AddressMap, "dup.com", "1.1.1.1", "");
        let new = DirectiveEntry::new(DirectiveKind::AddressMap, "dup.com", "2.2.2.2", "");
        ed.update(&old, &new).await.unwrap();

        let blob = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(blob, "address=/dup.com/2.2.2.2\naddress=/dup.com/1.1.1.1\n");
    }

    // Pins legacy behavior: the matched line's trailing comment is discarded
    // on update and no replacement comment is accepted.
    #[tokio::test]
    async fn update_discards_trailing_comment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.conf");
        tokio::fs::write(&path, "address=/a.com/1.1.1.1 # keep me?\n").await.unwrap();

        let ed = editor(&path);
        let old = DirectiveEntry::new(DirectiveKind::AddressMap, "a.com", "1.1.1.1", "");
        let new = DirectiveEntry::new(DirectiveKind::AddressMap, "a.com", "2.2.2.2", "wanted");
        ed.update(&old, &new).await.unwrap();

        let blob = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(blob, "address=/a.com/2.2.2.2\n");
    }

    #[tokio::test]
    async fn update_matches_lines_that_carry_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.conf");
        tokio::fs::write(&path, "cname=a.com,b.com # old note\n").await.unwrap();

        let ed = editor(&path);
        let old = DirectiveEntry::new(DirectiveKind::Cname, "a.com", "b.com", "");
        let new = DirectiveEntry::new(DirectiveKind::Cname, "a.com", "c.com", "");
        ed.update(&old, &new).await.unwrap();

        let blob = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(blob, "cname=a.com,c.com\n");
    }

    #[tokio::test]
    async fn delete_removes_line_and_keeps_unrelated_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.conf");
        tokio::fs::write(
            &path,
            "# header\naddress=/a.com/1.1.1.1\nunrelated-statement\n",
        )
        .await
        .unwrap();

        let ed = editor(&path);
        ed.delete(&DirectiveEntry::new(
            DirectiveKind::AddressMap,
            "a.com",
            "1.1.1.1",
            "",
        ))
        .await
        .unwrap();

        let blob = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(blob, "# header\nunrelated-statement\n");
    }

    #[tokio::test]
    async fn missing_entry_is_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.conf");
        tokio::fs::write(&path, "address=/a.com/1.1.1.1\n").await.unwrap();

        let ed = editor(&path);
        let absent = DirectiveEntry::new(DirectiveKind::Cname, "b.com", "c.com", "");
        let err = ed.delete(&absent).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
