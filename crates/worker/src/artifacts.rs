//! Deck artifact files for the engine.
//!
//! Files live under the deck root, optionally inside a per-format
//! subdirectory, and are referenced by the engine with paths relative to
//! that root.

use std::io;
use std::path::{Path, PathBuf};

use deckbench_core::deck::DeckDefinition;
use deckbench_core::resolver::ResolvedMatch;
use deckbench_core::types::DbId;

/// Writes rendered decks below a fixed root directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Make sure the deck root exists.
    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Write one deck for job `job_id` and return its path relative to the
    /// root.
    ///
    /// The file name is prefixed with the job id so concurrent jobs playing
    /// different versions of a same-named deck never share a file. The
    /// `Name=` line inside keeps the plain deck name. The file is written to
    /// a temporary sibling and renamed into place. Rewriting overwrites.
    pub async fn write(
        &self,
        job_id: DbId,
        deck: &DeckDefinition,
        subdir: Option<&str>,
    ) -> io::Result<PathBuf> {
        let file_name = format!("{job_id}-{}", deck.file_name());
        let relative = match subdir {
            Some(dir) => Path::new(dir).join(&file_name),
            None => PathBuf::from(&file_name),
        };
        let target = self.root.join(&relative);
        let dir = target.parent().unwrap_or(&self.root);
        tokio::fs::create_dir_all(dir).await?;

        let temp = dir.join(format!(".{file_name}.{}.tmp", DbId::new_v4()));
        if let Err(e) = tokio::fs::write(&temp, deck.render()).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        tracing::debug!(path = %target.display(), cards = deck.card_count(), "Deck artifact written");
        Ok(relative)
    }

    /// Write every engine deck of a match, in engine slot order.
    ///
    /// On failure the files already written for this match are removed.
    pub async fn write_match(
        &self,
        job_id: DbId,
        resolved: &ResolvedMatch,
    ) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(resolved.decks.len());
        for deck in &resolved.decks {
            match self.write(job_id, deck, resolved.deck_subdir).await {
                Ok(path) => paths.push(path),
                Err(e) => {
                    self.remove_all(&paths).await;
                    return Err(e);
                }
            }
        }
        Ok(paths)
    }

    /// Delete artifacts returned by [`write_match`](Self::write_match).
    ///
    /// Missing files are ignored; other failures are logged.
    pub async fn remove_all(&self, paths: &[PathBuf]) {
        for relative in paths {
            let path = self.root.join(relative);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Could not remove deck artifact");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use deckbench_core::deck::CardLine;

    use super::*;

    fn deck(name: &str, card: &str) -> DeckDefinition {
        DeckDefinition::new(name, vec![CardLine::new(card, 4, Some("M19"))])
    }

    // -- write --------------------------------------------------------------

    #[tokio::test]
    async fn writes_into_format_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let job = DbId::new_v4();

        let path = writer
            .write(job, &deck("Elves", "Llanowar Elves"), Some("constructed"))
            .await
            .unwrap();
        assert_eq!(path, PathBuf::from(format!("constructed/{job}-Elves.dck")));

        let content = std::fs::read_to_string(dir.path().join(&path)).unwrap();
        assert!(content.starts_with("[metadata]\nName=Elves\n"));
        assert!(content.contains("4 Llanowar Elves|M19|1"));
    }

    #[tokio::test]
    async fn rewriting_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());
        let job = DbId::new_v4();

        writer.write(job, &deck("Elves", "Llanowar Elves"), None).await.unwrap();
        let path = writer.write(job, &deck("Elves", "Elvish Mystic"), None).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join(&path)).unwrap();
        assert!(content.contains("Elvish Mystic"));
        assert!(!content.contains("Llanowar Elves"));

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, [format!("{job}-Elves.dck")]);
    }

    #[tokio::test]
    async fn same_named_decks_of_different_jobs_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        let first = writer
            .write(DbId::new_v4(), &deck("Elves", "Llanowar Elves"), Some("constructed"))
            .await
            .unwrap();
        let second = writer
            .write(DbId::new_v4(), &deck("Elves", "Elvish Mystic"), Some("constructed"))
            .await
            .unwrap();
        assert_ne!(first, second);

        let first = std::fs::read_to_string(dir.path().join(&first)).unwrap();
        let second = std::fs::read_to_string(dir.path().join(&second)).unwrap();
        assert!(first.contains("Name=Elves") && first.contains("Llanowar Elves"));
        assert!(second.contains("Name=Elves") && second.contains("Elvish Mystic"));
    }

    #[tokio::test]
    async fn deck_names_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        let path = writer
            .write(DbId::new_v4(), &deck("../../etc/passwd", "Island"), None)
            .await
            .unwrap();
        assert!(path.components().count() == 1);
        assert!(dir.path().join(&path).exists());
    }

    // -- remove_all ---------------------------------------------------------

    #[tokio::test]
    async fn removes_written_files_and_ignores_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path());

        let path = writer
            .write(DbId::new_v4(), &deck("Elves", "Llanowar Elves"), Some("constructed"))
            .await
            .unwrap();
        writer
            .remove_all(&[path.clone(), PathBuf::from("constructed/gone.dck")])
            .await;
        assert!(!dir.path().join(&path).exists());
    }
}
