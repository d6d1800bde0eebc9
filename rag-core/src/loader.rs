//! Corpus sources that turn raw files into [`Document`]s.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Somewhere the pipeline can read its corpus from.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Load every document in the source, in a stable order.
    async fn load(&self) -> Result<Vec<Document>>;
}

/// Loads plain-text files from a single file or a directory tree.
///
/// Directories are walked recursively and files are returned sorted by path,
/// so repeated loads yield the same document order. Each document's `id` is
/// the file path.
#[derive(Debug, Clone)]
pub struct TextFileLoader {
    path: PathBuf,
    extension: String,
}

impl TextFileLoader {
    /// Load `.txt` files from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), extension: "txt".to_string() }
    }

    /// Match files with this extension instead of `txt`.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn discover(&self) -> Result<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        if !self.path.is_dir() {
            return Err(RagError::Loader {
                source_id: self.path.display().to_string(),
                message: "path is neither a file nor a directory".to_string(),
            });
        }

        let mut files = WalkDir::new(&self.path)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry.path().extension().is_some_and(|ext| ext == self.extension.as_str())
            })
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>();
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl CorpusSource for TextFileLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for file in self.discover()? {
            documents.push(read_document(&file).await?);
        }
        debug!(path = %self.path.display(), documents = documents.len(), "loaded corpus");
        Ok(documents)
    }
}

async fn read_document(path: &Path) -> Result<Document> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| RagError::Loader {
        source_id: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut document = Document::new(path.display().to_string(), text);
    document.source_uri = Some(format!("file://{}", path.display()));
    Ok(document)
}

/// A fixed, in-memory corpus.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus {
    documents: Vec<Document>,
}

impl StaticCorpus {
    /// Wrap the given documents.
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Build a corpus from bare strings, naming them `doc-0`, `doc-1`, ...
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let documents = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Document::new(format!("doc-{i}"), text))
            .collect();
        Self { documents }
    }
}

#[async_trait]
impl CorpusSource for StaticCorpus {
    async fn load(&self) -> Result<Vec<Document>> {
        Ok(self.documents.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn loads_text_files_sorted_and_recursively() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("b.txt"), "second").unwrap();
        fs::write(root.join("a.txt"), "first").unwrap();
        fs::write(root.join("nested/c.txt"), "third").unwrap();
        fs::write(root.join("notes.md"), "ignored").unwrap();

        let documents = TextFileLoader::new(root).load().await.unwrap();
        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert!(documents[0].id.ends_with("a.txt"));
    }

    #[tokio::test]
    async fn loads_single_file() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("guide.md");
        fs::write(&file, "# Guide").unwrap();

        let documents = TextFileLoader::new(&file).load().await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].text, "# Guide");
    }

    #[tokio::test]
    async fn missing_path_is_a_loader_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = TextFileLoader::new(temp.path().join("absent")).load().await.unwrap_err();
        assert!(matches!(err, RagError::Loader { .. }));
    }

    #[tokio::test]
    async fn static_corpus_names_documents() {
        let corpus = StaticCorpus::from_texts(["one", "two"]);
        let documents = corpus.load().await.unwrap();
        assert_eq!(documents[1].id, "doc-1");
        assert_eq!(documents[1].text, "two");
    }
}
