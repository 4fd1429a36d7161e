//! Study materials for the prompt's context slot
//!
//! There is no retrieval yet: questions get a placeholder unless the student
//! has attached a text file, in which case a bounded excerpt of that file is
//! used instead.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Context used when no material is attached.
pub const PLACEHOLDER_MATERIALS: &str = "Relevant study materials will appear here...";

/// Characters of an attached file that reach the prompt.
pub const CONTEXT_CHAR_LIMIT: usize = 1000;

/// Characters of an attached file shown in the chat log.
pub const PREVIEW_CHAR_LIMIT: usize = 200;

pub const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: file is not valid UTF-8 text")]
    NotUtf8 { path: String },
}

/// A text file the student uploaded.
#[derive(Debug, Clone)]
pub struct StudyMaterial {
    pub path: PathBuf,
    pub content: String,
}

impl StudyMaterial {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MaterialError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| MaterialError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let content = String::from_utf8(bytes).map_err(|_| MaterialError::NotUtf8 {
            path: path.display().to_string(),
        })?;

        tracing::info!(path = %path.display(), chars = content.chars().count(), "loaded study material");

        Ok(Self {
            path: path.to_path_buf(),
            content,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// The part of the file that is handed to the model.
    pub fn context_excerpt(&self) -> String {
        excerpt(&self.content, CONTEXT_CHAR_LIMIT)
    }

    pub fn preview(&self) -> String {
        excerpt(&self.content, PREVIEW_CHAR_LIMIT)
    }

    /// Chat log entry announcing the upload.
    pub fn upload_notice(&self) -> String {
        format!(
            "Uploaded study material: {}\nContent preview: {}",
            self.path.display(),
            self.preview()
        )
    }
}

/// Materials offered to the prompt's context slot.
#[derive(Debug, Clone, Default)]
pub struct StudyMaterials {
    attached: Option<StudyMaterial>,
}

impl StudyMaterials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a material, replacing any previous one.
    pub fn attach(&mut self, material: StudyMaterial) {
        self.attached = Some(material);
    }

    pub fn detach(&mut self) -> Option<StudyMaterial> {
        self.attached.take()
    }

    pub fn attached(&self) -> Option<&StudyMaterial> {
        self.attached.as_ref()
    }

    /// Context for a question. The question is unused until real retrieval exists.
    pub fn for_question(&self, _question: &str) -> String {
        match &self.attached {
            Some(material) => material.context_excerpt(),
            None => PLACEHOLDER_MATERIALS.to_string(),
        }
    }
}

/// First `limit` characters of `text`, with the marker appended when anything was cut.
pub fn excerpt(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
