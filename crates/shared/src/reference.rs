use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_REFERENCE_DOCUMENT_PATH: &str = "unisole.txt";
pub const FALLBACK_REFERENCE_TEXT: &str = "Error loading company information. Please check that unisole.txt exists in the same directory as this script.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// Where the cached reference text came from. Diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceOrigin {
    File { path: String, encoding: TextEncoding },
    Fallback { reason: String },
}

impl ReferenceOrigin {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceDocument {
    text: String,
    origin: ReferenceOrigin,
}

impl ReferenceDocument {
    pub fn new(text: impl Into<String>, origin: ReferenceOrigin) -> Self {
        Self {
            text: text.into(),
            origin,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> &ReferenceOrigin {
        &self.origin
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceLoader {
    path: PathBuf,
}

impl ReferenceLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: unreadable sources yield [`FALLBACK_REFERENCE_TEXT`].
    pub fn load(&self) -> ReferenceDocument {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "reference document unavailable; using built-in fallback"
                );
                return ReferenceDocument::new(
                    FALLBACK_REFERENCE_TEXT,
                    ReferenceOrigin::Fallback {
                        reason: err.to_string(),
                    },
                );
            }
        };

        let (text, encoding) = decode_text(bytes);
        info!(
            path = %self.path.display(),
            encoding = ?encoding,
            chars = text.chars().count(),
            "loaded reference document"
        );

        ReferenceDocument::new(
            text,
            ReferenceOrigin::File {
                path: self.path.display().to_string(),
                encoding,
            },
        )
    }
}

impl Default for ReferenceLoader {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_DOCUMENT_PATH)
    }
}

fn decode_text(bytes: Vec<u8>) -> (String, TextEncoding) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, TextEncoding::Utf8),
        Err(err) => {
            // Latin-1 maps each byte to the code point of the same value.
            let text = err.into_bytes().into_iter().map(char::from).collect();
            (text, TextEncoding::Latin1)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use uuid::Uuid;

    use super::{FALLBACK_REFERENCE_TEXT, ReferenceLoader, ReferenceOrigin, TextEncoding};

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("reference-{}.txt", Uuid::new_v4()))
    }

    #[test]
    fn utf8_document_is_loaded_verbatim() {
        let path = temp_path();
        std::fs::write(&path, "UniSole: empowering teams ✓ café").expect("fixture should write");

        let document = ReferenceLoader::new(&path).load();

        assert_eq!(document.text(), "UniSole: empowering teams ✓ café");
        assert!(matches!(
            document.origin(),
            ReferenceOrigin::File {
                encoding: TextEncoding::Utf8,
                ..
            }
        ));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn invalid_utf8_falls_back_to_latin1() {
        let path = temp_path();
        std::fs::write(&path, [b'c', b'a', b'f', 0xE9]).expect("fixture should write");

        let document = ReferenceLoader::new(&path).load();

        assert_eq!(document.text(), "café");
        assert!(matches!(
            document.origin(),
            ReferenceOrigin::File {
                encoding: TextEncoding::Latin1,
                ..
            }
        ));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_document_returns_fixed_fallback() {
        let document = ReferenceLoader::new(temp_path()).load();

        assert_eq!(document.text(), FALLBACK_REFERENCE_TEXT);
        assert!(document.origin().is_fallback());
    }

    #[test]
    fn directory_path_returns_fixed_fallback() {
        let document = ReferenceLoader::new(std::env::temp_dir()).load();

        assert_eq!(document.text(), FALLBACK_REFERENCE_TEXT);
    }

    #[test]
    fn repeated_loads_are_identical() {
        let path = temp_path();
        std::fs::write(&path, "stable text").expect("fixture should write");
        let loader = ReferenceLoader::new(&path);

        assert_eq!(loader.load(), loader.load());
        let _ = std::fs::remove_file(path);
    }
}
