use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::ArchiveCodec;

/// A file that asked for a password, bound to the codec that can test it.
#[derive(Clone)]
pub struct ProtectedArchive {
    path: PathBuf,
    codec: Arc<dyn ArchiveCodec>,
}

impl ProtectedArchive {
    pub fn new(path: impl Into<PathBuf>, codec: Arc<dyn ArchiveCodec>) -> Self {
        Self {
            path: path.into(),
            codec,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn codec(&self) -> &Arc<dyn ArchiveCodec> {
        &self.codec
    }

    /// File name used as the seed for generated guesses.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl fmt::Debug for ProtectedArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedArchive")
            .field("path", &self.path)
            .field("codec", &self.codec.name())
            .finish()
    }
}

/// A confirmed password for one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundPassword {
    pub file: PathBuf,
    pub password: String,
}

const FILE_TAG: &str = "File: ";
const PASSWORD_TAG: &str = " | Password: ";

impl FoundPassword {
    pub fn new(file: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            password: password.into(),
        }
    }

    /// Line written to the found-passwords file, without newline.
    pub fn to_line(&self) -> String {
        format!("{FILE_TAG}{}{PASSWORD_TAG}{}", self.file.display(), self.password)
    }

    /// Parse a line written by [`to_line`](Self::to_line).
    ///
    /// Splits at the first delimiter, so passwords may contain it.
    pub fn parse_line(line: &str) -> Option<Self> {
        let rest = line.strip_prefix(FILE_TAG)?;
        let (file, password) = rest.split_once(PASSWORD_TAG)?;
        if file.is_empty() {
            return None;
        }
        Some(Self::new(file, password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_line_format() {
        let found = FoundPassword::new("/data/invoice_2023.zip", "Invoice2023!");
        assert_eq!(
            found.to_line(),
            "File: /data/invoice_2023.zip | Password: Invoice2023!"
        );
        assert_eq!(FoundPassword::parse_line(&found.to_line()), Some(found));
    }

    #[test]
    fn password_may_contain_delimiter() {
        let found = FoundPassword::new("a.zip", "x | Password: y");
        assert_eq!(FoundPassword::parse_line(&found.to_line()), Some(found));
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert_eq!(FoundPassword::parse_line("a.zip:secret"), None);
        assert_eq!(FoundPassword::parse_line("File:  | Password: x"), None);
        assert_eq!(FoundPassword::parse_line(""), None);
    }
}
