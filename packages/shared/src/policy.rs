//! Upload size and extension policy.
//!
//! The desktop client restricts uploads to a single extension and 5 MB, while
//! the server accepts anything by default. Both sides express their rules as
//! an [`UploadPolicy`] so the asymmetry stays a configuration decision.

use thiserror::Error;

/// Size limit applied by the desktop client (5 MB).
pub const DESKTOP_MAX_FILE_BYTES: u64 = 5 * 1024 * 1024;

/// Extension accepted by the desktop client.
pub const DESKTOP_ALLOWED_EXTENSION: &str = "pdf";

/// Reasons an upload is rejected by a policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("File size {size} bytes exceeds the limit of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("File '{file_name}' is not allowed (accepted extensions: {allowed})")]
    ExtensionNotAllowed { file_name: String, allowed: String },
}

/// Extract the extension of `file_name`, including the leading dot.
///
/// The extension is only taken when a `.` exists strictly between the first
/// and the last character, so `".bashrc"` and `"report."` have none.
pub fn file_extension(file_name: &str) -> Option<&str> {
    let index = file_name.rfind('.')?;
    if index > 0 && index < file_name.len() - 1 {
        Some(&file_name[index..])
    } else {
        None
    }
}

/// Upload restrictions enforced before a file is transferred or stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPolicy {
    max_file_bytes: Option<u64>,
    /// Lowercase extensions without the leading dot. Empty means any.
    allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn new<I, S>(max_file_bytes: Option<u64>, allowed_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self {
            max_file_bytes,
            allowed_extensions,
        }
    }

    /// Accept every file.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// The rules applied by the desktop client: 5 MB, `.pdf` only.
    pub fn desktop_default() -> Self {
        Self::new(Some(DESKTOP_MAX_FILE_BYTES), [DESKTOP_ALLOWED_EXTENSION])
    }

    pub fn max_file_bytes(&self) -> Option<u64> {
        self.max_file_bytes
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn is_unrestricted(&self) -> bool {
        self.max_file_bytes.is_none() && self.allowed_extensions.is_empty()
    }

    /// Check a file against the policy.
    pub fn check(&self, file_name: &str, size: u64) -> Result<(), PolicyViolation> {
        if let Some(max) = self.max_file_bytes
            && size > max
        {
            return Err(PolicyViolation::FileTooLarge { size, max });
        }

        if !self.allowed_extensions.is_empty() {
            let extension = file_extension(file_name)
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase());
            let allowed = extension
                .as_ref()
                .is_some_and(|ext| self.allowed_extensions.iter().any(|a| a == ext));
            if !allowed {
                return Err(PolicyViolation::ExtensionNotAllowed {
                    file_name: file_name.to_string(),
                    allowed: self.allowed_extensions.join(", "),
                });
            }
        }

        Ok(())
    }
}
