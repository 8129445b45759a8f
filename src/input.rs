//! Input source abstraction for file and stdin.
//!
//! This module provides the [`Input`] enum for abstracting over different input sources,
//! enabling seamless Unix pipeline integration.
//!
//! # Example
//!
//! ```rust
//! use kmerust::input::Input;
//! use std::path::Path;
//!
//! // From a file path
//! let input = Input::from_path(Path::new("sequences.fa"));
//! assert!(matches!(input, Input::File(_)));
//!
//! // From stdin marker
//! let input = Input::from_path(Path::new("-"));
//! assert!(matches!(input, Input::Stdin));
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::KmerustError;

/// Input source for k-mer counting.
///
/// Represents either a file path or standard input, allowing the same
/// counting logic to work with both input sources.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Input {
    /// Read from a file at the specified path.
    File(PathBuf),
    /// Read from standard input.
    #[default]
    Stdin,
}

impl Input {
    /// Creates an `Input` from a path.
    ///
    /// If the path is "-", returns [`Self::Stdin`].
    /// Otherwise, returns [`Self::File`] with the given path.
    ///
    /// # Example
    ///
    /// ```rust
    /// use kmerust::input::Input;
    /// use std::path::Path;
    ///
    /// let stdin = Input::from_path(Path::new("-"));
    /// assert!(stdin.is_stdin());
    ///
    /// let file = Input::from_path(Path::new("genome.fa"));
    /// assert!(file.is_file());
    /// ```
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        if path.as_os_str() == "-" {
            Self::Stdin
        } else {
            Self::File(path.to_path_buf())
        }
    }

    /// Creates an `Input` from an optional path.
    ///
    /// If `None` or "-", returns [`Self::Stdin`].
    /// Otherwise, returns [`Self::File`] with the given path.
    #[must_use]
    pub fn from_option(path: Option<&Path>) -> Self {
        path.map_or(Self::Stdin, Self::from_path)
    }

    /// Returns `true` if this input is stdin.
    #[must_use]
    pub const fn is_stdin(&self) -> bool {
        matches!(self, Self::Stdin)
    }

    /// Returns `true` if this input is a file.
    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Returns the file path if this is a file input.
    #[must_use]
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Stdin => None,
        }
    }

    /// Returns the byte length of this input, and a version of it that can
    /// be re-opened as a `ReadSource` more than once.
    ///
    /// [`Self::File`] is already re-openable: this is a no-op beyond a
    /// `stat`. [`Self::Stdin`] is not — a `ReadSource` is "lazy, finite, and
    /// non-restartable" (spec.md §2), and stdin is consumed the instant it's
    /// read. Engines that need more than one pass (`BFEngine`) or need the
    /// input size up front (`EngineSelector`) call this once, up front, to
    /// spool stdin to a scratch file under `scratch_dir` and continue as
    /// though it had always been a file.
    pub fn materialize(&self, scratch_dir: &Path) -> Result<(Self, u64), KmerustError> {
        match self {
            Self::File(path) => {
                let len = std::fs::metadata(path)
                    .map_err(|e| KmerustError::io(path, e))?
                    .len();
                Ok((self.clone(), len))
            }
            Self::Stdin => {
                std::fs::create_dir_all(scratch_dir).map_err(|e| KmerustError::io(scratch_dir, e))?;
                let mut tmp = tempfile::Builder::new()
                    .prefix("kmerust-stdin-")
                    .tempfile_in(scratch_dir)
                    .map_err(|e| KmerustError::io(scratch_dir, e))?;
                let len = io::copy(&mut io::stdin().lock(), &mut tmp)
                    .map_err(|e| KmerustError::io("<stdin>", e))?;
                tmp.flush().map_err(|e| KmerustError::io("<stdin>", e))?;
                let (_file, path) = tmp
                    .keep()
                    .map_err(|e| KmerustError::io(scratch_dir, e.error))?;
                Ok((Self::File(path), len))
            }
        }
    }
}

impl std::fmt::Display for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Stdin => write!(f, "<stdin>"),
        }
    }
}
