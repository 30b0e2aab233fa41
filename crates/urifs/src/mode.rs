//! Access modes.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Access mode a handle is opened in.
///
/// The textual forms follow the classic `fopen` spelling: `r`, `w` and `a`,
/// optionally followed by `b` (binary) and/or `+` (update).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// `r`
    #[default]
    Read,
    /// `rb`
    ReadBinary,
    /// `r+`
    ReadWrite,
    /// `rb+`
    ReadWriteBinary,
    /// `w`
    Write,
    /// `wb`
    WriteBinary,
    /// `w+`
    WritePlus,
    /// `wb+`
    WritePlusBinary,
    /// `a`
    Append,
    /// `ab`
    AppendBinary,
    /// `a+`
    AppendPlus,
    /// `ab+`
    AppendPlusBinary,
}

impl Mode {
    /// All recognized modes.
    pub const ALL: [Mode; 12] = [
        Mode::Read,
        Mode::ReadBinary,
        Mode::ReadWrite,
        Mode::ReadWriteBinary,
        Mode::Write,
        Mode::WriteBinary,
        Mode::WritePlus,
        Mode::WritePlusBinary,
        Mode::Append,
        Mode::AppendBinary,
        Mode::AppendPlus,
        Mode::AppendPlusBinary,
    ];

    /// Textual form, e.g. `"wb+"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Read => "r",
            Mode::ReadBinary => "rb",
            Mode::ReadWrite => "r+",
            Mode::ReadWriteBinary => "rb+",
            Mode::Write => "w",
            Mode::WriteBinary => "wb",
            Mode::WritePlus => "w+",
            Mode::WritePlusBinary => "wb+",
            Mode::Append => "a",
            Mode::AppendBinary => "ab",
            Mode::AppendPlus => "a+",
            Mode::AppendPlusBinary => "ab+",
        }
    }

    /// Binary flag (`b`). Content is bytes either way; kept for round-tripping.
    pub fn is_binary(self) -> bool {
        self.as_str().contains('b')
    }

    /// Write or append mode. These may create the resource, so content access
    /// on a missing resource is allowed, and parent directories are created
    /// before the first local write.
    pub fn is_write_capable(self) -> bool {
        matches!(self.as_str().as_bytes().first(), Some(b'w' | b'a'))
    }

    /// Whether content can be read back through the stream.
    pub fn is_readable(self) -> bool {
        self.as_str().starts_with('r') || self.as_str().contains('+')
    }

    /// Whether content can be written through the stream.
    pub fn is_writable(self) -> bool {
        self.is_write_capable() || self.as_str().contains('+')
    }

    /// Local open flags for this mode.
    pub(crate) fn open_options(self) -> tokio::fs::OpenOptions {
        let mut options = tokio::fs::OpenOptions::new();
        match self.as_str().as_bytes()[0] {
            b'w' => {
                options.write(true).create(true).truncate(true);
            }
            b'a' => {
                options.append(true).create(true);
            }
            _ => {}
        }
        options.read(self.is_readable());
        if self.as_str().starts_with('r') && self.is_writable() {
            options.write(true);
        }
        options
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| Error::Mode(s.to_string()))
    }
}
