//! Uploaded ROM images and their content identity.

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RomError;

/// Accepted upload extension (compared case-insensitively).
pub const ROM_EXTENSION: &str = ".gba";

/// Hex characters kept from the content hash.
const IDENTITY_LEN: usize = 16;

/// Truncated SHA-256 of the ROM bytes: 16 lowercase hex characters.
///
/// Identical bytes give the same identity whatever the file is called. The
/// truncation to 64 bits makes collisions possible; they are not detected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RomIdentity(String);

impl RomIdentity {
    #[must_use]
    pub fn from_rom(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut hex = String::with_capacity(IDENTITY_LEN);
        for byte in &digest[..IDENTITY_LEN / 2] {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// Accept an identity read back from storage.
    ///
    /// `None` unless `hex` is exactly 16 lowercase hex characters.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == IDENTITY_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RomIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reject anything not named `*.gba`.
///
/// # Errors
///
/// [`RomError::WrongExtension`] for other names.
pub fn check_extension(name: &str) -> Result<(), RomError> {
    if name.to_ascii_lowercase().ends_with(ROM_EXTENSION) {
        Ok(())
    } else {
        Err(RomError::WrongExtension(name.to_string()))
    }
}

/// An accepted upload: file name, bytes, and identity.
#[derive(Debug, Clone)]
pub struct RomImage {
    name: String,
    bytes: Vec<u8>,
    identity: RomIdentity,
}

impl RomImage {
    /// # Errors
    ///
    /// [`RomError::WrongExtension`] when `name` does not end in `.gba`.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, RomError> {
        let name = name.into();
        check_extension(&name)?;
        let identity = RomIdentity::from_rom(&bytes);
        Ok(Self {
            name,
            bytes,
            identity,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn identity(&self) -> &RomIdentity {
        &self.identity
    }
}

/// File name with its final extension removed (`a.b.gba` → `a.b`).
#[must_use]
pub fn base_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name,
    }
}

/// Format with comma thousands separators: `4096` → `4,096`.
#[must_use]
pub fn format_byte_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
