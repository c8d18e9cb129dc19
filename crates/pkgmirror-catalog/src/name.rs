use std::fmt;

use crate::error::InvalidPackageName;

/// A validated package identifier.
///
/// The raw spelling names the mirror directory; [`PackageName::canonical`]
/// is what goes into index URLs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(String);

impl PackageName {
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidPackageName> {
        let raw = raw.into();
        let reason = if raw.is_empty() {
            Some("empty name")
        } else if !raw.is_ascii() {
            Some("non-ASCII characters")
        } else if !raw.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-')) {
            Some("characters outside [A-Za-z0-9._-]")
        } else if raw.bytes().all(|b| b == b'.') {
            Some("dot-only name")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(InvalidPackageName { name: raw, reason }),
            None => Ok(Self(raw)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form with each run of `.`, `_` and `-` collapsed to `-`.
    pub fn canonical(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        let mut in_separator = false;
        for c in self.0.chars() {
            if matches!(c, '.' | '_' | '-') {
                if !in_separator {
                    out.push('-');
                }
                in_separator = true;
            } else {
                out.push(c.to_ascii_lowercase());
                in_separator = false;
            }
        }
        out
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
