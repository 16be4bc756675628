// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed identifiers.
//!
//! Every generated ID is `{prefix}{suffix}`: a 4-char type tag followed
//! by 128 random bits as 32 lowercase hex chars, 36 bytes total. IDs
//! live inline (no heap, `Copy`) and implement `Borrow<str>` so maps
//! keyed by ID can be queried with plain strings.

/// Bytes in a type prefix, e.g. `"ses-"`.
pub const PREFIX_LEN: usize = 4;

/// Hex chars encoding the 128-bit random suffix.
pub const SUFFIX_LEN: usize = 32;

/// Full length of a generated ID; also the inline storage cap.
pub const GENERATED_LEN: usize = PREFIX_LEN + SUFFIX_LEN;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Inline ID storage.
///
/// Generated IDs always fill the buffer; parsed IDs (test fixtures,
/// references minted elsewhere) may be shorter. Unused tail bytes are
/// zero, so derived equality matches string equality.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawId {
    bytes: [u8; GENERATED_LEN],
    len: u8,
}

impl RawId {
    pub const fn empty() -> Self {
        Self { bytes: [0; GENERATED_LEN], len: 0 }
    }

    /// Mint a fresh ID: prefix plus 128 random bits hex-encoded in
    /// place, no intermediate allocation.
    pub fn generate(prefix: &str) -> Self {
        debug_assert_eq!(prefix.len(), PREFIX_LEN, "prefix must be {PREFIX_LEN} bytes: {prefix:?}");
        let mut bytes = [0u8; GENERATED_LEN];
        let head = prefix.len().min(PREFIX_LEN);
        bytes[..head].copy_from_slice(&prefix.as_bytes()[..head]);

        let mut random = uuid::Uuid::new_v4().as_u128();
        for slot in bytes[head..].iter_mut().rev() {
            *slot = HEX[(random & 0xf) as usize];
            random >>= 4;
        }
        Self { bytes, len: GENERATED_LEN as u8 }
    }

    /// Wrap an existing ID string, truncating past the inline cap on a
    /// char boundary (debug builds assert instead).
    pub fn parse(s: &str) -> Self {
        debug_assert!(s.len() <= GENERATED_LEN, "ID exceeds {GENERATED_LEN} bytes: {s:?}");
        let mut end = s.len().min(GENERATED_LEN);
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; GENERATED_LEN];
        bytes[..end].copy_from_slice(&s.as_bytes()[..end]);
        Self { bytes, len: end as u8 }
    }

    pub fn as_str(&self) -> &str {
        // Construction only admits str content or ASCII hex.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// Hash the active bytes only, matching str::hash so Borrow<str> map
// lookups behave.
impl std::hash::Hash for RawId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl std::borrow::Borrow<str> for RawId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Debug for RawId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for RawId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for RawId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for RawId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.len() > GENERATED_LEN {
            return Err(serde::de::Error::custom(format!(
                "ID exceeds {GENERATED_LEN} bytes: {s:?}"
            )));
        }
        Ok(RawId::parse(&s))
    }
}

/// Define a newtype ID wrapper around [`RawId`] with a type prefix.
///
/// Generates `new()` (random), `parse()` (wrap an existing string),
/// `as_str()`, `suffix()`, `short()`, plus the `Display`/`From`/
/// `AsRef`/`Borrow` glue map keys and log lines need.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct SessionId("ses-");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name($crate::id::RawId);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Mint a fresh random ID.
            pub fn new() -> Self {
                Self($crate::id::RawId::generate(Self::PREFIX))
            }

            /// Wrap an existing ID string.
            pub fn parse(id: impl AsRef<str>) -> Self {
                Self($crate::id::RawId::parse(id.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// The random part, without the type prefix.
            pub fn suffix(&self) -> &str {
                self.as_str().strip_prefix(Self::PREFIX).unwrap_or_else(|| self.as_str())
            }

            /// Abbreviated suffix for log lines.
            pub fn short(&self, n: usize) -> &str {
                let suffix = self.suffix();
                &suffix[..n.min(suffix.len())]
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::parse(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::parse(&s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.as_str() == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }
    };
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
