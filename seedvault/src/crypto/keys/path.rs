//! BIP-32 derivation paths

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Offset added to an index to mark it hardened
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// One component of a derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildIndex {
    Normal(u32),
    Hardened(u32),
}

impl ChildIndex {
    /// Build a plain component, rejecting indices in the hardened range
    pub fn normal(index: u32) -> Result<Self> {
        if index >= HARDENED_OFFSET {
            return Err(Error::Derivation(format!("Index out of range: {}", index)));
        }
        Ok(Self::Normal(index))
    }

    /// Build a hardened component from its unhardened index
    pub fn hardened(index: u32) -> Result<Self> {
        if index >= HARDENED_OFFSET {
            return Err(Error::Derivation(format!("Index out of range: {}'", index)));
        }
        Ok(Self::Hardened(index))
    }

    pub fn is_hardened(&self) -> bool {
        matches!(self, Self::Hardened(_))
    }

    /// Index as fed to HMAC, with the hardened offset applied
    pub fn effective_index(&self) -> u32 {
        match *self {
            Self::Normal(i) => i,
            Self::Hardened(i) => i + HARDENED_OFFSET,
        }
    }
}

impl fmt::Display for ChildIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(i) => write!(f, "{}", i),
            Self::Hardened(i) => write!(f, "{}'", i),
        }
    }
}

/// An ordered sequence of child indices starting at the master key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DerivationPath(Vec<ChildIndex>);

impl DerivationPath {
    /// The master path `m`
    pub fn master() -> Self {
        Self(Vec::new())
    }

    pub fn components(&self) -> &[ChildIndex] {
        &self.0
    }

    /// New path with `child` appended
    pub fn child(&self, child: ChildIndex) -> Self {
        let mut components = self.0.clone();
        components.push(child);
        Self(components)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<ChildIndex>> for DerivationPath {
    fn from(components: Vec<ChildIndex>) -> Self {
        Self(components)
    }
}

impl FromStr for DerivationPath {
    type Err = Error;

    /// Parse `m/44'/60'/0'/0/3`. `'`, `h` and `H` mark hardened components.
    fn from_str(path: &str) -> Result<Self> {
        let path = path.trim();
        if path.is_empty() {
            return Err(Error::Derivation("Empty derivation path".to_string()));
        }

        let mut parts = path.split('/');
        if parts.next() != Some("m") {
            return Err(Error::Derivation(format!("Invalid derivation path: {}", path)));
        }

        let mut components = Vec::new();
        for component in parts {
            if component.is_empty() {
                return Err(Error::Derivation(format!("Empty component in derivation path: {}", path)));
            }

            let (digits, hardened) = match component.strip_suffix(&['\'', 'h', 'H'][..]) {
                Some(digits) => (digits, true),
                None => (component, false),
            };

            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Error::Derivation(format!("Invalid derivation path component: {}", component)));
            }

            let index = digits
                .parse::<u32>()
                .map_err(|_| Error::Derivation(format!("Invalid derivation path component: {}", component)))?;

            components.push(if hardened {
                ChildIndex::hardened(index)?
            } else {
                ChildIndex::normal(index)?
            });
        }

        Ok(Self(components))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for component in &self.0 {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bip44_path() {
        let path: DerivationPath = "m/44'/60'/0'/0/7".parse().unwrap();
        assert_eq!(
            path.components(),
            &[
                ChildIndex::Hardened(44),
                ChildIndex::Hardened(60),
                ChildIndex::Hardened(0),
                ChildIndex::Normal(0),
                ChildIndex::Normal(7),
            ]
        );
        assert_eq!(path.components()[0].effective_index(), 0x8000_002c);
        assert_eq!(path.to_string(), "m/44'/60'/0'/0/7");
    }

    #[test]
    fn test_alternate_hardened_markers() {
        let a: DerivationPath = "m/44h/0H/1'".parse().unwrap();
        assert_eq!(a.to_string(), "m/44'/0'/1'");
    }

    #[test]
    fn test_master_path() {
        let path: DerivationPath = "m".parse().unwrap();
        assert!(path.is_empty());
        assert_eq!(path, DerivationPath::master());
    }

    #[test]
    fn test_malformed_paths() {
        for bad in ["", "   ", "44'/0'", "m/", "m//0", "m/abc", "m/-1", "m/1''", "m/'", "m/2147483648", "x/0"] {
            let err = bad.parse::<DerivationPath>().unwrap_err();
            assert!(matches!(err, Error::Derivation(_)), "{:?} gave {:?}", bad, err);
        }
    }

    #[test]
    fn test_child_appends_component() {
        let prefix: DerivationPath = "m/44'/0'/0'/0".parse().unwrap();
        let account = prefix.child(ChildIndex::normal(3).unwrap());
        assert_eq!(account.to_string(), "m/44'/0'/0'/0/3");
        assert_eq!(prefix.len(), 4);
    }
}
