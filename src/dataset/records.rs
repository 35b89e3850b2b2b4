//! Normalized records produced by the dataset parser.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Code of the set that owns cards published without one.
pub const SENTINEL_SET_CODE: &str = "UNK";

/// Display name of the sentinel set.
pub const SENTINEL_SET_NAME: &str = "Unknown Set";

/// Card rarity as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    /// `common`
    Common,
    /// `uncommon`
    Uncommon,
    /// `rare`
    Rare,
    /// `mythic`
    Mythic,
    /// Everything else upstream publishes (`special`, `bonus`, `timeshifted`, ...).
    Special,
}

impl Rarity {
    /// All rarities in display order.
    pub const ALL: [Self; 5] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::Mythic,
        Self::Special,
    ];

    /// Maps an upstream rarity string. Empty strings map to `None`.
    #[must_use]
    pub fn from_upstream(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(match value.to_ascii_lowercase().as_str() {
            "common" => Self::Common,
            "uncommon" => Self::Uncommon,
            "rare" => Self::Rare,
            "mythic" => Self::Mythic,
            _ => Self::Special,
        })
    }

    /// Stored column value.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Mythic => "mythic",
            Self::Special => "special",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored rarity column holds an unknown value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rarity: {0}")]
pub struct UnknownRarity(pub String);

impl FromStr for Rarity {
    type Err = UnknownRarity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|rarity| rarity.as_str() == s)
            .ok_or_else(|| UnknownRarity(s.to_string()))
    }
}

impl TryFrom<String> for Rarity {
    type Error = UnknownRarity;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A set as parsed from one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetRecord {
    /// Set code (the upstream map key).
    pub code: String,
    /// Display name.
    pub name: String,
    /// `YYYY-MM-DD`, when published.
    pub release_date: Option<String>,
    /// True when the set was only referenced by cards. Placeholders never
    /// overwrite a stored set.
    pub placeholder: bool,
}

impl SetRecord {
    /// Placeholder for a code referenced by cards but not defined in the file.
    #[must_use]
    pub fn placeholder(code: &str) -> Self {
        let name = if code == SENTINEL_SET_CODE {
            SENTINEL_SET_NAME.to_string()
        } else {
            code.to_string()
        };
        Self {
            code: code.to_string(),
            name,
            release_date: None,
            placeholder: true,
        }
    }
}

/// A card printing as parsed from one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardRecord {
    /// Stable upstream identifier.
    pub uuid: String,
    /// Card name; not unique across printings.
    pub name: String,
    /// Mana cost such as `{1}{R}`.
    pub mana_cost: Option<String>,
    /// Full type line such as `Basic Land — Mountain`.
    pub type_line: String,
    /// Mapped rarity.
    pub rarity: Rarity,
    /// Oracle text.
    pub text: Option<String>,
    /// Owning set code.
    pub set_code: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rarity_from_upstream() {
        assert_eq!(Rarity::from_upstream("common"), Some(Rarity::Common));
        assert_eq!(Rarity::from_upstream("Uncommon"), Some(Rarity::Uncommon));
        assert_eq!(Rarity::from_upstream("RARE"), Some(Rarity::Rare));
        assert_eq!(Rarity::from_upstream("mythic"), Some(Rarity::Mythic));
        assert_eq!(Rarity::from_upstream("special"), Some(Rarity::Special));
        assert_eq!(Rarity::from_upstream("bonus"), Some(Rarity::Special));
        assert_eq!(Rarity::from_upstream("timeshifted"), Some(Rarity::Special));
        assert_eq!(Rarity::from_upstream("  "), None);
    }

    #[test]
    fn test_rarity_round_trips_stored_value() {
        for rarity in Rarity::ALL {
            assert_eq!(rarity.as_str().parse::<Rarity>().unwrap(), rarity);
        }
        assert!("legendary".parse::<Rarity>().is_err());
    }

    #[test]
    fn test_placeholder_names() {
        assert_eq!(SetRecord::placeholder("UNK").name, "Unknown Set");
        let m19 = SetRecord::placeholder("M19");
        assert_eq!(m19.name, "M19");
        assert!(m19.placeholder);
    }
}
