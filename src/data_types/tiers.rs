
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString};

use crate::errors::CohortError;

/// Clinical tier labels attached to each annotated variant
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum_macros::Display, EnumIter, EnumString)]
pub enum Tier {
    /// Variants of strong clinical significance
    #[strum(to_string = "TIER 1", serialize = "TIER1")]
    Tier1,
    /// Variants of potential clinical significance
    #[strum(to_string = "TIER 2", serialize = "TIER2")]
    Tier2,
    /// Variants of uncertain clinical significance
    #[strum(to_string = "TIER 3", serialize = "TIER3")]
    Tier3,
    /// Other coding mutations
    #[strum(to_string = "TIER 4", serialize = "TIER4")]
    Tier4,
    /// Noncoding mutations
    #[strum(to_string = "NONCODING")]
    Noncoding,
}

impl Tier {
    /// Human-readable label used for pivot column headers, e.g. "Tier 1"
    pub fn column_label(&self) -> &'static str {
        match self {
            Tier::Tier1 => "Tier 1",
            Tier::Tier2 => "Tier 2",
            Tier::Tier3 => "Tier 3",
            Tier::Tier4 => "Tier 4",
            Tier::Noncoding => "Noncoding",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Tier::Tier1 => "Variants of strong clinical significance",
            Tier::Tier2 => "Variants of potential clinical significance",
            Tier::Tier3 => "Variants of uncertain clinical significance",
            Tier::Tier4 => "Other coding mutation",
            Tier::Noncoding => "Noncoding mutation",
        }
    }

    /// Parses a tier label from a table cell, returns None for anything outside the taxonomy
    pub fn from_label(label: &str) -> Option<Tier> {
        Tier::from_str(label.trim()).ok()
    }
}

/// The named filter levels; each admits a fixed set of tiers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum_macros::Display, EnumString)]
pub enum TierLevel {
    #[strum(serialize = "all")]
    All,
    #[strum(serialize = "4")]
    UpToTier4,
    #[strum(serialize = "3")]
    UpToTier3,
    #[strum(serialize = "2")]
    UpToTier2,
    #[strum(serialize = "1")]
    UpToTier1,
}

impl TierLevel {
    /// Parses the user-facing selector, matched exactly.
    /// # Errors
    /// * if the value is not one of `all`, `1`, `2`, `3`, `4`
    pub fn parse(level: &str) -> Result<TierLevel, CohortError> {
        TierLevel::from_str(level)
            .map_err(|_| CohortError::InvalidTierLevel { level: level.to_string() })
    }

    /// Returns the tiers admitted by this level, in tier order
    pub fn admitted_tiers(&self) -> Vec<Tier> {
        Tier::iter()
            .filter(|t| self.admits(*t))
            .collect()
    }

    /// Returns true if the tier passes this filter level
    pub fn admits(&self, tier: Tier) -> bool {
        match self {
            TierLevel::All => true,
            TierLevel::UpToTier4 => tier <= Tier::Tier4,
            TierLevel::UpToTier3 => tier <= Tier::Tier3,
            TierLevel::UpToTier2 => tier <= Tier::Tier2,
            TierLevel::UpToTier1 => tier == Tier::Tier1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_labels() {
        assert_eq!(Tier::from_label("TIER 1"), Some(Tier::Tier1));
        assert_eq!(Tier::from_label("TIER4"), Some(Tier::Tier4));
        assert_eq!(Tier::from_label("NONCODING"), Some(Tier::Noncoding));
        assert_eq!(Tier::from_label("TIER 5"), None);
        assert_eq!(Tier::from_label(""), None);
        assert_eq!(Tier::Tier2.to_string(), "TIER 2");
        assert_eq!(Tier::Noncoding.column_label(), "Noncoding");
    }

    #[test]
    fn test_tier_level_parse() {
        assert_eq!(TierLevel::parse("all").unwrap(), TierLevel::All);
        assert_eq!(TierLevel::parse("3").unwrap(), TierLevel::UpToTier3);
        assert!(matches!(
            TierLevel::parse("5"),
            Err(CohortError::InvalidTierLevel { level }) if level == "5"
        ));
        assert!(TierLevel::parse("tier1").is_err());
        assert!(TierLevel::parse("ALL").is_err());
        assert!(TierLevel::parse(" 1 ").is_err());
    }

    #[test]
    fn test_admitted_tiers() {
        assert_eq!(TierLevel::UpToTier1.admitted_tiers(), vec![Tier::Tier1]);
        assert_eq!(TierLevel::UpToTier2.admitted_tiers(), vec![Tier::Tier1, Tier::Tier2]);
        assert_eq!(TierLevel::UpToTier4.admitted_tiers().len(), 4);
        assert!(!TierLevel::UpToTier4.admits(Tier::Noncoding));
        assert_eq!(TierLevel::All.admitted_tiers().len(), 5);
    }

    #[test]
    fn test_levels_are_nested() {
        let levels = [TierLevel::All, TierLevel::UpToTier4, TierLevel::UpToTier3, TierLevel::UpToTier2, TierLevel::UpToTier1];
        for pair in levels.windows(2) {
            let wider = pair[0].admitted_tiers();
            for tier in pair[1].admitted_tiers() {
                assert!(wider.contains(&tier));
            }
        }
    }
}
