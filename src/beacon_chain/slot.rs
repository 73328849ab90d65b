use std::fmt::Display;
use std::ops::{Add, Sub};
use std::str::FromStr;

use anyhow::bail;
use serde::{de, Deserialize, Deserializer, Serialize};

// Beacon chain slots are defined as 12 second periods starting from genesis. With i32 our program
// would overflow when the slot number passes 2_147_483_647. i32::MAX * 12 seconds = ~817 years.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialOrd, PartialEq, Serialize)]
pub struct Slot(pub i32);

impl Slot {
    pub const GENESIS: Self = Self(0);
}

impl Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<i32> for Slot {
    type Output = Self;

    fn add(self, rhs: i32) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<i32> for Slot {
    type Output = Self;

    fn sub(self, rhs: i32) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl From<i32> for Slot {
    fn from(slot: i32) -> Self {
        Self(slot)
    }
}

impl FromStr for Slot {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slot: i32 = s.parse()?;
        if slot < 0 {
            bail!("slot is a non-negative integer, got {slot}");
        }
        Ok(Self(slot))
    }
}

pub fn slot_from_string<'de, D>(deserializer: D) -> Result<Slot, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse::<i32>().map(Slot).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_string_parse_test() {
        assert_eq!(Slot::from_str("10031063").unwrap(), Slot(10031063));
        assert_eq!(Slot::from_str("0").unwrap(), Slot::GENESIS);
    }

    #[test]
    fn slot_string_parse_invalid_test() {
        assert!(Slot::from_str("invalid").is_err());
        assert!(Slot::from_str("-1").is_err());
        assert!(Slot::from_str("4294967296").is_err());
    }

    #[test]
    fn slot_ordering_test() {
        assert!(Slot(10031063) > Slot(10031062));
        assert!(Slot::GENESIS < Slot(1));
    }

    #[test]
    fn arithmetic_operations_test() {
        assert_eq!(Slot(3) + 5, Slot(8));
        assert_eq!(Slot(3) - 2, Slot(1));
    }

    #[test]
    fn slot_display_test() {
        assert_eq!(Slot(2_375_680).to_string(), "2375680");
    }
}
