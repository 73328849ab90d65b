use std::{
    fmt::Display,
    num::ParseIntError,
    ops::{Add, Sub},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// An amount of wei, the smallest native unit. Relays and nodes report wei as
/// base-10 decimal strings; i128 holds any sum of them this service can see.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(into = "String")]
#[serde(try_from = "String")]
pub struct WeiNewtype(pub i128);

impl Add<WeiNewtype> for WeiNewtype {
    type Output = Self;

    fn add(self, WeiNewtype(rhs): Self) -> Self::Output {
        let WeiNewtype(lhs) = self;
        let result = lhs
            .checked_add(rhs)
            .expect("caused overflow in wei addition");
        WeiNewtype(result)
    }
}

impl Sub<WeiNewtype> for WeiNewtype {
    type Output = Self;

    fn sub(self, WeiNewtype(rhs): WeiNewtype) -> Self::Output {
        let WeiNewtype(lhs) = self;
        let result = lhs
            .checked_sub(rhs)
            .expect("caused underflow in wei subtraction");
        WeiNewtype(result)
    }
}

impl Display for WeiNewtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let WeiNewtype(amount) = self;
        write!(f, "{amount}")
    }
}

impl From<WeiNewtype> for String {
    fn from(WeiNewtype(amount): WeiNewtype) -> Self {
        amount.to_string()
    }
}

impl FromStr for WeiNewtype {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i128>().map(WeiNewtype)
    }
}

impl TryFrom<String> for WeiNewtype {
    type Error = ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse::<i128>().map(WeiNewtype)
    }
}

impl From<i128> for WeiNewtype {
    fn from(amount: i128) -> Self {
        WeiNewtype(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_wei_test() {
        let lhs = WeiNewtype(55_766_506_090_015_659);
        let rhs = WeiNewtype(75_784_783_531_378_114);
        assert_eq!(lhs + rhs, WeiNewtype(131_551_289_621_393_773));
    }

    #[test]
    fn sub_wei_test() {
        let lhs = WeiNewtype(10);
        let rhs = WeiNewtype(4);
        assert_eq!(lhs - rhs, WeiNewtype(6));
    }

    #[test]
    fn decode_decimal_string_test() {
        let wei = serde_json::from_str::<WeiNewtype>("\"55766506090015659\"").unwrap();
        assert_eq!(wei, WeiNewtype(55_766_506_090_015_659));
    }

    #[test]
    fn encode_decimal_string_test() {
        let text = serde_json::to_string(&WeiNewtype(75_784_783_531_378_114)).unwrap();
        assert_eq!(text, "\"75784783531378114\"");
    }

    #[test]
    fn decode_garbage_fails_test() {
        let result = serde_json::from_str::<WeiNewtype>("\"not-a-number\"");
        assert!(result.is_err());
    }
}
