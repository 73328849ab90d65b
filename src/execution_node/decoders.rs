use serde::{de, Deserialize, Deserializer};

use crate::units::WeiNewtype;

pub fn from_u64_hex_str<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16).map_err(de::Error::custom)
}

pub fn from_u128_hex_str<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    u128::from_str_radix(s.trim_start_matches("0x"), 16).map_err(de::Error::custom)
}

pub fn from_wei_hex_str<'de, D>(deserializer: D) -> Result<WeiNewtype, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    i128::from_str_radix(s.trim_start_matches("0x"), 16)
        .map(WeiNewtype)
        .map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct HexQuantities {
        #[serde(deserialize_with = "from_u64_hex_str")]
        gas_used: u64,
        #[serde(deserialize_with = "from_u128_hex_str")]
        effective_gas_price: u128,
        #[serde(deserialize_with = "from_wei_hex_str")]
        value: WeiNewtype,
    }

    #[test]
    fn decode_hex_quantities_test() {
        let json = r#"{
            "gas_used": "0x286a0",
            "effective_gas_price": "0x173d6b161",
            "value": "0xc61f5781dc2bab"
        }"#;
        let decoded = serde_json::from_str::<HexQuantities>(json).unwrap();
        assert_eq!(decoded.gas_used, 165536);
        assert_eq!(decoded.effective_gas_price, 6238417249);
        assert_eq!(decoded.value, WeiNewtype(55766506090015659));
    }

    #[test]
    fn decode_bad_hex_fails_test() {
        let json = r#"{
            "gas_used": "0xnope",
            "effective_gas_price": "0x0",
            "value": "0x0"
        }"#;
        assert!(serde_json::from_str::<HexQuantities>(json).is_err());
    }
}
