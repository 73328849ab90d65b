use serde::{de, Deserialize, Deserializer};

pub fn i32_from_string<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.parse::<i32>().map_err(|error| {
        de::Error::invalid_value(
            de::Unexpected::Str(&format!("unexpected value: {}, error: {}", s, error)),
            &"a number as string: \"20821772\", which fits within i32",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct BlockPointer {
        #[serde(deserialize_with = "i32_from_string")]
        block_number: i32,
    }

    #[test]
    fn deserialize_i32_str_test() {
        let src = r#"{ "block_number": "20821772" }"#;
        let actual = serde_json::from_str::<BlockPointer>(src).unwrap();
        assert_eq!(
            actual,
            BlockPointer {
                block_number: 20821772
            }
        );
    }

    #[test]
    fn deserialize_i32_str_garbage_test() {
        let src = r#"{ "block_number": "twenty" }"#;
        let actual = serde_json::from_str::<BlockPointer>(src);
        assert!(actual.is_err());
    }
}
