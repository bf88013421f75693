use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;

use crate::do_if;

pub fn deserialize_bool_to_i32<'de, D>(de: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value: bool = Deserialize::deserialize(de)?;
    Ok(do_if!(value => 1, 0))
}
pub fn serialize_i32_to_bool<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize + Display,
    S: Serializer,
{
    let flag: i32 = value.to_string().parse().unwrap_or(0);
    serializer.serialize_bool(flag != 0)
}

pub fn serialize_null_to_default<S>(
    value: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(value) => serializer.serialize_str(value),
        _ => serializer.serialize_str(""),
    }
}

pub fn deser_empty_to_none<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(de)?;
    Ok(value.and_then(|v| op::ternary!(v.is_empty() => None; Some(v))))
}

/// 日期固定 YYYY-MM-DD
pub fn deserialize_date<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: String = Deserialize::deserialize(de)?;
    if parse_date(&value).is_none() {
        return Err(serde::de::Error::custom(format!(
            "日期格式错误，应为YYYY-MM-DD: {value}"
        )));
    }
    Ok(value)
}

pub fn deserialize_opt_date<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(de)?;
    match value {
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => {
            if parse_date(&v).is_none() {
                return Err(serde::de::Error::custom(format!(
                    "日期格式错误，应为YYYY-MM-DD: {v}"
                )));
            }
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

pub fn parse_date(value: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::parse_date;

    #[test]
    fn date_format_is_strict() {
        assert!(parse_date("2024-01-15").is_some());
        assert!(parse_date("2024-02-30").is_none());
        assert!(parse_date("15-01-2024").is_none());
        assert!(parse_date("2024/01/15").is_none());
    }
}
