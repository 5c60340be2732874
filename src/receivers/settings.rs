//! decoding of the loosely typed receiver settings
use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ConfigError;

/// Decode the plain settings of a receiver. Missing settings (`null`) are an
/// error, every receiver needs at least one field.
pub fn decode<T: DeserializeOwned>(settings: &Value) -> Result<T, ConfigError> {
	serde_json::from_value(settings.clone()).map_err(ConfigError::Unmarshal)
}

/// `value` unless it's empty
pub fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|value| !value.is_empty())
}

/// `value`, or `default` if it's missing or empty
pub fn or_default(value: Option<String>, default: &str) -> String {
	non_empty(value).unwrap_or_else(|| default.to_owned())
}

/// Secure setting `key`, falling back to the plain setting `plain`. Empty
/// values count as missing.
pub fn secret(
	secure: &HashMap<String, String>,
	key: &str,
	plain: Option<String>,
) -> Option<String> {
	non_empty(secure.get(key).cloned()).or_else(|| non_empty(plain))
}

/// Coerce a setting that may be a number or a numeric string into an
/// integer. Missing, `null` and empty values are `None`, everything else that
/// isn't an integer fails with [ConfigError::NotNumeric].
pub fn integer(value: Option<&Value>, field: &'static str) -> Result<Option<i64>, ConfigError> {
	match value {
		None | Some(Value::Null) => Ok(None),
		Some(Value::Number(number)) => {
			number.as_i64().map(Some).ok_or(ConfigError::NotNumeric { field })
		}
		Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
		Some(Value::String(text)) => {
			text.trim().parse().map(Some).map_err(|_| ConfigError::NotNumeric { field })
		}
		Some(_) => Err(ConfigError::NotNumeric { field }),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn integers_from_numbers_and_strings() {
		assert_eq!(integer(Some(&json!(2)), "maxAlerts").unwrap(), Some(2));
		assert_eq!(integer(Some(&json!("2")), "maxAlerts").unwrap(), Some(2));
		assert_eq!(integer(Some(&json!(" 7 ")), "maxAlerts").unwrap(), Some(7));
		assert_eq!(integer(Some(&json!("")), "maxAlerts").unwrap(), None);
		assert_eq!(integer(Some(&Value::Null), "maxAlerts").unwrap(), None);
		assert_eq!(integer(None, "maxAlerts").unwrap(), None);
	}

	#[test]
	fn non_integers_are_rejected() {
		for value in [json!(123.23), json!("test"), json!(true), json!([1])] {
			let err = integer(Some(&value), "alerting priority").unwrap_err();
			assert_eq!(err.to_string(), "failed to convert alerting priority to integer");
		}
	}

	#[test]
	fn secure_settings_win() {
		let secure = HashMap::from([("password".to_owned(), "secret".to_owned())]);

		assert_eq!(secret(&secure, "password", Some("plain".into())).as_deref(), Some("secret"));
		assert_eq!(secret(&secure, "token", Some("plain".into())).as_deref(), Some("plain"));
		assert_eq!(secret(&secure, "token", Some(String::new())), None);

		let empty = HashMap::from([("password".to_owned(), String::new())]);
		assert_eq!(secret(&empty, "password", Some("plain".into())).as_deref(), Some("plain"));
	}

	#[test]
	fn missing_settings_fail_to_decode() {
		#[derive(serde::Deserialize)]
		struct Raw {
			#[allow(dead_code)]
			url: Option<String>,
		}

		let err = decode::<Raw>(&Value::Null).err().unwrap();
		assert_eq!(err.to_string(), "failed to unmarshal settings");
		assert!(decode::<Raw>(&json!({})).is_ok());
	}
}
