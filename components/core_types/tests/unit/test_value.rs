//! Unit tests for the host Value model

use chrono::{TimeZone, Utc};
use core_types::{Custom, Value, ValueType};
use std::collections::HashMap;

#[cfg(test)]
mod value_accessor_tests {
    use super::*;

    #[test]
    fn test_default_is_undefined() {
        assert!(Value::default().is_undefined());
    }

    #[test]
    fn test_as_str() {
        assert_eq!(Value::from("hello").as_str(), Some("hello"));
        assert_eq!(Value::from(1).as_str(), None);
    }

    #[test]
    fn test_as_bool() {
        assert_eq!(Value::from(false).as_bool(), Some(false));
        assert_eq!(Value::Undefined.as_bool(), None);
    }

    #[test]
    fn test_as_double_widens_integers() {
        assert_eq!(Value::from(3).as_double(), Some(3.0));
        assert_eq!(Value::from(2.5).as_double(), Some(2.5));
    }

    #[test]
    fn test_as_list() {
        let list = Value::from(vec![Value::from(1), Value::from(2)]);
        assert_eq!(list.as_list().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn test_map_get() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), Value::from(1));
        let value = Value::from(map);
        assert_eq!(value.get("a"), Some(&Value::Integer(1)));
        assert_eq!(value.get("b"), None);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(Some(5)), Value::Integer(5));
        assert_eq!(Value::from(None::<i32>), Value::Undefined);
    }
}

#[cfg(test)]
mod value_date_tests {
    use super::*;

    #[test]
    fn test_date_from_chrono_truncates_to_seconds() {
        let dt = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        assert_eq!(Value::from(dt), Value::Date(1_700_000_000));
    }

    #[test]
    fn test_date_to_datetime() {
        let value = Value::Date(86_400);
        let dt = value.to_datetime().unwrap();
        assert_eq!(dt.to_rfc3339(), "1970-01-02T00:00:00+00:00");
        assert_eq!(value.value_type(), ValueType::Date);
    }
}

#[cfg(test)]
mod value_json_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let value = Value::from(json!({"a": [1, 2.5, "x", null, true]}));
        let list = value.get("a").and_then(Value::as_list).unwrap();
        assert_eq!(list[0], Value::Integer(1));
        assert_eq!(list[1], Value::Double(2.5));
        assert_eq!(list[2], Value::from("x"));
        assert_eq!(list[3], Value::Undefined);
        assert_eq!(list[4], Value::Boolean(true));
    }

    #[test]
    fn test_to_json_maps_custom_to_null() {
        let value = Value::from(vec![Value::Custom(Custom::new(1, ())), Value::from(2)]);
        assert_eq!(value.to_json(), json!([null, 2]));
    }

    #[test]
    fn test_serialize_matches_to_json() {
        let value = Value::from(json!({"k": {"n": [1, 2]}}));
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"k":{"n":[1,2]}}"#);
    }

    #[test]
    fn test_nan_serializes_as_null() {
        assert_eq!(Value::Double(f64::NAN).to_json(), serde_json::Value::Null);
    }
}

#[cfg(test)]
mod custom_tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_downcast_wrong_type() {
        let custom = Custom::new(2, 10u64);
        assert!(custom.downcast::<String>().is_none());
        assert_eq!(custom.downcast::<u64>().as_deref(), Some(&10));
    }

    #[test]
    fn test_from_rc_shares_payload() {
        let payload = Rc::new(String::from("shared"));
        let a = Custom::from_rc(9, payload.clone());
        let b = Custom::from_rc(9, payload);
        assert!(a.ptr_eq(&b));
        assert_eq!(Value::Custom(a), Value::Custom(b));
    }

    #[test]
    fn test_same_payload_different_tag_is_not_equal() {
        let payload = Rc::new(0u8);
        let a = Custom::from_rc(1, payload.clone());
        let b = Custom::from_rc(2, payload);
        assert_ne!(a, b);
    }
}
