//! Contract compliance tests for core_types
//!
//! These tests pin the public surface the script bridge depends on.

use core_types::{Custom, ErrorKind, SourcePosition, StackFrame, Value, ValueType};
use std::collections::HashMap;

#[cfg(test)]
mod value_contract_tests {
    use super::*;

    /// Contract: Value has exactly the host variants
    #[test]
    fn test_value_variants() {
        let all = [
            Value::Undefined,
            Value::Boolean(true),
            Value::Integer(1),
            Value::Double(1.5),
            Value::String(String::new()),
            Value::Date(0),
            Value::List(Vec::new()),
            Value::Map(HashMap::new()),
            Value::Custom(Custom::new(0, ())),
        ];
        let types: Vec<ValueType> = all.iter().map(Value::value_type).collect();
        assert_eq!(
            types,
            vec![
                ValueType::Undefined,
                ValueType::Boolean,
                ValueType::Integer,
                ValueType::Double,
                ValueType::String,
                ValueType::Date,
                ValueType::List,
                ValueType::Map,
                ValueType::Custom,
            ]
        );
    }

    /// Contract: Value is cloneable and comparable
    #[test]
    fn test_value_clone_eq() {
        let value = Value::from(vec![Value::from("a")]);
        assert_eq!(value.clone(), value);
    }

    /// Contract: Custom carries a tag and a downcastable payload
    #[test]
    fn test_custom_tag_and_payload() {
        let custom = Custom::new(42, vec![1u8, 2]);
        assert_eq!(custom.tag(), 42);
        assert_eq!(custom.downcast::<Vec<u8>>().map(|v| v.len()), Some(2));
    }
}

#[cfg(test)]
mod location_contract_tests {
    use super::*;

    /// Contract: SourcePosition exposes line, column and offset
    #[test]
    fn test_source_position_fields() {
        let pos = SourcePosition {
            line: 1,
            column: 2,
            offset: 3,
        };
        assert_eq!((pos.line, pos.column, pos.offset), (1, 2, 3));
    }

    /// Contract: StackFrame exposes function, source, line and column
    #[test]
    fn test_stack_frame_fields() {
        let frame = StackFrame {
            function_name: Some("f".to_string()),
            source_url: Some("s".to_string()),
            line: 1,
            column: 1,
        };
        assert_eq!(frame.function_name.as_deref(), Some("f"));
        assert_eq!(frame.source_url.as_deref(), Some("s"));
    }

    /// Contract: ErrorKind covers the built-in constructors
    #[test]
    fn test_error_kind_names() {
        assert_eq!(ErrorKind::SyntaxError.name(), "SyntaxError");
        assert_eq!(ErrorKind::TypeError.name(), "TypeError");
    }
}
