//! Unit tests for SourcePosition and StackFrame

use core_types::{SourcePosition, StackFrame};

#[cfg(test)]
mod source_position_tests {
    use super::*;

    #[test]
    fn test_default_position_is_unknown() {
        let pos = SourcePosition::default();
        assert_eq!((pos.line, pos.column, pos.offset), (0, 0, 0));
    }

    #[test]
    fn test_locate_third_line() {
        let source = "a\nbb\nccc";
        let pos = SourcePosition::locate(source, 3, 2);
        assert_eq!(pos.offset, 6);
        assert_eq!(&source[pos.offset..], "cc");
    }

    #[test]
    fn test_locate_column_zero_is_line_start() {
        let pos = SourcePosition::locate("x\ny", 2, 0);
        assert_eq!(pos.offset, 2);
    }

    #[test]
    fn test_line_end_on_last_line() {
        let source = "first\nsecond";
        let pos = SourcePosition::locate(source, 2, 3);
        assert_eq!(pos.line_end(source), source.len());
    }

    #[test]
    fn test_position_is_copy() {
        let pos = SourcePosition::locate("abc", 1, 1);
        let copy = pos;
        assert_eq!(pos, copy);
    }
}

#[cfg(test)]
mod stack_frame_tests {
    use super::*;

    #[test]
    fn test_native_frame_display() {
        let frame = StackFrame {
            function_name: Some("push".to_string()),
            source_url: None,
            line: 0,
            column: 0,
        };
        assert_eq!(frame.to_string(), "push (native)");
    }

    #[test]
    fn test_full_frame_display() {
        let frame = StackFrame {
            function_name: None,
            source_url: Some("boot.js".to_string()),
            line: 4,
            column: 9,
        };
        assert_eq!(frame.to_string(), "<anonymous> (boot.js:4:9)");
    }
}
