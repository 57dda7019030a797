//! Unit tests for ErrorKind

use core_types::ErrorKind;

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_parse_known_names() {
        assert_eq!("SyntaxError".parse::<ErrorKind>(), Ok(ErrorKind::SyntaxError));
        assert_eq!("RangeError".parse::<ErrorKind>(), Ok(ErrorKind::RangeError));
        assert_eq!("Error".parse::<ErrorKind>(), Ok(ErrorKind::Error));
    }

    #[test]
    fn test_parse_unknown_name() {
        assert!("CustomError".parse::<ErrorKind>().is_err());
        assert!("typeerror".parse::<ErrorKind>().is_err());
    }

    #[test]
    fn test_display_is_constructor_name() {
        assert_eq!(ErrorKind::URIError.to_string(), "URIError");
        assert_eq!(format!("{}", ErrorKind::InternalError), "InternalError");
    }
}
