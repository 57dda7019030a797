//! Source position and stack frame types for script error reporting.
//!
//! Line and column numbers are 1-based, matching what script engines print in
//! their backtraces. Offsets are byte offsets into the evaluated source.

use std::fmt;

/// Represents a position in source code.
///
/// # Examples
///
/// ```
/// use core_types::SourcePosition;
///
/// let source = "let a = 1;\nthrow new Error('x');";
/// let pos = SourcePosition::locate(source, 2, 7);
///
/// assert_eq!(pos.line, 2);
/// assert_eq!(pos.offset, 17);
/// assert_eq!(&source[pos.offset..pos.offset + 3], "new");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    /// Line number, 1-based (0 when unknown)
    pub line: u32,
    /// Column number, 1-based (0 when unknown)
    pub column: u32,
    /// Byte offset from the start of the source
    pub offset: usize,
}

impl SourcePosition {
    /// Builds a position from a 1-based line and column, resolving the byte
    /// offset against `source`.
    ///
    /// Positions past the end of a line or of the source clamp to the
    /// nearest valid offset.
    pub fn locate(source: &str, line: u32, column: u32) -> Self {
        let offset = line_start(source, line)
            .map(|start| {
                let line_len = source[start..].find('\n').unwrap_or(source.len() - start);
                start + (column.saturating_sub(1) as usize).min(line_len)
            })
            .unwrap_or(0);

        Self {
            line,
            column,
            offset,
        }
    }

    /// Byte offset of the end of this position's line in `source`.
    pub fn line_end(&self, source: &str) -> usize {
        match source[self.offset.min(source.len())..].find('\n') {
            Some(rel) => self.offset + rel,
            None => source.len(),
        }
    }
}

fn line_start(source: &str, line: u32) -> Option<usize> {
    if line == 0 {
        return None;
    }
    if line == 1 {
        return Some(0);
    }
    source
        .match_indices('\n')
        .nth(line as usize - 2)
        .map(|(idx, _)| idx + 1)
}

/// Represents a single frame in a script call stack.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame {
///     function_name: Some("myFunction".to_string()),
///     source_url: Some("main.js".to_string()),
///     line: 25,
///     column: 10,
/// };
///
/// assert_eq!(frame.to_string(), "myFunction (main.js:25:10)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Name of the function, or None for anonymous code
    pub function_name: Option<String>,
    /// Origin label of the source, or None for native frames
    pub source_url: Option<String>,
    /// Line number where the call occurred (0 when unknown)
    pub line: u32,
    /// Column number where the call occurred (0 when unknown)
    pub column: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.function_name.as_deref().unwrap_or("<anonymous>");
        let url = self.source_url.as_deref().unwrap_or("native");
        match (self.line, self.column) {
            (0, _) => write!(f, "{} ({})", name, url),
            (line, 0) => write!(f, "{} ({}:{})", name, url, line),
            (line, column) => write!(f, "{} ({}:{}:{})", name, url, line, column),
        }
    }
}
