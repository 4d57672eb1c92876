use crate::Range;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Which stage of the pipeline rejected the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The bytes or the token stream do not match the grammar.
  Syntax,
  /// Well-formed syntax violating a scoping, lvalue, or loop rule.
  Semantic,
  /// A pipeline invariant failed; a bug, not a user error.
  Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
  pub kind: ErrorKind,
  pub range: Range,
  pub message: String,
}

impl CompileError {
  pub fn syntax<R: Into<Range>>(range: R, message: impl Into<String>) -> Self {
    Self {
      kind: ErrorKind::Syntax,
      range: range.into(),
      message: message.into(),
    }
  }

  pub fn semantic<R: Into<Range>>(range: R, message: impl Into<String>) -> Self {
    Self {
      kind: ErrorKind::Semantic,
      range: range.into(),
      message: message.into(),
    }
  }

  pub fn internal<R: Into<Range>>(range: R, message: impl Into<String>) -> Self {
    Self {
      kind: ErrorKind::Internal,
      range: range.into(),
      message: message.into(),
    }
  }
}

impl Display for CompileError {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    let kind = match self.kind {
      ErrorKind::Syntax => "syntax error",
      ErrorKind::Semantic => "semantic error",
      ErrorKind::Internal => "internal error",
    };
    write!(f, "{}: {}", kind, self.message)
  }
}

impl Error for CompileError {}

/// Renders a `CompileError` with a file:line:column prefix computed
/// from the source the error's range points into.
pub struct CompileErrorPrinter {
  path: PathBuf,
  line_offsets: Vec<usize>,
}

impl CompileErrorPrinter {
  pub fn new<P: AsRef<Path>, S: ToString>(file: P, input: S) -> Self {
    let input = input.to_string();
    let line_offsets = Self::compute_line_offsets(&input);
    Self {
      path: file.as_ref().to_owned(),
      line_offsets,
    }
  }

  fn get_location(&self, position: usize) -> (usize, usize) {
    let mut low = 0;
    let mut high = self.line_offsets.len();
    while low < high {
      let mid = (low + high) / 2;
      if self.line_offsets[mid] > position {
        high = mid;
      } else {
        low = mid + 1;
      }
    }
    let line = low - 1;
    let column = position - self.line_offsets[line];
    (line, column)
  }

  pub fn print(&self, err: &CompileError) {
    let start = self.get_location(err.range.start);
    let end = self.get_location(if err.range.is_empty() {
      err.range.end
    } else {
      err.range.end - 1
    });
    eprintln!(
      "error at {}:{}:{}{}: {}",
      self.path.display(),
      start.0 + 1,
      start.1 + 1,
      if end.0 == start.0 {
        format!(" - {}", end.1 + 2)
      } else {
        format!(" - {}:{}", end.0 + 1, end.1 + 2)
      },
      err
    );
  }

  fn compute_line_offsets(input: &str) -> Vec<usize> {
    let mut offset = 0;
    let mut offsets = vec![];
    for line in input.split('\n') {
      offsets.push(offset);
      offset += line.len() + 1;
    }
    offsets
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  // A program the resolver would reject: `b` is never declared. The
  // printer only needs the text, so the error ranges are spelled out
  // by hand below.
  const SOURCE: &str = "int main() {\n  int a = 1;\n  return b;\n}\n";

  #[test]
  fn line_offsets() {
    let printer = CompileErrorPrinter::new("scope.c", SOURCE);
    assert_eq!(printer.line_offsets, vec![0, 13, 26, 38, 40]);
  }

  #[test]
  fn offsets_map_to_lines_and_columns() {
    let printer = CompileErrorPrinter::new("scope.c", SOURCE);
    // The `int` keyword opening the function.
    assert_eq!(printer.get_location(0), (0, 0));
    // The declaration of `a` on the second line.
    assert_eq!(printer.get_location(SOURCE.find("a =").unwrap()), (1, 6));
    // The undeclared `b` in the return statement.
    assert_eq!(printer.get_location(SOURCE.find('b').unwrap()), (2, 9));
    // The closing brace of the function body.
    assert_eq!(printer.get_location(38), (3, 0));
  }

  #[test]
  fn an_empty_range_maps_to_its_own_offset() {
    // Unexpected-end-of-input errors carry an empty range at the
    // very end of the source.
    let printer = CompileErrorPrinter::new("scope.c", "int main() {");
    let err = CompileError::syntax((12, 12), "expected `}` but got `end of input`");
    assert_eq!(printer.get_location(err.range.start), (0, 12));
    assert_eq!(printer.get_location(err.range.end), (0, 12));
  }

  #[test]
  fn display() {
    let err = CompileError::syntax((0, 1), "expected `;` but got `}`");
    assert_eq!(err.to_string(), "syntax error: expected `;` but got `}`");
    let err = CompileError::semantic((4, 5), "undeclared variable `a`");
    assert_eq!(err.to_string(), "semantic error: undeclared variable `a`");
  }
}
