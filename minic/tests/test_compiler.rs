
use simulator::{assert_error_kind, assert_runs_ok};
use support::ErrorKind;

#[test]
fn returns_a_constant() {
  assert_runs_ok("int main() { return 42; }", 42);
}

#[test]
fn statement_without_return_yields_zero() {
  assert_runs_ok("int main() { 0; }", 0);
}

#[test]
fn empty_statements_are_legal() {
  assert_runs_ok("int main() { ;;;;; return 0; }", 0);
}

#[test]
fn empty_body_yields_zero() {
  assert_runs_ok("int main() { }", 0);
}

#[test]
fn return_discards_the_rest() {
  assert_runs_ok("int main() { return 1; return 2; }", 1);
}

#[test]
fn whitespace_is_insignificant() {
  assert_runs_ok("int\nmain\t( )\r\n{ return\t7\n; }", 7);
}

#[test]
fn missing_semicolon() {
  assert_error_kind("int main() { return 0 }", ErrorKind::Syntax);
}

#[test]
fn missing_closing_brace() {
  assert_error_kind("int main() { return 0;", ErrorKind::Syntax);
}

#[test]
fn missing_opening_brace() {
  assert_error_kind("int main() return 0; }", ErrorKind::Syntax);
}

#[test]
fn missing_function_name() {
  assert_error_kind("int () { return 0; }", ErrorKind::Syntax);
}

#[test]
fn stray_else() {
  assert_error_kind("int main() { else return 3; }", ErrorKind::Syntax);
}

#[test]
fn unknown_byte() {
  assert_error_kind("int main() { #; return 0; }", ErrorKind::Syntax);
}

#[test]
fn keyword_glued_to_literal_is_an_unknown_name() {
  // `return0` lexes as one identifier, which is then undeclared.
  assert_error_kind("int main() { return0; }", ErrorKind::Semantic);
}

#[test]
fn oversized_literal() {
  assert_error_kind("int main() { return 4294967296; }", ErrorKind::Syntax);
}

#[test]
fn trailing_garbage_after_the_function() {
  assert_error_kind("int main() { return 0; } int", ErrorKind::Syntax);
}

#[test]
fn determinism_is_byte_for_byte() {
  let source = r#"
    int main() {
      int total = 0;
      for (int i = 1; i <= 4; i++) {
        if (i % 2) { total += i; } else { total -= i; }
      }
      return total || 0 && 1 ? total : 9 - total;
    }
  "#;
  let first = minic::compile(source).unwrap();
  let second = minic::compile(source).unwrap();
  assert_eq!(first, second);
}
