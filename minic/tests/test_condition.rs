
use simulator::{assert_error_kind, assert_runs_ok};
use support::ErrorKind;

#[test]
fn if_without_else() {
  assert_runs_ok("int main() { if (1) return 1; return 2; }", 1);
  assert_runs_ok("int main() { if (0) return 1; return 2; }", 2);
}

#[test]
fn if_with_else() {
  assert_runs_ok("int main() { if (5) return 1; else return 2; }", 1);
  assert_runs_ok("int main() { if (0) return 1; else return 2; }", 2);
}

#[test]
fn else_if_chain() {
  let source = |n: i32| {
    format!(
      "int main() {{ int a = {}; if (a == 1) return 10; else if (a == 2) return 20; else return 30; }}",
      n
    )
  };
  assert_runs_ok(&source(1), 10);
  assert_runs_ok(&source(2), 20);
  assert_runs_ok(&source(9), 30);
}

#[test]
fn dangling_else_runs_with_the_inner_if() {
  // `else` pairs with `if (0)`, so nothing fires for a = 1.
  assert_runs_ok(
    "int main() { int a = 1; if (a) if (0) return 1; else return 2; return 3; }",
    2,
  );
  assert_runs_ok(
    "int main() { int a = 0; if (a) if (0) return 1; else return 2; return 3; }",
    3,
  );
}

#[test]
fn if_bodies_may_be_blocks() {
  assert_runs_ok(
    "int main() { int n = 0; if (1) { n += 1; n += 2; } else { n = 9; } return n; }",
    3,
  );
}

#[test]
fn ternary_selects_a_branch() {
  assert_runs_ok("int main() { int a = 1; int b = 2; return a > b ? a : b; }", 2);
  assert_runs_ok("int main() { int a = 7; int b = 2; return a > b ? a : b; }", 7);
}

#[test]
fn ternary_is_an_expression() {
  assert_runs_ok("int main() { int a = 0 ? 10 : 20; return a + 1; }", 21);
}

#[test]
fn nested_ternaries_associate_to_the_right() {
  let source = |n: i32| {
    format!(
      "int main() {{ int a = {}; return a == 1 ? 10 : a == 2 ? 20 : 30; }}",
      n
    )
  };
  assert_runs_ok(&source(1), 10);
  assert_runs_ok(&source(2), 20);
  assert_runs_ok(&source(5), 30);
}

#[test]
fn ternary_condition_binds_looser_than_or() {
  assert_runs_ok("int main() { return 0 || 1 ? 3 : 4; }", 3);
}

#[test]
fn ternary_branches_evaluate_lazily() {
  assert_runs_ok(
    "int main() { int a = 0; 1 ? 0 : (a = 5); return a; }",
    0,
  );
  assert_runs_ok(
    "int main() { int a = 0; 0 ? (a = 5) : 0; return a; }",
    0,
  );
}

#[test]
fn condition_values_are_just_nonzero_tests() {
  assert_runs_ok("int main() { if (-3) return 1; return 2; }", 1);
  assert_runs_ok("int main() { return -3 ? 1 : 2; }", 1);
}

#[test]
fn empty_if_condition_is_a_syntax_error() {
  assert_error_kind("int main() { if () return 1; return 0; }", ErrorKind::Syntax);
}

#[test]
fn if_without_a_body_is_a_syntax_error() {
  assert_error_kind("int main() { if (1) }", ErrorKind::Syntax);
}

#[test]
fn ternary_missing_colon_is_a_syntax_error() {
  assert_error_kind("int main() { return 1 ? 2; }", ErrorKind::Syntax);
}
