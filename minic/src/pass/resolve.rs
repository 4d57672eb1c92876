use ast::{
  Block, BlockItem, Declaration, Exp, ExpKind, ForInit, LValue, LValueKind,
  Program, Stmt, StmtKind,
};
use std::collections::HashMap;
use support::CompileError;

/// Rewrite every declared name to a scope-unique `fn::name::layer`
/// form, reject scope violations, and attach loop labels to loops and
/// to the `break`/`continue` statements that target them.
pub fn resolve(prog: &mut Program) -> Result<(), CompileError> {
  let mut resolver = Resolver {
    fun: prog.main.name.clone(),
    layer: 0,
    env: HashMap::new(),
    loops: vec![],
    loop_counter: 0,
  };
  resolver.resolve_block(&mut prog.main.body)
}

struct Binding {
  layer: u32,
  unique: String,
}

struct LoopInfo {
  label: String,
  is_for: bool,
}

struct Resolver {
  fun: String,
  layer: u32,
  /// Original name -> stack of live bindings, innermost last.
  env: HashMap<String, Vec<Binding>>,
  /// Enclosing loops, innermost last.
  loops: Vec<LoopInfo>,
  loop_counter: u32,
}

impl Resolver {
  fn resolve_block(&mut self, block: &mut Block) -> Result<(), CompileError> {
    self.layer += 1;
    for item in &mut block.items {
      match item {
        BlockItem::Decl(decl) => self.resolve_declaration(decl)?,
        BlockItem::Stmt(stmt) => self.resolve_stmt(stmt)?,
      }
    }
    self.pop_layer();
    self.layer -= 1;
    Ok(())
  }

  fn resolve_declaration(
    &mut self,
    decl: &mut Declaration,
  ) -> Result<(), CompileError> {
    let stack = self.env.entry(decl.name.clone()).or_default();
    if matches!(stack.last(), Some(binding) if binding.layer == self.layer) {
      return Err(CompileError::semantic(
        decl.range,
        format!("duplicate declaration of `{}`", decl.name),
      ));
    }
    let unique = format!("{}::{}::{}", self.fun, decl.name, self.layer);
    stack.push(Binding {
      layer: self.layer,
      unique: unique.clone(),
    });
    decl.name = unique;
    // The binding is live in its own initializer.
    if let Some(init) = &mut decl.init {
      self.resolve_exp(init)?;
    }
    Ok(())
  }

  fn resolve_stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
    match &mut stmt.kind {
      StmtKind::Return(exp) => {
        if let Some(exp) = exp {
          self.resolve_exp(exp)?;
        }
        Ok(())
      }
      StmtKind::Expression(exp) => self.resolve_exp(exp),
      StmtKind::If { cond, then, els } => {
        self.resolve_exp(cond)?;
        self.resolve_stmt(then)?;
        if let Some(els) = els {
          self.resolve_stmt(els)?;
        }
        Ok(())
      }
      StmtKind::Compound(block) => self.resolve_block(block),
      StmtKind::While {
        cond, body, label, ..
      } => {
        *label = self.fresh_loop_label();
        self.resolve_exp(cond)?;
        self.loops.push(LoopInfo {
          label: label.clone(),
          is_for: false,
        });
        self.resolve_stmt(body)?;
        self.loops.pop();
        Ok(())
      }
      StmtKind::For {
        init,
        cond,
        step,
        body,
        label,
      } => {
        *label = self.fresh_loop_label();
        // The init opens a scope spanning the whole `for`.
        self.layer += 1;
        match init {
          ForInit::Decl(decl) => self.resolve_declaration(decl)?,
          ForInit::Exp(exp) => self.resolve_exp(exp)?,
          ForInit::None => {}
        }
        if let Some(cond) = cond {
          self.resolve_exp(cond)?;
        }
        if let Some(step) = step {
          self.resolve_exp(step)?;
        }
        self.loops.push(LoopInfo {
          label: label.clone(),
          is_for: true,
        });
        self.resolve_stmt(body)?;
        self.loops.pop();
        self.pop_layer();
        self.layer -= 1;
        Ok(())
      }
      StmtKind::Break { label } => match self.loops.last() {
        Some(enclosing) => {
          *label = enclosing.label.clone();
          Ok(())
        }
        None => Err(CompileError::semantic(
          stmt.range,
          "`break` outside of a loop",
        )),
      },
      StmtKind::Continue { label, is_for } => match self.loops.last() {
        Some(enclosing) => {
          *label = enclosing.label.clone();
          *is_for = enclosing.is_for;
          Ok(())
        }
        None => Err(CompileError::semantic(
          stmt.range,
          "`continue` outside of a loop",
        )),
      },
      StmtKind::Null => Ok(()),
    }
  }

  fn resolve_exp(&mut self, exp: &mut Exp) -> Result<(), CompileError> {
    let range = exp.range;
    match &mut exp.kind {
      ExpKind::Const(_) => Ok(()),
      ExpKind::Var(name) => {
        match self.env.get(name.as_str()).and_then(|stack| stack.last()) {
          Some(binding) => {
            *name = binding.unique.clone();
            Ok(())
          }
          None => Err(CompileError::semantic(
            range,
            format!("undeclared variable `{}`", name),
          )),
        }
      }
      ExpKind::Unary(_, operand) => self.resolve_exp(operand),
      ExpKind::Binary(_, left, right) => {
        self.resolve_exp(left)?;
        self.resolve_exp(right)
      }
      ExpKind::Assignment { target, value } => {
        self.resolve_lvalue(target)?;
        self.resolve_exp(value)
      }
      ExpKind::Conditional { cond, then, els } => {
        self.resolve_exp(cond)?;
        self.resolve_exp(then)?;
        self.resolve_exp(els)
      }
      ExpKind::Prefix(_, target) | ExpKind::Postfix(_, target) => {
        self.resolve_lvalue(target)
      }
    }
  }

  fn resolve_lvalue(&mut self, lvalue: &mut LValue) -> Result<(), CompileError> {
    let range = lvalue.range;
    match &mut lvalue.kind {
      LValueKind::Var(name) => {
        match self.env.get(name.as_str()).and_then(|stack| stack.last()) {
          Some(binding) => {
            *name = binding.unique.clone();
            Ok(())
          }
          None => Err(CompileError::semantic(
            range,
            format!("undeclared variable `{}`", name),
          )),
        }
      }
      LValueKind::Prefix(_, target) => self.resolve_lvalue(target),
    }
  }

  fn fresh_loop_label(&mut self) -> String {
    let label = format!("{}.{}", self.fun, self.loop_counter);
    self.loop_counter += 1;
    label
  }

  /// Drop every binding declared at the layer being left.
  fn pop_layer(&mut self) {
    for stack in self.env.values_mut() {
      while matches!(stack.last(), Some(binding) if binding.layer == self.layer)
      {
        stack.pop();
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use support::ErrorKind;

  fn resolved(source: &str) -> Program {
    let mut prog = ast::parse(source).unwrap();
    resolve(&mut prog).unwrap();
    prog
  }

  fn resolve_err(source: &str) -> CompileError {
    let mut prog = ast::parse(source).unwrap();
    resolve(&mut prog).unwrap_err()
  }

  fn decl_names(block: &Block) -> Vec<&str> {
    block
      .items
      .iter()
      .filter_map(|item| match item {
        BlockItem::Decl(decl) => Some(decl.name.as_str()),
        _ => None,
      })
      .collect()
  }

  #[test]
  fn declarations_are_renamed_by_layer() {
    let prog = resolved("int main() { int a = 1; { int a = 2; } return a; }");
    assert_eq!(decl_names(&prog.main.body), vec!["main::a::1"]);
    let inner = prog
      .main
      .body
      .items
      .iter()
      .find_map(|item| match item {
        BlockItem::Stmt(Stmt {
          kind: StmtKind::Compound(block),
          ..
        }) => Some(block),
        _ => None,
      })
      .unwrap();
    assert_eq!(decl_names(inner), vec!["main::a::2"]);
    // The trailing `return a` sees the outer binding again.
    let ret = prog.main.body.items.last().unwrap();
    match ret {
      BlockItem::Stmt(Stmt {
        kind: StmtKind::Return(Some(exp)),
        ..
      }) => assert_eq!(exp.kind, ExpKind::Var("main::a::1".to_owned())),
      item => panic!("unexpected item {:?}", item),
    }
  }

  #[test]
  fn duplicate_declaration_in_same_layer() {
    let err = resolve_err("int main() { int a = 1; int a = 2; return a; }");
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert_eq!(err.message, "duplicate declaration of `a`");
  }

  #[test]
  fn shadowing_in_inner_layer_is_allowed() {
    resolved("int main() { int a = 1; { int a = 2; { int a = 3; } } return a; }");
  }

  #[test]
  fn use_before_declaration() {
    let err = resolve_err("int main() { a = 5; int a; return a; }");
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert_eq!(err.message, "undeclared variable `a`");
  }

  #[test]
  fn use_after_scope_ends() {
    let err = resolve_err("int main() { { int a = 1; } return a; }");
    assert_eq!(err.kind, ErrorKind::Semantic);
  }

  #[test]
  fn for_init_variable_dies_with_the_loop() {
    let err =
      resolve_err("int main() { for (int i = 0; i < 3; i++) ; return i; }");
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert_eq!(err.message, "undeclared variable `i`");
  }

  #[test]
  fn for_body_can_shadow_the_init_variable() {
    resolved("int main() { for (int i = 0; i < 3; i++) { int i = 7; i; } return 0; }");
  }

  #[test]
  fn break_outside_loop() {
    let err = resolve_err("int main() { break; return 0; }");
    assert_eq!(err.kind, ErrorKind::Semantic);
    assert_eq!(err.message, "`break` outside of a loop");
  }

  #[test]
  fn continue_outside_loop() {
    let err = resolve_err("int main() { continue; }");
    assert_eq!(err.kind, ErrorKind::Semantic);
  }

  fn find_continue(stmt: &Stmt) -> Option<(&str, bool)> {
    match &stmt.kind {
      StmtKind::Continue { label, is_for } => Some((label, *is_for)),
      StmtKind::If { then, els, .. } => find_continue(then)
        .or_else(|| els.as_deref().and_then(find_continue)),
      StmtKind::Compound(block) => block.items.iter().find_map(|item| {
        match item {
          BlockItem::Stmt(stmt) => find_continue(stmt),
          _ => None,
        }
      }),
      StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
        find_continue(body)
      }
      _ => None,
    }
  }

  #[test]
  fn continue_in_nested_if_targets_the_for() {
    let prog = resolved(
      "int main() { for (int i = 0; i < 4; i++) { if (i) { continue; } } return 0; }",
    );
    let for_stmt = prog
      .main
      .body
      .items
      .iter()
      .find_map(|item| match item {
        BlockItem::Stmt(
          stmt @ Stmt {
            kind: StmtKind::For { .. },
            ..
          },
        ) => Some(stmt),
        _ => None,
      })
      .unwrap();
    let label = match &for_stmt.kind {
      StmtKind::For { label, .. } => label.clone(),
      _ => unreachable!(),
    };
    assert_eq!(find_continue(for_stmt), Some((label.as_str(), true)));
  }

  #[test]
  fn inner_loop_captures_break_and_continue() {
    let prog = resolved(
      "int main() { while (1) { while (2) { break; } continue; } return 0; }",
    );
    let outer = match &prog.main.body.items[0] {
      BlockItem::Stmt(stmt) => stmt,
      item => panic!("unexpected item {:?}", item),
    };
    let (outer_label, outer_body) = match &outer.kind {
      StmtKind::While { label, body, .. } => (label.clone(), body),
      kind => panic!("unexpected stmt {:?}", kind),
    };
    let block = match &outer_body.kind {
      StmtKind::Compound(block) => block,
      kind => panic!("unexpected stmt {:?}", kind),
    };
    let inner_label = block
      .items
      .iter()
      .find_map(|item| match item {
        BlockItem::Stmt(Stmt {
          kind: StmtKind::While { label, body, .. },
          ..
        }) => {
          assert_eq!(find_continue(body), None);
          match &body.kind {
            StmtKind::Compound(inner) => {
              match &inner.items[0] {
                BlockItem::Stmt(Stmt {
                  kind: StmtKind::Break { label: target },
                  ..
                }) => assert_eq!(target, label),
                item => panic!("unexpected item {:?}", item),
              }
            }
            kind => panic!("unexpected stmt {:?}", kind),
          }
          Some(label.clone())
        }
        _ => None,
      })
      .unwrap();
    assert_ne!(inner_label, outer_label);
    // The outer `continue` targets the outer loop, not the inner.
    assert_eq!(
      find_continue(outer),
      Some((outer_label.as_str(), false))
    );
  }

  #[test]
  fn loop_labels_are_unique() {
    let prog = resolved(
      "int main() { while (1) break; while (1) break; for (;;) break; return 0; }",
    );
    let mut labels = vec![];
    for item in &prog.main.body.items {
      if let BlockItem::Stmt(stmt) = item {
        match &stmt.kind {
          StmtKind::While { label, .. } | StmtKind::For { label, .. } => {
            labels.push(label.clone())
          }
          _ => {}
        }
      }
    }
    assert_eq!(labels, vec!["main.0", "main.1", "main.2"]);
  }
}
