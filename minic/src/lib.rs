use support::CompileError;

pub mod pass;

/// Run the whole pipeline: source text in, AT&T x86-64 text out.
pub fn compile(input: &str) -> Result<String, CompileError> {
  let mut prog = ast::parse(input)?;
  self::pass::resolve::resolve(&mut prog)?;
  let body = self::pass::lower::lower(&prog)?;
  let prog = self::pass::instruction_selection::select_instruction(&body)?;
  Ok(prog.to_att())
}
