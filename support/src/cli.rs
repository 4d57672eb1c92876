use crate::CompileError;
use crate::CompileErrorPrinter;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

/// Driver for the compiler binary: `<prog> FILE` compiles FILE and
/// drops the assembly next to it, as FILE with an `.asm` extension.
/// Compile errors go through the line/column printer; every failure
/// exits non-zero without touching the output file.
pub fn cli_main(compile: impl FnOnce(&str) -> Result<String, CompileError>) {
  let mut args = env::args();
  let prog = args.next().unwrap_or_else(|| "minic".to_owned());
  let path = match (args.next(), args.next()) {
    (Some(path), None) => PathBuf::from(path),
    _ => {
      eprintln!("usage: {} <source-file>", prog);
      process::exit(1);
    }
  };

  let source = match fs::read_to_string(&path) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("cannot read {}: {}", path.display(), err);
      process::exit(1);
    }
  };

  let asm = match compile(&source) {
    Ok(asm) => asm,
    Err(err) => {
      CompileErrorPrinter::new(&path, &source).print(&err);
      process::exit(1);
    }
  };

  let out_path = path.with_extension("asm");
  if let Err(err) = fs::write(&out_path, asm) {
    eprintln!("cannot write {}: {}", out_path.display(), err);
    process::exit(1);
  }
}
