fn main() {
  support::cli_main(minic::compile);
}
