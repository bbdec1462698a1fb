use std::process::ExitCode;

fn main() -> ExitCode {
    vaxline_cli::run()
}
