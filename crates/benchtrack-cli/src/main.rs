use std::process::ExitCode;

fn main() -> ExitCode {
    benchtrack_cli::run()
}
