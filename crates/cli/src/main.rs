use std::process::ExitCode;

fn main() -> ExitCode {
    storesight_cli::run()
}
