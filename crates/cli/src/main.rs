use std::process::ExitCode;

fn main() -> ExitCode {
    rackbot_cli::run()
}
