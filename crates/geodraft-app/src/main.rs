//! Command-line entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting GeoDraft");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match geodraft_app::run(&args) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err}");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
