//! `trellisd` binary: accepts OpenFlow switches and logs what they report.

use std::process::ExitCode;

use trellisd::{SwitchLogger, Typed, run_controller};

fn main() -> ExitCode {
    match run_controller(Typed::new(SwitchLogger)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(
                target: concat!(env!("CARGO_PKG_NAME"), "::process"),
                error = %error,
                "controller stopped"
            );
            eprintln!("trellisd: {error}");
            ExitCode::FAILURE
        }
    }
}
