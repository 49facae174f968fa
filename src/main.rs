//! rma - track returned units through sorting, repair and storage

use std::process::ExitCode;

use rma_tracker::{EngineError, ErrorKind};

fn main() -> ExitCode {
    match rma_tracker::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(&e)
        }
    }
}

/// Distinct exit codes per engine failure class so scripts can branch on them
fn exit_code(err: &anyhow::Error) -> ExitCode {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<EngineError>())
        .map(EngineError::kind);

    match kind {
        Some(ErrorKind::Validation) => ExitCode::from(2),
        Some(ErrorKind::Conflict) => ExitCode::from(3),
        Some(ErrorKind::PreconditionFailed) => ExitCode::from(4),
        Some(ErrorKind::NotFound) => ExitCode::from(5),
        Some(ErrorKind::Internal) | None => ExitCode::FAILURE,
    }
}
