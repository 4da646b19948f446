use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match applicant_screening_api::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("applicant-screening: {err}");
            ExitCode::FAILURE
        }
    }
}
