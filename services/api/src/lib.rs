mod cli;
mod demo;
mod infra;
mod routes;
mod server;
mod sign;

use applicant_screening::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
