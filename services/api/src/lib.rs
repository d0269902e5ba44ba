mod cli;
mod infra;
mod query;
mod routes;
mod server;

use trial_match::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
