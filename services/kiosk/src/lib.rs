mod cli;
mod infra;
mod routes;
mod scan;
mod server;

use academy_desk::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
