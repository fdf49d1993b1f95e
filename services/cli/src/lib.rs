mod cli;
mod scout;

use rental_scout::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
