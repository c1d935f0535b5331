use dotenvy::dotenv;

use soroban::error::ApplicationError;
use soroban::{config, counter, logger, server};

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = config::load()?;

    let _guard = logger::init(&config)?;

    let counter = counter::connect(&config).await?;

    server::serve(config, counter).await
}
