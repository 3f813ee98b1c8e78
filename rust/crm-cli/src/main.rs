/*
 Command line client for the estate CRM.

 Connects to the configured MongoDB database and runs one command against
 one company's records:
  - list / page through a collection
  - get, soft-delete and restore single records
  - watch a record or a listing for changes
*/

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use crm_db::mongodb::MongoStore;
use crm_services::config::load_config;
use dotenv::dotenv;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = cli::Root::parse();
    let config = load_config().context("failed to load configuration")?;

    let mongo_url = args.connection.mongo_url.unwrap_or(config.mongo_url);
    let database = args.connection.database.unwrap_or(config.database_name);
    log::debug!("Using database {} for company {}", database, args.company);

    let store = MongoStore::connect(&mongo_url, &database).await?;
    commands::run(store, &args.company, config.default_page_size, args.command).await
}
