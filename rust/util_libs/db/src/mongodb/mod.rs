pub mod api;
pub mod collection;

use bson::{doc, DateTime};
use mongodb::{Client, Database};

use crate::error::{DbError, DbResult};
use collection::MongoCollection;

/// Default URL used when `MONGO_URL` is not set.
pub const DEFAULT_MONGODB_URL: &str = "mongodb://127.0.0.1:27017";

/// Returns the MongoDB connection URL from environment variables.
///
/// # Returns
///
/// - If `MONGO_URL` environment variable is set, returns its value
/// - Otherwise, returns the default local MongoDB URL: "mongodb://127.0.0.1:27017"
pub fn get_mongodb_url() -> String {
    std::env::var("MONGO_URL").unwrap_or_else(|_| DEFAULT_MONGODB_URL.to_string())
}

/// [`DocumentStore`](crate::store::DocumentStore) backed by one MongoDB database.
///
/// Ids are stored as hex strings in `_id`. Batch commits run in a
/// transaction and subscriptions use change streams, so both need the server
/// to run as a replica set.
#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    // NB: Each `mongodb::Client` clone is an alias of an Arc type and allows for multiple references of the same connection pool.
    pub fn new(client: &Client, db_name: &str) -> Self {
        log::debug!("Using MongoDB database: {}", db_name);
        Self {
            client: client.clone(),
            database: client.database(db_name),
        }
    }

    /// Connects to `url` and selects `db_name`.
    pub async fn connect(url: &str, db_name: &str) -> DbResult<Self> {
        let client = Client::with_uri_str(url).await.map_err(|e| {
            log::error!("Failed to connect to MongoDB: {}", e);
            DbError::database(e, None, Some("connect".to_string()))
        })?;
        log::info!("Connected to MongoDB, database {}", db_name);
        Ok(Self::new(&client, db_name))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn collection(&self, name: &str) -> MongoCollection {
        MongoCollection::new(&self.database, name)
    }

    /// The server's clock, read from `hello`. Lifecycle stamps use it so
    /// every client writes the same time base.
    pub async fn server_time(&self) -> DbResult<DateTime> {
        let reply = self
            .database
            .run_command(doc! { "hello": 1 })
            .await
            .map_err(|e| DbError::database(e, None, Some("hello".to_string())))?;
        reply.get_datetime("localTime").copied().map_err(|e| {
            DbError::internal(
                format!("hello reply has no localTime: {}", e),
                Some("server_time".to_string()),
            )
        })
    }
}
