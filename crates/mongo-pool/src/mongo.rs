//! MongoDB driver binding.
//!
//! [`MongoConnector`] opens `mongodb::Client`s from a [`PoolConfig`], and
//! `mongodb::Client` implements [`Session`] so a pooled guard dereferences to
//! a regular driver client.

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};

use crate::config::PoolConfig;
use crate::error::{DriverError, PoolError};
use crate::lifecycle::{Connector, IndexSpec, SeedOutcome, Session};

/// Server error code for a duplicate key violation.
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Database used for the liveness probe.
const PING_DATABASE: &str = "admin";

/// Opens MongoDB clients with the pool's address and timeouts.
#[derive(Debug, Clone)]
pub struct MongoConnector {
    address: String,
    options: ClientOptions,
}

impl MongoConnector {
    /// Parse the connection string and apply the configured timeouts.
    ///
    /// `connect_timeout` bounds both socket connection and server selection,
    /// `idle_timeout` becomes the driver's maximum connection idle time.
    pub async fn new(config: &PoolConfig) -> Result<Self, PoolError> {
        let mut options = ClientOptions::parse(&config.address)
            .await
            .map_err(|e| PoolError::Connect {
                address: config.address.clone(),
                source: e.into(),
            })?;
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.connect_timeout);
        options.max_idle_time = Some(config.idle_timeout);

        Ok(Self {
            address: config.address.clone(),
            options,
        })
    }

    /// Driver options used for every client.
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Session = Client;

    async fn connect(&self) -> Result<Client, DriverError> {
        tracing::debug!(address = %self.address, "opening mongodb client");
        Ok(Client::with_options(self.options.clone())?)
    }

    fn address(&self) -> &str {
        &self.address
    }
}

fn collection(client: &Client, namespace: &str, collection: &str) -> Collection<Document> {
    client.database(namespace).collection(collection)
}

/// Check whether a driver error is a duplicate key violation.
#[must_use]
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn seq_value(document: &Document) -> Result<i64, DriverError> {
    match document.get("seq") {
        Some(Bson::Int32(v)) => Ok(i64::from(*v)),
        Some(Bson::Int64(v)) => Ok(*v),
        other => Err(DriverError::backend(format!(
            "counter field seq has unexpected value {other:?}"
        ))),
    }
}

fn index_model(index: &IndexSpec) -> IndexModel {
    let mut keys = Document::new();
    for field in &index.fields {
        keys.insert(field.clone(), 1_i32);
    }
    let options = IndexOptions::builder()
        .unique(index.unique)
        .sparse(index.sparse())
        .build();
    IndexModel::builder().keys(keys).options(options).build()
}

#[async_trait]
impl Session for Client {
    async fn ping(&self) -> Result<(), DriverError> {
        self.database(PING_DATABASE)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn disconnect(&self) {
        // Borrowers may still hold driver sessions or cursors; do not wait on them.
        self.clone().shutdown().immediate(true).await;
    }

    async fn insert_counter(
        &self,
        namespace: &str,
        coll: &str,
        id: &str,
    ) -> Result<SeedOutcome, DriverError> {
        match collection(self, namespace, coll)
            .insert_one(doc! { "_id": id, "seq": 0_i64 })
            .await
        {
            Ok(_) => Ok(SeedOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(SeedOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn increment_counter(
        &self,
        namespace: &str,
        coll: &str,
        id: &str,
    ) -> Result<Option<i64>, DriverError> {
        let updated = collection(self, namespace, coll)
            .find_one_and_update(doc! { "_id": id }, doc! { "$inc": { "seq": 1 } })
            .return_document(ReturnDocument::After)
            .await?;
        updated.as_ref().map(seq_value).transpose()
    }

    async fn create_index(
        &self,
        namespace: &str,
        coll: &str,
        index: &IndexSpec,
    ) -> Result<(), DriverError> {
        collection(self, namespace, coll)
            .create_index(index_model(index))
            .await?;
        Ok(())
    }
}
