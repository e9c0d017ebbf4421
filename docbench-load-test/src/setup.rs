use docbench_client::Client;
use docbench_common::{
    CollectionCreateRequest, DocDbError, Document, EdgeDefinition, GraphCreateRequest, GraphOptions,
    IndexCreateRequest, ViewCreateRequest, DOCUMENT_COLLECTION, KEY_FIELD,
};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::{IndexSpec, RunConfiguration};
use crate::document::{DUMMY_VERTEX_KEY, FIELD_ARRAY, FIELD_LARGE, FIELD_OBJECT, FIELD_SIMPLE};
use crate::error::{BackendError, SetupError};

pub const VIEW_NAME: &str = "MySearch";

/// Prepares the database, collections, graph and indexes a run needs.
pub trait DatabaseSetup: Send + Sync {
    fn setup(&self, config: &RunConfiguration, drop_first: bool) -> Result<(), SetupError>;
}

/// Provisions through the document HTTP API. Only a database that cannot be
/// created is fatal; everything else is logged and skipped.
#[derive(Debug, Default)]
pub struct HttpDatabaseSetup;

impl DatabaseSetup for HttpDatabaseSetup {
    fn setup(&self, config: &RunConfiguration, drop_first: bool) -> Result<(), SetupError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SetupError::Connect(BackendError::Runtime(e.to_string())))?;
        runtime.block_on(async {
            let client = Client::new(config.client_config()).map_err(|e| SetupError::Connect(e.into()))?;
            provision(&client, config, drop_first).await
        })
    }
}

async fn provision(client: &Client, config: &RunConfiguration, drop_first: bool) -> Result<(), SetupError> {
    let names = &config.names;
    if drop_first {
        match client.drop_database(&names.database).await {
            Ok(()) => info!(database = %names.database, "database dropped"),
            Err(e) => debug!(database = %names.database, error = %e, "database not dropped"),
        }
    }
    ensure_database(client, &names.database).await?;
    ensure_collection(client, config, &names.collection).await;

    let mut collections = vec![names.collection.as_str()];
    if config.needs_graph() {
        ensure_graph(client, config).await;
        insert_dummy_vertex(client, &names.vertex_collection).await;
        collections.push(&names.vertex_collection);
        collections.push(&names.edge_collection);
    }

    let provisioning = &config.provisioning;
    for collection in &collections {
        for (indexes, family) in [
            (&provisioning.index_simple, FIELD_SIMPLE),
            (&provisioning.index_large, FIELD_LARGE),
            (&provisioning.index_arrays, FIELD_ARRAY),
            (&provisioning.index_objects, FIELD_OBJECT),
        ] {
            create_indexes(client, collection, indexes, family).await;
        }
    }
    if provisioning.view {
        create_view(client, &collections).await;
    }
    Ok(())
}

async fn ensure_database(client: &Client, name: &str) -> Result<(), SetupError> {
    if matches!(client.database_exists(name).await, Ok(true)) {
        return Ok(());
    }
    match client.create_database(name).await {
        Ok(()) => {
            info!(database = %name, "database created");
            Ok(())
        }
        // Another client may have created it in the meantime.
        Err(_) if matches!(client.database_exists(name).await, Ok(true)) => Ok(()),
        Err(e) => {
            error!(database = %name, error = %e, "failed to create database");
            Err(SetupError::Database { name: name.to_string(), source: e.into() })
        }
    }
}

async fn ensure_collection(client: &Client, config: &RunConfiguration, name: &str) {
    if matches!(client.collection_exists(name).await, Ok(true)) {
        return;
    }
    let request = CollectionCreateRequest {
        name: name.to_string(),
        collection_type: DOCUMENT_COLLECTION,
        number_of_shards: config.provisioning.number_of_shards,
        replication_factor: config.provisioning.replication_factor,
        wait_for_sync: config.provisioning.wait_for_sync,
    };
    if let Err(e) = client.create_collection(&request).await {
        if !matches!(client.collection_exists(name).await, Ok(true)) {
            error!(collection = %name, error = %e, "failed to create collection");
        }
    }
}

async fn ensure_graph(client: &Client, config: &RunConfiguration) {
    let names = &config.names;
    if matches!(client.graph_exists(&names.graph).await, Ok(true)) {
        return;
    }
    let request = GraphCreateRequest {
        name: names.graph.clone(),
        edge_definitions: vec![EdgeDefinition {
            collection: names.edge_collection.clone(),
            from: vec![names.vertex_collection.clone()],
            to: vec![names.vertex_collection.clone()],
        }],
        options: Some(GraphOptions {
            number_of_shards: config.provisioning.number_of_shards,
            replication_factor: config.provisioning.replication_factor,
        }),
    };
    if let Err(e) = client.create_graph(&request).await {
        if !matches!(client.graph_exists(&names.graph).await, Ok(true)) {
            error!(graph = %names.graph, error = %e, "failed to create graph");
        }
    }
}

/// The vertex every generated edge points at. An existing one is fine.
async fn insert_dummy_vertex(client: &Client, vertex_collection: &str) {
    if !matches!(client.collection_exists(vertex_collection).await, Ok(true)) {
        return;
    }
    let mut vertex = Document::new();
    vertex.insert(KEY_FIELD.to_string(), Value::String(DUMMY_VERTEX_KEY.to_string()));
    match client.insert_document(vertex_collection, &vertex).await {
        Ok(_) => debug!(collection = %vertex_collection, "dummy vertex inserted"),
        Err(DocDbError::Conflict(_)) => debug!(collection = %vertex_collection, "dummy vertex exists"),
        Err(e) => warn!(collection = %vertex_collection, error = %e, "cannot insert dummy vertex"),
    }
}

/// One single-field index per kind on each of the first `indexes.count` fields of `family`.
async fn create_indexes(client: &Client, collection: &str, indexes: &IndexSpec, family: &str) {
    for kind in &indexes.kinds {
        for i in 0..indexes.count {
            let request = IndexCreateRequest { index_type: kind.as_str().to_string(), fields: vec![format!("{}{}", family, i)] };
            if let Err(e) = client.ensure_index(collection, &request).await {
                warn!(collection = %collection, index = kind.as_str(), field = %request.fields[0], error = %e, "index creation failed");
            }
        }
    }
}

async fn create_view(client: &Client, collections: &[&str]) {
    let links: Map<String, Value> = collections
        .iter()
        .map(|c| (c.to_string(), json!({ "fields": { FIELD_LARGE: {} } })))
        .collect();
    let request = ViewCreateRequest { name: VIEW_NAME.to_string(), view_type: "arangosearch".to_string(), links };
    match client.create_view(&request).await {
        Ok(()) => info!(view = VIEW_NAME, "view created"),
        Err(e) => warn!(view = VIEW_NAME, error = %e, "view creation failed"),
    }
}
