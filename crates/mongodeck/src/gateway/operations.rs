//! Driver calls issued on a borrowed client

use futures::TryStreamExt;
use futures::future::join_all;
use mongodb::Client;
use mongodb::bson::{Bson, Document, doc};
use serde::Serialize;
use serde_json::Value;

use super::parse::{Page, is_system_database};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSummary {
    pub name: String,
    pub size_on_disk: u64,
    pub empty: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub size: u64,
    pub count: u64,
    pub avg_obj_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub stats: CollectionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentPage {
    pub documents: Vec<Value>,
    pub total: u64,
    pub limit: u32,
    pub skip: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

/// Round-trip to the server
pub async fn ping(client: &Client) -> Result<()> {
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await?;
    Ok(())
}

/// User databases, system ones excluded
pub async fn list_databases(client: &Client) -> Result<Vec<DatabaseSummary>> {
    let databases = client.list_databases().await?;
    Ok(databases
        .into_iter()
        .filter(|db| !is_system_database(&db.name))
        .map(|db| DatabaseSummary {
            name: db.name,
            size_on_disk: db.size_on_disk,
            empty: db.empty,
        })
        .collect())
}

/// Collections of `database` with storage statistics.
///
/// Stats are fetched concurrently; a collection that refuses `collStats`
/// (views, missing privileges) reports zeros.
pub async fn list_collections(client: &Client, database: &str) -> Result<Vec<CollectionSummary>> {
    require_name(database, "database")?;
    let db = client.database(database);
    let specs: Vec<_> = db.list_collections().await?.try_collect().await?;

    let stats = join_all(specs.iter().map(|spec| {
        let db = db.clone();
        let name = spec.name.clone();
        async move {
            match db.run_command(doc! { "collStats": name.as_str() }).await {
                Ok(reply) => stats_from_reply(&reply),
                Err(e) => {
                    tracing::debug!(collection = %name, error = %e, "collStats unavailable");
                    CollectionStats::default()
                }
            }
        }
    }))
    .await;

    Ok(specs
        .into_iter()
        .zip(stats)
        .map(|(spec, stats)| CollectionSummary {
            kind: mongodb::bson::to_bson(&spec.collection_type)
                .ok()
                .and_then(|b| b.as_str().map(str::to_owned))
                .unwrap_or_else(|| "collection".to_owned()),
            name: spec.name,
            stats,
        })
        .collect())
}

/// One page of documents matching `filter`, with the total match count
pub async fn find_documents(
    client: &Client,
    database: &str,
    collection: &str,
    filter: Document,
    page: Page,
) -> Result<DocumentPage> {
    require_name(database, "database")?;
    require_name(collection, "collection")?;
    let coll = client.database(database).collection::<Document>(collection);

    let documents = async {
        let cursor = coll
            .find(filter.clone())
            .skip(page.skip)
            .limit(i64::from(page.limit))
            .await?;
        cursor.try_collect::<Vec<Document>>().await
    };
    let total = async { coll.count_documents(filter.clone()).await };

    let (documents, total) = tokio::try_join!(documents, total)?;

    Ok(DocumentPage {
        documents: documents
            .into_iter()
            .map(|d| Bson::Document(d).into_relaxed_extjson())
            .collect(),
        total,
        limit: page.limit,
        skip: page.skip,
    })
}

/// `$set` the fields of `update` on the document with `id`
pub async fn update_document(
    client: &Client,
    database: &str,
    collection: &str,
    id: Bson,
    update: Document,
) -> Result<UpdateOutcome> {
    require_name(database, "database")?;
    require_name(collection, "collection")?;
    let result = client
        .database(database)
        .collection::<Document>(collection)
        .update_one(doc! { "_id": id }, doc! { "$set": update })
        .await?;

    if result.matched_count == 0 {
        return Err(Error::NotFound("document".into()));
    }
    Ok(UpdateOutcome {
        matched_count: result.matched_count,
        modified_count: result.modified_count,
    })
}

/// Remove the document with `id`
pub async fn delete_document(
    client: &Client,
    database: &str,
    collection: &str,
    id: Bson,
) -> Result<DeleteOutcome> {
    require_name(database, "database")?;
    require_name(collection, "collection")?;
    let result = client
        .database(database)
        .collection::<Document>(collection)
        .delete_one(doc! { "_id": id })
        .await?;

    if result.deleted_count == 0 {
        return Err(Error::NotFound("document".into()));
    }
    Ok(DeleteOutcome {
        deleted_count: result.deleted_count,
    })
}

fn require_name(name: &str, what: &str) -> Result<()> {
    if name.is_empty() || name.contains('\0') {
        return Err(Error::InvalidQuery(format!("invalid {what} name")));
    }
    Ok(())
}

fn stats_from_reply(reply: &Document) -> CollectionStats {
    CollectionStats {
        size: numeric(reply, "size").max(0.0) as u64,
        count: numeric(reply, "count").max(0.0) as u64,
        avg_obj_size: numeric(reply, "avgObjSize"),
    }
}

fn numeric(doc: &Document, key: &str) -> f64 {
    match doc.get(key) {
        Some(Bson::Int32(v)) => f64::from(*v),
        Some(Bson::Int64(v)) => *v as f64,
        Some(Bson::Double(v)) => *v,
        _ => 0.0,
    }
}
