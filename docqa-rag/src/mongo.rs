//! Exporting MongoDB collections to a JSON file the records extractor reads.
//!
//! This module is only available when the `mongodb` feature is enabled.

use std::path::{Path, PathBuf};

use futures::TryStreamExt;
use mongodb::Client;
use mongodb::bson::{Bson, Document as BsonDocument, doc};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::error::{RagError, Result};

/// Database read by the blogging deployment.
pub const DEFAULT_DATABASE: &str = "blogging";

/// Collections exported by the blogging deployment.
pub const DEFAULT_COLLECTIONS: &[&str] = &["blogs", "users"];

fn export_error(uri_or_path: &str, message: impl Into<String>) -> RagError {
    RagError::extraction(uri_or_path, message)
}

/// Dump every document of `collections` into `out_path` as
/// `{ "<collection>": [records...] }`.
///
/// Object ids become hex strings and datetimes RFC 3339 strings; other
/// values use relaxed extended JSON. Parent directories of `out_path` are
/// created as needed.
///
/// # Errors
///
/// Returns [`RagError::Extraction`] naming the database or output path when
/// the connection, a query, or the write fails.
pub async fn export_collections(
    uri: &str,
    database: &str,
    collections: &[&str],
    out_path: &Path,
) -> Result<PathBuf> {
    let client = Client::with_uri_str(uri).await.map_err(|e| {
        error!(database, error = %e, "failed to connect to MongoDB");
        export_error(database, format!("failed to connect: {e}"))
    })?;
    let db = client.database(database);

    let mut export = Map::new();
    for name in collections {
        let cursor = db.collection::<BsonDocument>(name).find(doc! {}).await.map_err(|e| {
            error!(database, collection = name, error = %e, "find failed");
            export_error(database, format!("failed to query '{name}': {e}"))
        })?;
        let documents: Vec<BsonDocument> = cursor.try_collect().await.map_err(|e| {
            export_error(database, format!("failed to read '{name}': {e}"))
        })?;

        info!(database, collection = name, record_count = documents.len(), "exported collection");
        let records = documents.into_iter().map(document_to_json).collect();
        export.insert((*name).to_string(), Value::Array(records));
    }

    let out_id = out_path.display().to_string();
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| export_error(&out_id, format!("failed to create directory: {e}")))?;
    }

    let body = serde_json::to_vec_pretty(&Value::Object(export))?;
    tokio::fs::write(out_path, body)
        .await
        .map_err(|e| export_error(&out_id, format!("failed to write export: {e}")))?;

    Ok(out_path.to_path_buf())
}

/// Convert a BSON document into plain JSON.
pub fn document_to_json(document: BsonDocument) -> Value {
    Value::Object(document.into_iter().map(|(key, value)| (key, bson_to_json(value))).collect())
}

fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => Value::String(s),
            Err(_) => Value::from(dt.timestamp_millis()),
        },
        Bson::Document(document) => document_to_json(document),
        Bson::Array(values) => Value::Array(values.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::DateTime;
    use mongodb::bson::oid::ObjectId;

    use super::*;

    #[test]
    fn object_ids_and_dates_become_strings() {
        let oid = ObjectId::parse_str("65f0c0ffee0000000000beef").unwrap();
        let record = doc! {
            "_id": oid,
            "name": "ada",
            "createdAt": DateTime::from_millis(0),
            "posts": [ { "postId": oid } ],
        };

        let json = document_to_json(record);
        assert_eq!(json["_id"], "65f0c0ffee0000000000beef");
        assert_eq!(json["name"], "ada");
        assert!(json["createdAt"].as_str().unwrap().starts_with("1970-01-01T00:00:00"));
        assert_eq!(json["posts"][0]["postId"], "65f0c0ffee0000000000beef");
    }
}
