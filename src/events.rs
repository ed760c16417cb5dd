//! Change event types
//!
//! Typed view of the documents a MongoDB change stream delivers. Events
//! arrive in relaxed extended JSON, so 64-bit integers are plain numbers while
//! resume tokens, timestamps and object ids stay opaque [`Value`]s.
//!
//! See <https://www.mongodb.com/docs/manual/reference/change-events/>.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An untyped document
pub type Document = serde_json::Map<String, Value>;

/// A change event communicated via a MongoDB change stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent<T = Document> {
    /// Resume token of this event
    #[serde(rename = "_id")]
    pub id: Value,

    /// Timestamp of the oplog entry associated with the event
    #[serde(default)]
    pub cluster_time: Value,

    /// Transaction number, only for multi-document transactions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txn_number: Option<Value>,

    /// Session identifier, only for multi-document transactions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lsid: Option<Value>,

    /// What happened
    #[serde(flatten)]
    pub operation: Operation<T>,
}

/// The operation performed, tagged by `operationType`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operationType", rename_all = "camelCase")]
pub enum Operation<T> {
    /// A document got inserted into the collection
    #[serde(rename_all = "camelCase")]
    Insert {
        ns: Namespace,
        document_key: Option<Document>,
        full_document: T,
    },

    /// A document got updated in the collection
    #[serde(rename_all = "camelCase")]
    Update {
        ns: Namespace,
        document_key: Option<Document>,
        #[serde(default)]
        update_description: UpdateDescription,
        /// Only present for `fullDocument: updateLookup` streams
        #[serde(skip_serializing_if = "Option::is_none")]
        full_document: Option<T>,
    },

    /// A document got replaced in the collection
    #[serde(rename_all = "camelCase")]
    Replace {
        ns: Namespace,
        document_key: Option<Document>,
        full_document: T,
    },

    /// A document got deleted from the collection
    #[serde(rename_all = "camelCase")]
    Delete {
        ns: Namespace,
        document_key: Option<Document>,
    },

    /// A collection was dropped from a database
    Drop { ns: Namespace },

    /// A collection was renamed
    Rename { ns: Namespace, to: Namespace },

    /// A database was dropped
    DropDatabase { ns: Namespace },

    /// The change stream cursor was closed
    Invalidate,
}

/// Database and collection an event applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub db: String,

    /// Absent for `dropDatabase`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coll: Option<String>,
}

/// Fields touched by an update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDescription {
    #[serde(default)]
    pub updated_fields: Document,
    #[serde(default)]
    pub removed_fields: Vec<String>,
}

impl<T> ChangeEvent<T> {
    /// The `operationType` string of this event
    #[must_use]
    pub fn operation_type(&self) -> &'static str {
        match self.operation {
            Operation::Insert { .. } => "insert",
            Operation::Update { .. } => "update",
            Operation::Replace { .. } => "replace",
            Operation::Delete { .. } => "delete",
            Operation::Drop { .. } => "drop",
            Operation::Rename { .. } => "rename",
            Operation::DropDatabase { .. } => "dropDatabase",
            Operation::Invalidate => "invalidate",
        }
    }

    /// Namespace the event applies to, if the operation has one
    #[must_use]
    pub fn namespace(&self) -> Option<&Namespace> {
        match &self.operation {
            Operation::Insert { ns, .. }
            | Operation::Update { ns, .. }
            | Operation::Replace { ns, .. }
            | Operation::Delete { ns, .. }
            | Operation::Drop { ns }
            | Operation::Rename { ns, .. }
            | Operation::DropDatabase { ns } => Some(ns),
            Operation::Invalidate => None,
        }
    }

    /// Key of the affected document, for CRUD operations
    #[must_use]
    pub fn document_key(&self) -> Option<&Document> {
        match &self.operation {
            Operation::Insert { document_key, .. }
            | Operation::Update { document_key, .. }
            | Operation::Replace { document_key, .. }
            | Operation::Delete { document_key, .. } => document_key.as_ref(),
            _ => None,
        }
    }

    /// The document after the change, when the event carries it
    #[must_use]
    pub fn full_document(&self) -> Option<&T> {
        match &self.operation {
            Operation::Insert { full_document, .. } | Operation::Replace { full_document, .. } => {
                Some(full_document)
            }
            Operation::Update { full_document, .. } => full_document.as_ref(),
            _ => None,
        }
    }
}
