//! Realtime change notifications and the JSON-patch cache they drive.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use futures::Stream;
use json_patch::{AddOperation, Patch, PatchOperation, RemoveOperation, ReplaceOperation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::{
    StreamExt,
    wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};
use tracing::{debug, warn};
use ts_rs::TS;
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown change kind: {0}")]
    UnknownKind(String),
    #[error("invalid pointer {path}: {reason}")]
    Pointer { path: String, reason: String },
    #[error(transparent)]
    Patch(#[from] json_patch::PatchError),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Table {
    Profiles,
    Projects,
    Tasks,
    Expenses,
    Incidents,
    Surveys,
    Quotes,
    Reports,
    Minutes,
    ClientMeetings,
    LedgerEntries,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, EnumIter, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub id: Uuid,
    #[ts(type = "unknown")]
    pub record: Option<Value>,
    pub at: DateTime<Utc>,
}

fn to_record<T: Serialize>(table: Table, id: Uuid, record: &T) -> Option<Value> {
    match serde_json::to_value(record) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(%table, %id, error = %e, "Failed to serialize change record");
            None
        }
    }
}

fn pointer<P>(path: String) -> Result<P, EventError>
where
    P: TryFrom<String>,
    P::Error: std::fmt::Display,
{
    P::try_from(path.clone()).map_err(|e| EventError::Pointer {
        path,
        reason: e.to_string(),
    })
}

impl ChangeEvent {
    pub fn insert<T: Serialize>(table: Table, id: Uuid, record: &T) -> Self {
        Self {
            table,
            kind: ChangeKind::Insert,
            id,
            record: to_record(table, id, record),
            at: Utc::now(),
        }
    }

    pub fn update<T: Serialize>(table: Table, id: Uuid, record: &T) -> Self {
        Self {
            table,
            kind: ChangeKind::Update,
            id,
            record: to_record(table, id, record),
            at: Utc::now(),
        }
    }

    pub fn delete(table: Table, id: Uuid) -> Self {
        Self {
            table,
            kind: ChangeKind::Delete,
            id,
            record: None,
            at: Utc::now(),
        }
    }

    /// `/<table>/<id>` inside a snapshot document.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.table, self.id)
    }

    /// Patch against a `{ "<table>": { "<id>": record } }` snapshot.
    pub fn to_patch(&self) -> Result<Patch, EventError> {
        let path = pointer(self.path())?;
        let value = self.record.clone().unwrap_or(Value::Null);
        let op = match self.kind {
            ChangeKind::Insert => PatchOperation::Add(AddOperation { path, value }),
            ChangeKind::Update => PatchOperation::Replace(ReplaceOperation { path, value }),
            ChangeKind::Delete => PatchOperation::Remove(RemoveOperation { path }),
        };
        Ok(Patch(vec![op]))
    }
}

/// Which events a subscriber wants. Empty lists match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub tables: Vec<Table>,
    pub kinds: Vec<ChangeKind>,
}

fn parse_list<T: FromStr>(
    raw: Option<&str>,
    err: impl Fn(String) -> EventError,
) -> Result<Vec<T>, EventError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(|_| err(s.to_string())))
        .collect()
}

impl EventFilter {
    /// Parses comma separated lists such as `projects,tasks` and `insert,update`.
    pub fn parse(tables: Option<&str>, kinds: Option<&str>) -> Result<Self, EventError> {
        Ok(Self {
            tables: parse_list(tables, EventError::UnknownTable)?,
            kinds: parse_list(kinds, EventError::UnknownKind)?,
        })
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        (self.tables.is_empty() || self.tables.contains(&event.table))
            && (self.kinds.is_empty() || self.kinds.contains(&event.kind))
    }
}

/// What a subscriber receives. `Resync` means events were dropped and the
/// client should refetch everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    Change(ChangeEvent),
    Resync,
}

#[derive(Clone)]
pub struct EventService {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for EventService {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventService {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        let (table, kind, id) = (event.table, event.kind, event.id);
        match self.tx.send(event) {
            Ok(receivers) => debug!(%table, %kind, %id, receivers, "Published change"),
            Err(_) => debug!(%table, %kind, %id, "No subscribers for change"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn subscribe(&self, filter: EventFilter) -> impl Stream<Item = LiveMessage> + Send + 'static + use<> {
        BroadcastStream::new(self.tx.subscribe()).filter_map(move |msg| match msg {
            Ok(event) => filter.matches(&event).then_some(LiveMessage::Change(event)),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Subscriber lagged behind, requesting resync");
                Some(LiveMessage::Resync)
            }
        })
    }
}

/// Client-side style cache: a JSON document patched by incoming events.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    doc: Value,
}

impl Default for LiveSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveSnapshot {
    pub fn new() -> Self {
        Self {
            doc: Value::Object(Map::new()),
        }
    }

    fn ensure_table(&mut self, table: Table) {
        if !self.doc.is_object() {
            self.doc = Value::Object(Map::new());
        }
        let key = table.to_string();
        if self.doc.get(&key).is_none_or(|v| !v.is_object()) {
            self.doc[key.as_str()] = Value::Object(Map::new());
        }
    }

    /// Replaces every row of `table`, as after an initial fetch.
    pub fn seed<T: Serialize>(
        &mut self,
        table: Table,
        rows: impl IntoIterator<Item = (Uuid, T)>,
    ) -> Result<(), serde_json::Error> {
        let mut fresh = Map::new();
        for (id, row) in rows {
            fresh.insert(id.to_string(), serde_json::to_value(row)?);
        }
        self.ensure_table(table);
        self.doc[table.to_string().as_str()] = Value::Object(fresh);
        Ok(())
    }

    pub fn get(&self, table: Table, id: Uuid) -> Option<&Value> {
        self.doc.get(table.to_string())?.get(id.to_string())
    }

    pub fn len(&self, table: Table) -> usize {
        self.doc
            .get(table.to_string())
            .and_then(Value::as_object)
            .map_or(0, Map::len)
    }

    pub fn document(&self) -> &Value {
        &self.doc
    }

    pub fn clear(&mut self) {
        self.doc = Value::Object(Map::new());
    }

    /// Applies one event. Updates for unknown rows become inserts and deletes
    /// of unknown rows are ignored.
    pub fn apply(&mut self, event: &ChangeEvent) -> Result<(), EventError> {
        self.ensure_table(event.table);
        let known = self.get(event.table, event.id).is_some();
        let event = match (event.kind, known) {
            (ChangeKind::Delete, false) => return Ok(()),
            (ChangeKind::Update, false) => ChangeEvent {
                kind: ChangeKind::Insert,
                ..event.clone()
            },
            _ => event.clone(),
        };
        json_patch::patch(&mut self.doc, &event.to_patch()?)?;
        Ok(())
    }

    /// Returns true when the caller must refetch and reseed.
    pub fn apply_message(&mut self, message: &LiveMessage) -> Result<bool, EventError> {
        match message {
            LiveMessage::Change(event) => self.apply(event).map(|_| false),
            LiveMessage::Resync => {
                self.clear();
                Ok(true)
            }
        }
    }
}
