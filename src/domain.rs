//! Library event payload published to the broker.

use serde::{Deserialize, Serialize};

/// A book registered through a library event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub book_id: i32,
    pub book_name: String,
    pub book_author: String,
}

/// The event accepted over HTTP and forwarded to the library events topic.
///
/// `library_event_id` doubles as the partition key: every event carrying the
/// same id lands on the same partition. A missing id leaves partition
/// assignment to the broker client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEvent {
    pub library_event_id: Option<i32>,
    pub book: Book,
}

impl LibraryEvent {
    pub fn new(library_event_id: Option<i32>, book: Book) -> Self {
        Self {
            library_event_id,
            book,
        }
    }

    /// The partition key for this event.
    pub fn key(&self) -> Option<i32> {
        self.library_event_id
    }

    /// Canonical JSON wire form.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_wire(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }
}
