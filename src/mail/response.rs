//! Typed views of server responses.
//!
//! Everything downstream of the session works on these structs instead of
//! raw protocol text, so the parsing stays in one place.

use chrono::{DateTime, FixedOffset};
use imap::types::{Fetch, Name, NameAttribute};

use crate::domain::email::Uid;

/// One item of a UID FETCH response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedItem {
    pub uid: Option<Uid>,
    pub internal_date: Option<DateTime<FixedOffset>>,
    /// `BODY[HEADER.FIELDS (...)]` / `BODY[HEADER]` block.
    pub header: Option<Vec<u8>>,
    /// Full message (`RFC822` / `BODY[]`).
    pub body: Option<Vec<u8>>,
}

impl FetchedItem {
    pub fn from_fetch(fetch: &Fetch) -> Self {
        Self {
            uid: fetch.uid,
            internal_date: fetch.internal_date(),
            header: fetch.header().map(<[u8]>::to_vec),
            body: fetch.body().map(<[u8]>::to_vec),
        }
    }

    pub fn size(&self) -> usize {
        self.body.as_ref().map_or(0, Vec::len)
    }
}

/// One line of a LIST response. `wire_name` is exactly what the server
/// sent, already unquoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedMailbox {
    pub wire_name: String,
    pub selectable: bool,
}

impl ListedMailbox {
    pub fn from_name(name: &Name) -> Self {
        let selectable = !name
            .attributes()
            .iter()
            .any(|attr| matches!(attr, NameAttribute::NoSelect));
        Self {
            wire_name: name.name().to_string(),
            selectable,
        }
    }
}
