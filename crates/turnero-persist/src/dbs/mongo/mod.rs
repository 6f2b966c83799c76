pub mod client;
pub mod models;
pub mod repositories;

pub use client::MongoPersistenceClient;

use mongodb::bson::oid::ObjectId;
use mongodb::error::{Error, ErrorKind, WriteFailure};

use crate::error::{PersistError, Result};

const DUPLICATE_KEY_CODE: i32 = 11000;

pub(crate) fn parse_oid(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|e| PersistError::InvalidObjectId(format!("{}: {}", id, e)))
}

/// Whether a driver error is a unique index violation
pub(crate) fn is_duplicate_key(err: &Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

/// Whether a driver error is a unique violation of the named index
pub(crate) fn violates_index(err: &Error, index: &str) -> bool {
    let message = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE => &e.message,
        ErrorKind::Command(e) if e.code == DUPLICATE_KEY_CODE => &e.message,
        _ => return false,
    };
    message.contains(index)
}
