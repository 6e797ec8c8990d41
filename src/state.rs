//! Local chain-tip tracking.

use std::str::FromStr;

use bitcoin::hashes::Hash;
use bitcoin::BlockHash;
use rusqlite::OptionalExtension;

use crate::database::Database;
use crate::error::{Error, Result};

/// Highest block currently mirrored locally.
///
/// Always derived from the store, never mutated in place: callers reload
/// after every committed step so decisions are made against fresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    pub height: i64,
    pub block_id: BlockHash,
}

impl ChainTip {
    /// Sentinel tip for an empty store.
    pub fn empty() -> Self {
        Self {
            height: -1,
            block_id: BlockHash::all_zeros(),
        }
    }

    /// Read the tip from the highest stored block row.
    pub fn load(db: &Database) -> Result<Self> {
        let row = db
            .conn
            .query_row(
                "SELECT height, blockid FROM blocks ORDER BY height DESC LIMIT 1",
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(Self::empty()),
            Some((height, id)) => Ok(Self {
                height,
                block_id: BlockHash::from_str(&id)
                    .map_err(|e| Error::import(format!("bad stored blockid {id}: {e}")))?,
            }),
        }
    }
}
