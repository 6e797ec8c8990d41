use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use bitcoin::{BlockHash, Txid};
use log::info;
use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::error::{Error, Result};

/// Represents the mirror store and provides high-level database operations.
///
/// All sync mutations go through [`Database::with_transaction`]; one sync
/// step never spans more than one transaction.
pub struct Database {
    pub conn: Connection,
}

impl Database {
    /// Open (or create) the database file.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Apply the schema and validate stored metadata.
    ///
    /// Runs as one transaction: a first run commits the schema and both
    /// metadata rows together or not at all, so a crash mid-startup leaves
    /// a pristine store. On every later run the stored `version` and
    /// `network` rows must match exactly, otherwise the store belongs to a
    /// different deployment and touching it would corrupt data. That is a
    /// fatal configuration error, never retried.
    pub fn initialize(&mut self, version: &str, network: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        Self::initialize_in_tx(&tx, version, network)?;
        tx.commit()?;
        Ok(())
    }

    fn initialize_in_tx(tx: &Transaction, version: &str, network: &str) -> Result<()> {
        tx.execute_batch(include_str!("../schema/init.sql"))?;

        let read_info = |key: &str| -> Result<Option<String>> {
            Ok(tx
                .query_row("SELECT value FROM info WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?)
        };

        match read_info("version")? {
            None => {
                info!("Initializing store metadata: version {version}, network {network}");
                tx.execute(
                    "INSERT INTO info (key, value) VALUES (?1, ?2)",
                    ["version", version],
                )?;
                tx.execute(
                    "INSERT INTO info (key, value) VALUES (?1, ?2)",
                    ["network", network],
                )?;
            }
            Some(stored) if stored != version => {
                return Err(Error::config(format!(
                    "store was written by version {stored}, this is version {version}"
                )));
            }
            Some(_) => match read_info("network")? {
                Some(stored) if stored != network => {
                    return Err(Error::config(format!(
                        "store holds network {stored}, configured network is {network}"
                    )));
                }
                Some(_) => {}
                None => {
                    return Err(Error::config(
                        "store has a version but no network metadata",
                    ));
                }
            },
        }

        Ok(())
    }

    /// Execute a function within a transaction, committing on success and
    /// rolling back on error.
    pub fn with_transaction<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }

    /// Insert one block row.
    pub fn insert_block(
        tx: &Transaction,
        height: i64,
        block_id: &BlockHash,
        header: &[u8],
    ) -> Result<()> {
        tx.execute(
            "INSERT INTO blocks (height, blockid, header) VALUES (?1, ?2, ?3)",
            rusqlite::params![height, block_id.to_string(), header],
        )?;
        Ok(())
    }

    /// Insert one confirmed transaction row.
    pub fn insert_confirmed_tx(
        tx: &Transaction,
        txid: &Txid,
        height: i64,
        raw: &[u8],
    ) -> Result<()> {
        tx.execute(
            "INSERT INTO transactions (txid, height, tx) VALUES (?1, ?2, ?3)",
            rusqlite::params![txid.to_string(), height, raw],
        )?;
        Ok(())
    }

    /// Insert one mempool transaction row.
    pub fn insert_mempool_tx(tx: &Transaction, txid: &Txid, raw: &[u8]) -> Result<()> {
        tx.execute(
            "INSERT INTO transactions_mempool (txid, tx) VALUES (?1, ?2)",
            rusqlite::params![txid.to_string(), raw],
        )?;
        Ok(())
    }

    /// Delete every block, confirmed transaction and history row with
    /// height >= `height`.
    pub fn rollback_from(tx: &Transaction, height: i64) -> Result<()> {
        tx.execute("DELETE FROM blocks WHERE height >= ?1", [height])?;
        tx.execute("DELETE FROM transactions WHERE height >= ?1", [height])?;
        tx.execute("DELETE FROM history WHERE height >= ?1", [height])?;
        Ok(())
    }

    /// Empty both mempool tables. Run once per cycle before the first
    /// rollback or import step, since a changed confirmed history
    /// invalidates prior mempool state.
    pub fn truncate_mempool(tx: &Transaction) -> Result<()> {
        tx.execute("DELETE FROM transactions_mempool", [])?;
        tx.execute("DELETE FROM history_mempool", [])?;
        Ok(())
    }

    /// Txids currently stored in the mempool table.
    pub fn mempool_txids(&self) -> Result<HashSet<Txid>> {
        let mut statement = self.conn.prepare("SELECT txid FROM transactions_mempool")?;
        let ids: Vec<String> = statement
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids.iter()
            .map(|id| {
                Txid::from_str(id).map_err(|e| Error::import(format!("bad stored txid {id}: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;

    fn create_test_db() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.initialize("1", "regtest").unwrap();
        db
    }

    fn table_count(db: &Database, table: &str) -> i64 {
        db.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .unwrap()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut db = create_test_db();
        db.initialize("1", "regtest").unwrap();
        assert_eq!(table_count(&db, "info"), 2);
    }

    #[test]
    fn test_initialize_rejects_version_mismatch() {
        let mut db = create_test_db();
        let err = db.initialize("2", "regtest").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_initialize_rejects_network_mismatch() {
        let mut db = create_test_db();
        let err = db.initialize("1", "mainnet").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_initialize_on_disk() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let mut db = Database::new(temp_file.path()).unwrap();
        db.initialize("1", "regtest").unwrap();
        assert_eq!(table_count(&db, "blocks"), 0);
    }

    #[test]
    fn test_interrupted_first_run_leaves_store_pristine() {
        let mut db = Database::open_in_memory().unwrap();
        let tx = db.conn.transaction().unwrap();
        Database::initialize_in_tx(&tx, "1", "regtest").unwrap();
        // A crash before commit rolls everything back, schema included:
        // no half-written metadata can survive to wedge later startups.
        tx.rollback().unwrap();
        let info: std::result::Result<i64, _> =
            db.conn
                .query_row("SELECT COUNT(*) FROM info", [], |row| row.get(0));
        assert!(info.is_err());

        // A clean retry then initializes fully.
        db.initialize("1", "regtest").unwrap();
        assert_eq!(table_count(&db, "info"), 2);
    }

    #[test]
    fn test_transaction_rollback_on_error() {
        let mut db = create_test_db();
        let result = db.with_transaction(|tx| -> Result<()> {
            Database::insert_block(tx, 0, &BlockHash::all_zeros(), &[0u8; 80])?;
            Err(Error::import("forced failure"))
        });
        assert!(result.is_err());
        assert_eq!(table_count(&db, "blocks"), 0);
    }

    #[test]
    fn test_rollback_from_height() {
        let mut db = create_test_db();
        db.with_transaction(|tx| {
            for height in 0..3i64 {
                let id = BlockHash::from_byte_array([height as u8 + 1; 32]);
                Database::insert_block(tx, height, &id, &[0u8; 80])?;
                let txid = Txid::from_byte_array([height as u8 + 10; 32]);
                Database::insert_confirmed_tx(tx, &txid, height, &[1, 2, 3])?;
            }
            Database::insert_mempool_tx(tx, &Txid::all_zeros(), &[4, 5])?;
            Ok(())
        })
        .unwrap();

        db.with_transaction(|tx| {
            Database::truncate_mempool(tx)?;
            Database::rollback_from(tx, 1)
        })
        .unwrap();

        assert_eq!(table_count(&db, "blocks"), 1);
        assert_eq!(table_count(&db, "transactions"), 1);
        assert_eq!(table_count(&db, "transactions_mempool"), 0);
    }

    #[test]
    fn test_mempool_txids_round_trip() {
        let mut db = create_test_db();
        let txid = Txid::from_byte_array([7; 32]);
        db.with_transaction(|tx| Database::insert_mempool_tx(tx, &txid, &[9]))
            .unwrap();
        let ids = db.mempool_txids().unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(&txid));
    }
}
