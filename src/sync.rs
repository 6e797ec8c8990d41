//! Chain synchronization engine.
//!
//! The engine converges the local mirror on the remote chain tip one step
//! at a time: each step is a single rollback batch, a single block import,
//! or one mempool reconciliation, committed in its own database
//! transaction. The tip is reloaded from the store before every decision,
//! so a crash between steps leaves the mirror valid and resumable.

use std::thread;
use std::time::Duration;

use bitcoin::consensus;
use bitcoin::{Transaction, Txid};
use log::{debug, error, info};

use crate::codec;
use crate::database::Database;
use crate::error::Result;
use crate::node::Node;
use crate::state::ChainTip;

/// Downstream consumer of imported transactions.
///
/// Called inside the step's database transaction for every transaction
/// written to the store, e.g. an address-history extractor. `height` is
/// `None` for mempool entries. The core registers no hooks by default.
pub trait ImportHook {
    fn transaction_imported(
        &mut self,
        db_tx: &rusqlite::Transaction,
        tx: &Transaction,
        height: Option<i64>,
    ) -> Result<()>;
}

/// Drives the mirror towards the remote chain tip.
pub struct Syncer<N> {
    node: N,
    db: Database,
    tip: ChainTip,
    hooks: Vec<Box<dyn ImportHook>>,
}

impl<N: Node> Syncer<N> {
    pub fn new(node: N, db: Database) -> Result<Self> {
        let tip = ChainTip::load(&db)?;
        info!("Local tip at {}H: {}", tip.height, tip.block_id);
        Ok(Self {
            node,
            db,
            tip,
            hooks: Vec::new(),
        })
    }

    /// Register a consumer of imported transactions.
    pub fn register_hook(&mut self, hook: Box<dyn ImportHook>) {
        self.hooks.push(hook);
    }

    pub fn tip(&self) -> ChainTip {
        self.tip
    }

    /// Run one polling cycle to convergence.
    ///
    /// Loops over discrete steps until the local tip matches the remote
    /// tip, then reconciles the mempool and returns. The remote tip is
    /// re-read before every step.
    pub fn catch_up(&mut self) -> Result<()> {
        self.tip = ChainTip::load(&self.db)?;
        let mut mempool_truncated = false;

        loop {
            let remote_height = self.node.tip_height()? as i64;
            let remote_id = self.node.block_id_at(remote_height as u64)?;

            if self.tip.height == remote_height && self.tip.block_id == remote_id {
                return self.reconcile_mempool();
            }

            if self.tip.height >= remote_height {
                // The local chain is at least as tall as the remote tip,
                // yet the tips differ: a fork has been mined over our view.
                self.rollback_step(&mut mempool_truncated)?;
            } else {
                self.import_block(self.tip.height + 1, &mut mempool_truncated)?;
            }

            self.tip = ChainTip::load(&self.db)?;
        }
    }

    /// Remove the local tip block and everything above it.
    fn rollback_step(&mut self, mempool_truncated: &mut bool) -> Result<()> {
        let height = self.tip.height;
        info!("Reorg: removing rows from {}H upwards", height);
        self.db.with_transaction(|tx| {
            if !*mempool_truncated {
                Database::truncate_mempool(tx)?;
            }
            Database::rollback_from(tx, height)
        })?;
        *mempool_truncated = true;
        Ok(())
    }

    /// Fetch the remote block at `height` and persist it with all its
    /// transactions in one step transaction.
    fn import_block(&mut self, height: i64, mempool_truncated: &mut bool) -> Result<()> {
        let block_id = self.node.block_id_at(height as u64)?;
        let block = self.node.block(&block_id)?;
        info!("Import block {}H: {}", height, block_id);

        let header = codec::encode_header(&block.header);
        let hooks = &mut self.hooks;
        self.db.with_transaction(|db_tx| {
            if !*mempool_truncated {
                Database::truncate_mempool(db_tx)?;
            }
            Database::insert_block(db_tx, height, &block_id, &header)?;
            for tx in &block.txdata {
                let raw = consensus::serialize(tx);
                Database::insert_confirmed_tx(db_tx, &tx.compute_txid(), height, &raw)?;
                for hook in hooks.iter_mut() {
                    hook.transaction_imported(db_tx, tx, Some(height))?;
                }
            }
            Ok(())
        })?;
        *mempool_truncated = true;
        Ok(())
    }

    /// Insert mempool transactions the remote node has and we do not.
    ///
    /// Entries that vanished from the remote pool are left in place: mined
    /// ones are handled by the truncate that precedes the next rollback or
    /// import, and eviction is not reconciled separately.
    fn reconcile_mempool(&mut self) -> Result<()> {
        let remote = self.node.mempool_txids()?;
        let local = self.db.mempool_txids()?;
        let new: Vec<Txid> = remote.difference(&local).copied().collect();
        if new.is_empty() {
            return Ok(());
        }
        debug!("Mempool: fetching {} new transactions", new.len());

        let mut fetched = Vec::with_capacity(new.len());
        for txid in new {
            fetched.push(self.node.raw_transaction(&txid)?);
        }

        let hooks = &mut self.hooks;
        self.db.with_transaction(|db_tx| {
            for tx in &fetched {
                let raw = consensus::serialize(tx);
                Database::insert_mempool_tx(db_tx, &tx.compute_txid(), &raw)?;
                for hook in hooks.iter_mut() {
                    hook.transaction_imported(db_tx, tx, None)?;
                }
            }
            Ok(())
        })
    }

    /// Poll forever.
    ///
    /// A failed cycle is logged and retried after the fixed interval; any
    /// partially done step was already rolled back, and the next cycle
    /// re-reads both tips from scratch. Only fatal errors surface.
    pub fn run(&mut self, interval: Duration) -> Result<()> {
        loop {
            match self.catch_up() {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => error!("Sync cycle failed, will retry: {e}"),
            }
            thread::sleep(interval);
        }
    }
}
