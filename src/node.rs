//! Remote node query interface.

use std::collections::HashSet;

use bitcoin::{Block, BlockHash, Transaction, Txid};
use bitcoincore_rpc::RpcApi;

use crate::error::Result;

/// The queries the sync engine needs from the remote node.
///
/// Every call may fail transiently; the sync driver abandons the cycle and
/// retries after the polling interval.
pub trait Node {
    /// Height of the remote chain tip.
    fn tip_height(&self) -> Result<u64>;

    /// Block id of the canonical block at `height`.
    fn block_id_at(&self, height: u64) -> Result<BlockHash>;

    /// Full block by id.
    fn block(&self, id: &BlockHash) -> Result<Block>;

    /// Raw transaction by id.
    fn raw_transaction(&self, txid: &Txid) -> Result<Transaction>;

    /// Current set of unconfirmed transaction ids.
    fn mempool_txids(&self) -> Result<HashSet<Txid>>;
}

impl Node for bitcoincore_rpc::Client {
    fn tip_height(&self) -> Result<u64> {
        Ok(self.get_block_count()?)
    }

    fn block_id_at(&self, height: u64) -> Result<BlockHash> {
        Ok(self.get_block_hash(height)?)
    }

    fn block(&self, id: &BlockHash) -> Result<Block> {
        Ok(self.get_block(id)?)
    }

    fn raw_transaction(&self, txid: &Txid) -> Result<Transaction> {
        Ok(self.get_raw_transaction(txid, None)?)
    }

    fn mempool_txids(&self) -> Result<HashSet<Txid>> {
        Ok(self.get_raw_mempool()?.into_iter().collect())
    }
}
