//! A peer in the mesh. Each node owns its chain, its mempool and one
//! miner, and talks to peers only through [`PeerAddress`] values resolved
//! by a [`Connector`] at call time.
//!
//! Lock order is chain, then mempool. No lock is held across a remote call.

mod http;
mod listener;
mod local;
mod mempool;
mod remote;
mod search;

pub use http::{HttpConnector, HttpPeer};
pub use listener::{LogListener, NodeListener};
pub use local::LocalNetwork;
pub use mempool::Mempool;
pub use remote::{Connector, PeerAddress, RemoteNode};
pub use search::SearchCache;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

use log::{debug, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::blockchain::{Block, Blockchain};
use crate::crypto::ZERO_HASH;
use crate::error::{ChainError, MiningError, NodeError};
use crate::miner::{Miner, MinerHandle, MiningOutcome};
use crate::settlement::{NoSettlement, Settlement};
use crate::storage::ChainStore;
use crate::transaction::Transaction;

pub const DEFAULT_SEARCH_TTL: u32 = 3;
pub const DEFAULT_SEARCH_CACHE: usize = 1024;

/// What a node did with a block it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockDisposition {
    /// Linked onto the tip (or seeded an empty node) and relayed.
    Appended,
    /// Same id and hash as the tip; side effects re-applied, not relayed.
    AlreadySeen,
    /// At or below the tip height with a different hash.
    Stale,
    /// Does not link onto the tip.
    Orphan,
    /// Linked but failed validation.
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeStats {
    pub address: PeerAddress,
    pub peers: usize,
    pub chain_length: usize,
    pub tip: Option<u64>,
    pub difficulty: Option<u32>,
    pub pending_transactions: usize,
    pub mining: bool,
}

pub struct PeerNode {
    address: PeerAddress,
    peers: RwLock<Vec<PeerAddress>>,
    chain: Mutex<Option<Blockchain>>,
    store: Option<ChainStore>,
    mempool: Mempool,
    directory: RwLock<HashMap<String, String>>,
    searches: SearchCache,
    search_ttl: u32,
    miner: MinerHandle,
    connector: Arc<dyn Connector>,
    settlement: Arc<dyn Settlement>,
    listener: Arc<dyn NodeListener>,
}

pub struct PeerNodeBuilder {
    address: PeerAddress,
    connector: Arc<dyn Connector>,
    store: Option<ChainStore>,
    settlement: Arc<dyn Settlement>,
    listener: Arc<dyn NodeListener>,
    miner: Miner,
    search_ttl: u32,
    search_cache: usize,
}

impl PeerNodeBuilder {
    pub fn store(mut self, store: ChainStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn settlement(mut self, settlement: Arc<dyn Settlement>) -> Self {
        self.settlement = settlement;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn NodeListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn miner(mut self, miner: Miner) -> Self {
        self.miner = miner;
        self
    }

    pub fn search(mut self, ttl: u32, cache_size: usize) -> Self {
        self.search_ttl = ttl;
        self.search_cache = cache_size;
        self
    }

    /// Build the node, loading (and settling) any chain already in the store.
    pub fn build(self) -> Result<PeerNode, NodeError> {
        let chain = match &self.store {
            Some(store) => Blockchain::load(store.clone())?,
            None => None,
        };

        let node = PeerNode {
            address: self.address,
            peers: RwLock::new(Vec::new()),
            chain: Mutex::new(None),
            store: self.store,
            mempool: Mempool::new(),
            directory: RwLock::new(HashMap::new()),
            searches: SearchCache::new(self.search_cache),
            search_ttl: self.search_ttl,
            miner: MinerHandle::new(self.miner),
            connector: self.connector,
            settlement: self.settlement,
            listener: self.listener,
        };

        if let Some(bc) = chain {
            info!("NODE - loaded {} blocks from store", bc.len());
            for block in &bc.chain {
                node.apply_settlement(block);
            }
            *node.chain.lock().expect("mutex poisoned") = Some(bc);
        }
        Ok(node)
    }
}

impl PeerNode {
    pub fn builder(address: impl Into<PeerAddress>, connector: Arc<dyn Connector>) -> PeerNodeBuilder {
        PeerNodeBuilder {
            address: address.into(),
            connector,
            store: None,
            settlement: Arc::new(NoSettlement),
            listener: Arc::new(LogListener),
            miner: Miner::default(),
            search_ttl: DEFAULT_SEARCH_TTL,
            search_cache: DEFAULT_SEARCH_CACHE,
        }
    }

    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    pub fn listener(&self) -> &Arc<dyn NodeListener> {
        &self.listener
    }

    /// Snapshot of the known peers.
    pub fn peers(&self) -> Vec<PeerAddress> {
        self.peers.read().expect("rwlock poisoned").clone()
    }

    pub fn knows(&self, peer: &PeerAddress) -> bool {
        self.peers.read().expect("rwlock poisoned").contains(peer)
    }

    /* ---------- chain access ---------- */

    /// Mine and install a genesis block when this node has no chain yet.
    /// Returns false if a chain already exists.
    pub fn init_genesis(
        &self,
        difficulty: u32,
        transactions: Vec<Transaction>,
    ) -> Result<bool, NodeError> {
        if self.chain_tip().is_some() {
            return Ok(false);
        }
        let mut genesis = Block::genesis(difficulty, transactions);
        self.listener
            .on_start_mining(&genesis.header_text(), difficulty);
        let nonce = genesis.mine(self.miner.miner())?;
        self.listener.on_nonce_found(nonce);

        let mut guard = self.chain.lock().expect("mutex poisoned");
        if guard.is_some() {
            return Ok(false);
        }
        let bc = Blockchain::new(genesis, self.store.clone())?;
        self.apply_settlement(&bc.chain[0]);
        self.listener.on_block(&bc.chain[0]);
        *guard = Some(bc);
        Ok(true)
    }

    /// Id of the last block, `None` without a chain.
    pub fn chain_tip(&self) -> Option<u64> {
        self.with_chain(|bc| bc.last_block().id)
    }

    /// Run `f` against the local chain while holding the chain lock.
    pub fn with_chain<R>(&self, f: impl FnOnce(&Blockchain) -> R) -> Option<R> {
        self.chain.lock().expect("mutex poisoned").as_ref().map(f)
    }

    pub fn exists_transaction(&self, signature: &str) -> bool {
        self.with_chain(|bc| bc.exists_transaction(signature))
            .unwrap_or(false)
    }

    /// Bulk payload carrying the whole chain, `None` without a chain.
    pub fn chain_archive(&self) -> Result<Option<Vec<u8>>, NodeError> {
        let guard = self.chain.lock().expect("mutex poisoned");
        let Some(bc) = guard.as_ref() else {
            return Ok(None);
        };
        if let Some(bytes) = bc.store().map(ChainStore::export_archive).transpose()?.flatten() {
            return Ok(Some(bytes));
        }
        Ok(Some(serde_json::to_vec(&bc.chain)?))
    }

    pub fn stats(&self) -> NodeStats {
        let (chain_length, tip, difficulty) = self
            .with_chain(|bc| (bc.len(), Some(bc.last_block().id), Some(bc.difficulty())))
            .unwrap_or((0, None, None));
        NodeStats {
            address: self.address.clone(),
            peers: self.peers.read().expect("rwlock poisoned").len(),
            chain_length,
            tip,
            difficulty,
            pending_transactions: self.mempool.len(),
            mining: self.miner.is_mining(),
        }
    }

    /* ---------- membership ---------- */

    /// Connect to `peer`: merge its pending transactions, adopt its chain if
    /// longer, ask it to connect back and introduce it to every known peer.
    /// Self and already-known peers are ignored.
    pub fn add_node(&self, peer: &PeerAddress) -> Result<(), NodeError> {
        if *peer == self.address || self.knows(peer) {
            return Ok(());
        }
        let remote = self.connector.connect(peer)?;
        let pending = remote.transactions()?;

        {
            let mut peers = self.peers.write().expect("rwlock poisoned");
            if peers.contains(peer) {
                return Ok(());
            }
            peers.push(peer.clone());
        }

        let mut merged = 0;
        for tx in pending {
            if tx.verify().is_ok()
                && !self.exists_transaction(&tx.signature)
                && self.mempool.insert(tx)
            {
                merged += 1;
            }
        }
        debug!("NODE - merged {merged} pending txs from {peer}");

        if let Err(e) = self.resync_from(peer, remote.as_ref()) {
            self.listener.on_exception(&e, "chain sync");
        }
        if let Err(e) = remote.add_node(&self.address) {
            warn!("NODE - {peer} did not connect back: {e}");
        }
        for other in self.peers() {
            if other == *peer {
                continue;
            }
            if let Err(e) = self.connector.connect(&other).and_then(|r| r.add_node(peer)) {
                warn!("NODE - introducing {peer} to {other} failed: {e}");
            }
        }

        self.listener.on_connect(peer);
        Ok(())
    }

    /// Adopt the remote chain if its tip is ahead of ours (or we have none).
    fn resync_from(&self, peer: &PeerAddress, remote: &dyn RemoteNode) -> Result<bool, NodeError> {
        let Some(remote_tip) = remote.chain_tip()? else {
            return Ok(false);
        };
        if self.chain_tip().is_some_and(|tip| tip >= remote_tip) {
            return Ok(false);
        }
        let Some(archive) = remote.chain_archive()? else {
            return Ok(false);
        };
        self.adopt_archive(peer, &archive)
    }

    /// Replace the local chain with the one carried by `archive` when it is
    /// valid and strictly longer. The store is rewritten before the swap,
    /// settlement is rebuilt from the new genesis and transactions that
    /// only lived in abandoned blocks go back to the mempool.
    pub fn adopt_archive(&self, from: &PeerAddress, archive: &[u8]) -> Result<bool, NodeError> {
        let blocks: Vec<Block> = serde_json::from_slice(archive)?;
        let candidate = Blockchain::from_blocks(blocks, self.store.clone())?;

        let length = {
            let mut guard = self.chain.lock().expect("mutex poisoned");
            if guard.as_ref().is_some_and(|bc| bc.len() >= candidate.len()) {
                return Ok(false);
            }
            let abandoned: Vec<Transaction> = guard
                .as_ref()
                .map(|bc| {
                    bc.chain
                        .iter()
                        .flat_map(|b| b.transactions())
                        .filter(|tx| !candidate.exists_transaction(&tx.signature))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            if let Some(store) = &self.store {
                store.import_archive(archive)?;
            }
            self.settlement.reset();
            for block in &candidate.chain {
                self.apply_settlement(block);
            }
            let length = candidate.len();
            match guard.as_mut() {
                Some(bc) => bc.replace_with(candidate),
                None => *guard = Some(candidate),
            }

            let mut requeued = 0;
            for tx in abandoned {
                if self.mempool.insert(tx) {
                    requeued += 1;
                }
            }
            if requeued > 0 {
                info!("NODE - {requeued} txs from abandoned blocks back in the mempool");
            }
            length
        };

        self.listener.on_chain_synced(length, from);
        Ok(true)
    }

    /* ---------- identity directory ---------- */

    pub fn register_identity(&self, name: &str, value: &str) {
        self.directory
            .write()
            .expect("rwlock poisoned")
            .insert(name.to_string(), value.to_string());
    }

    pub fn lookup_local(&self, name: &str) -> Option<String> {
        self.directory
            .read()
            .expect("rwlock poisoned")
            .get(name)
            .cloned()
    }

    /// Resolve `name` here or anywhere within the configured hop limit.
    pub fn search(&self, name: &str) -> Option<String> {
        if let Some(value) = self.lookup_local(name) {
            return Some(value);
        }
        let search_id = Uuid::new_v4().to_string();
        self.find_remote(name, &search_id, self.search_ttl)
    }

    /// One flood-fill step. Each node answers a given `search_id` at most
    /// once, and `ttl` bounds the hop count.
    pub fn find_remote(&self, name: &str, search_id: &str, ttl: u32) -> Option<String> {
        if ttl == 0 || !self.searches.insert(search_id) {
            return None;
        }
        if let Some(value) = self.lookup_local(name) {
            return Some(value);
        }
        for peer in self.peers() {
            match self
                .connector
                .connect(&peer)
                .and_then(|r| r.find_remote(name, search_id, ttl - 1))
            {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => warn!("NODE - search via {peer} failed: {e}"),
            }
        }
        None
    }

    /* ---------- transactions ---------- */

    /// Accept a transaction into the mempool and forward it to every peer.
    /// Returns false for a transaction already pending here.
    pub fn add_transaction(&self, tx: Transaction) -> Result<bool, NodeError> {
        if self.mempool.contains(&tx.signature) {
            return Ok(false);
        }
        tx.verify()?;
        if self.exists_transaction(&tx.signature) {
            return Err(NodeError::Replay);
        }
        if !self.mempool.insert(tx.clone()) {
            return Ok(false);
        }

        for peer in self.peers() {
            if let Err(e) = self
                .connector
                .connect(&peer)
                .and_then(|r| r.add_transaction(&tx))
            {
                warn!("NODE - forwarding tx {} to {peer} failed: {e}", tx.txid());
            }
        }
        self.listener.on_transaction(&tx);
        Ok(true)
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.mempool.snapshot()
    }

    /* ---------- blocks ---------- */

    /// Handle a serialized block from the network. A block newer than the
    /// tip preempts local mining; an appended block is relayed to every
    /// peer from a background thread.
    pub fn propagate_block(&self, bytes: &[u8]) -> Result<BlockDisposition, NodeError> {
        let block: Block = match serde_json::from_slice(bytes) {
            Ok(block) => block,
            Err(e) => {
                warn!("NODE - undecodable block discarded: {e}");
                return Err(e.into());
            }
        };

        if self.miner.is_mining() && self.chain_tip().is_none_or(|tip| block.id > tip) {
            self.stop_mining(block.nonce);
        }

        let disposition = match self.receive_block(block) {
            Ok(disposition) => disposition,
            Err(e) => {
                self.listener.on_exception(&e, "block append");
                return Err(e);
            }
        };
        debug!("NODE - incoming block: {disposition:?}");
        if disposition == BlockDisposition::Appended {
            self.broadcast_block(bytes.to_vec());
        }
        Ok(disposition)
    }

    fn receive_block(&self, block: Block) -> Result<BlockDisposition, NodeError> {
        let mut guard = self.chain.lock().expect("mutex poisoned");

        let disposition = if let Some(bc) = guard.as_mut() {
            Self::link(bc, &block)?
        } else if block.id == 0 && block.previous_hash == ZERO_HASH {
            match Blockchain::new(block.clone(), self.store.clone()) {
                Ok(bc) => {
                    *guard = Some(bc);
                    BlockDisposition::Appended
                }
                Err(ChainError::Storage(e)) => return Err(NodeError::Storage(e)),
                Err(e) => {
                    warn!("NODE - genesis rejected: {e}");
                    BlockDisposition::Rejected
                }
            }
        } else {
            BlockDisposition::Orphan
        };

        if matches!(
            disposition,
            BlockDisposition::Appended | BlockDisposition::AlreadySeen
        ) {
            self.apply_settlement(&block);
            self.listener.on_block(&block);
        }
        Ok(disposition)
    }

    fn link(bc: &mut Blockchain, block: &Block) -> Result<BlockDisposition, NodeError> {
        let tip = bc.last_block();
        if block.id == tip.id && block.current_hash == tip.current_hash {
            return Ok(BlockDisposition::AlreadySeen);
        }
        if block.id <= tip.id {
            return Ok(BlockDisposition::Stale);
        }
        if tip.current_hash != Some(block.previous_hash) {
            return Ok(BlockDisposition::Orphan);
        }
        match bc.add_block(block.clone()) {
            Ok(()) => Ok(BlockDisposition::Appended),
            Err(ChainError::Storage(e)) => Err(NodeError::Storage(e)),
            Err(e) => {
                warn!("NODE - block #{} rejected: {e}", block.id);
                Ok(BlockDisposition::Rejected)
            }
        }
    }

    fn broadcast_block(&self, bytes: Vec<u8>) {
        let peers = self.peers();
        if peers.is_empty() {
            return;
        }
        let connector = Arc::clone(&self.connector);
        thread::spawn(move || {
            for peer in peers {
                if let Err(e) = connector
                    .connect(&peer)
                    .and_then(|r| r.propagate_block(&bytes))
                {
                    warn!("NODE - relaying block to {peer} failed: {e}");
                }
            }
        });
    }

    fn apply_settlement(&self, block: &Block) {
        if let Err(e) = self.settlement.apply_block(block) {
            self.listener.on_exception(&e, "settlement");
        }
        self.mempool.remove_settled(block.transactions());
    }

    /// Mine the pending transactions into a block on the current tip,
    /// append it and relay it. No lock is held while mining.
    pub fn mine_block(&self) -> Result<Block, NodeError> {
        let pending = self.mempool.snapshot();
        let mut block = {
            let guard = self.chain.lock().expect("mutex poisoned");
            let bc = guard.as_ref().ok_or(NodeError::NoChain)?;
            let txs: Vec<Transaction> = pending
                .into_iter()
                .filter(|tx| tx.verify().is_ok() && !bc.exists_transaction(&tx.signature))
                .collect();
            let last = bc.last_block();
            Block::new(
                last.id + 1,
                last.current_hash.unwrap_or(ZERO_HASH),
                last.difficulty,
                txs,
            )
        };

        let message = block.header_text();
        self.listener.on_start_mining(&message, block.difficulty);
        match self.miner.run(&message, block.difficulty) {
            Some(MiningOutcome::Solved(nonce)) => {
                self.listener.on_nonce_found(nonce);
                block.set_nonce(nonce);
            }
            Some(MiningOutcome::Stopped(nonce)) => return Err(MiningError::Stopped(nonce).into()),
            Some(MiningOutcome::Exhausted) => return Err(MiningError::Exhausted.into()),
            None => return Err(MiningError::Busy.into()),
        }

        let bytes = serde_json::to_vec(&block)?;
        {
            let mut guard = self.chain.lock().expect("mutex poisoned");
            let bc = guard.as_mut().ok_or(NodeError::NoChain)?;
            bc.add_block(block.clone())?;
            self.apply_settlement(&block);
            self.listener.on_block(&block);
        }
        info!(
            "NODE - mined block #{} ({} txs)",
            block.id,
            block.transactions().len()
        );
        self.broadcast_block(bytes);
        Ok(block)
    }

    /* ---------- raw mining service ---------- */

    /// Search a nonce for an arbitrary message. `None` if busy or exhausted;
    /// a stopped session reports the stop value.
    pub fn mine(&self, message: &str, difficulty: u32) -> Option<u64> {
        self.listener.on_start_mining(message, difficulty);
        match self.miner.run(message, difficulty)? {
            MiningOutcome::Solved(nonce) => {
                self.listener.on_nonce_found(nonce);
                Some(nonce)
            }
            MiningOutcome::Stopped(nonce) => Some(nonce),
            MiningOutcome::Exhausted => None,
        }
    }

    pub fn stop_mining(&self, nonce: u64) {
        if self.miner.stop(nonce) {
            self.listener.on_stop_mining(nonce);
        }
    }

    pub fn is_mining(&self) -> bool {
        self.miner.is_mining()
    }

    pub fn is_winner(&self) -> bool {
        self.miner.is_winner()
    }

    pub fn nonce(&self) -> Option<u64> {
        self.miner.nonce()
    }

    pub fn hash(&self) -> Option<String> {
        self.miner.hash()
    }
}
