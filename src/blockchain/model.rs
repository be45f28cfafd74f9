use std::collections::HashSet;

use log::{debug, info};

use super::Block;
use crate::crypto::ZERO_HASH;
use crate::error::ChainError;
use crate::miner::Miner;
use crate::storage::ChainStore;
use crate::transaction::Transaction;

/// Append-only chain of validated blocks, optionally backed by a
/// [`ChainStore`]. Never empty: it always starts from a genesis block.
#[derive(Debug)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    store: Option<ChainStore>,
}

impl Blockchain {
    /// Seed a chain with `genesis` and persist it.
    pub fn new(genesis: Block, store: Option<ChainStore>) -> Result<Self, ChainError> {
        check_genesis(&genesis)?;
        let bc = Self {
            chain: vec![genesis],
            store,
        };
        if let Some(store) = &bc.store {
            store.save_block(&bc.chain[0])?;
            store.save_chain(&bc.chain)?;
        }
        Ok(bc)
    }

    /// Rebuild a chain from a block list, enforcing every chain invariant.
    /// Nothing is written to `store`.
    pub fn from_blocks(blocks: Vec<Block>, store: Option<ChainStore>) -> Result<Self, ChainError> {
        let mut iter = blocks.into_iter();
        let genesis = iter.next().ok_or(ChainError::Empty)?;
        check_genesis(&genesis)?;

        let mut bc = Self {
            chain: vec![genesis],
            store: None,
        };
        for block in iter {
            bc.add_block(block)?;
        }
        bc.store = store;
        Ok(bc)
    }

    /// Load the chain stored in `store`, if any.
    pub fn load(store: ChainStore) -> Result<Option<Self>, ChainError> {
        match store.load_chain()? {
            Some(blocks) => Ok(Some(Self::from_blocks(blocks, Some(store))?)),
            None => Ok(None),
        }
    }

    pub fn store(&self) -> Option<&ChainStore> {
        self.store.as_ref()
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    pub fn get_block(&self, id: u64) -> Option<&Block> {
        usize::try_from(id).ok().and_then(|i| self.chain.get(i))
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Difficulty new blocks inherit from the tip.
    pub fn difficulty(&self) -> u32 {
        self.last_block().difficulty
    }

    /// Build a block on the tip with `transactions`, mine it and append it.
    pub fn add_elements(
        &mut self,
        transactions: Vec<Transaction>,
        miner: &Miner,
    ) -> Result<&Block, ChainError> {
        let last = self.last_block();
        let previous_hash = last.current_hash.unwrap_or(ZERO_HASH);
        let mut block = Block::new(last.id + 1, previous_hash, last.difficulty, transactions);
        block.mine(miner)?;
        self.add_block(block)?;
        Ok(self.last_block())
    }

    /// The validation gate for every locally mined or received block:
    /// linkage, then proof of work, then sequence, then transaction
    /// uniqueness within the block and against history. The block is kept
    /// only once it and the chain summary are persisted.
    pub fn add_block(&mut self, block: Block) -> Result<(), ChainError> {
        let last = self.last_block();

        if last.current_hash != Some(block.previous_hash) {
            return Err(ChainError::ChainMismatch);
        }
        if !block.is_valid() {
            return Err(ChainError::InvalidBlock);
        }
        let expected = self.chain.len() as u64;
        if block.id != expected {
            return Err(ChainError::Sequence {
                expected,
                got: block.id,
            });
        }
        check_unique(&block)?;
        if let Some(tx) = block
            .transactions()
            .iter()
            .find(|tx| self.exists_transaction(&tx.signature))
        {
            return Err(ChainError::DuplicateTransaction(tx.txid()));
        }

        self.chain.push(block);
        if let Some(store) = &self.store {
            let persisted = store
                .save_block(self.last_block())
                .and_then(|()| store.save_chain(&self.chain));
            if let Err(e) = persisted {
                self.chain.pop();
                return Err(e.into());
            }
        }
        debug!(
            "CHAIN - block #{} accepted ({} txs)",
            self.last_block().id,
            self.last_block().transactions().len()
        );
        Ok(())
    }

    /// Whether a transaction with `signature` is already settled in any block.
    /// Linear in chain length times block size.
    pub fn exists_transaction(&self, signature: &str) -> bool {
        self.chain.iter().any(|b| b.contains_signature(signature))
    }

    /// Validate the entire chain: genesis, linkage, hashes, PoW and
    /// transaction uniqueness.
    pub fn is_valid_chain(&self) -> bool {
        let Some(genesis) = self.chain.first() else {
            return false;
        };
        if check_genesis(genesis).is_err() {
            return false;
        }
        let mut seen = HashSet::new();
        if !self
            .chain
            .iter()
            .flat_map(|b| b.transactions())
            .all(|tx| seen.insert(tx.signature.as_str()))
        {
            return false;
        }

        for (i, pair) in self.chain.windows(2).enumerate() {
            let (prev, current) = (&pair[0], &pair[1]);
            if prev.current_hash != Some(current.previous_hash)
                || !current.is_valid()
                || current.id != (i + 1) as u64
            {
                return false;
            }
        }
        true
    }

    /// Swap in `other` wholesale (longest-chain adoption). The caller has
    /// already validated it and written it to the store.
    pub fn replace_with(&mut self, other: Blockchain) {
        info!(
            "CHAIN - replaced: {} -> {} blocks",
            self.chain.len(),
            other.chain.len()
        );
        self.chain = other.chain;
        if other.store.is_some() {
            self.store = other.store;
        }
    }
}

fn check_genesis(genesis: &Block) -> Result<(), ChainError> {
    if genesis.id != 0 {
        return Err(ChainError::Sequence {
            expected: 0,
            got: genesis.id,
        });
    }
    if genesis.previous_hash != ZERO_HASH {
        return Err(ChainError::ChainMismatch);
    }
    if !genesis.is_valid() {
        return Err(ChainError::InvalidBlock);
    }
    check_unique(genesis)
}

fn check_unique(block: &Block) -> Result<(), ChainError> {
    let mut seen = HashSet::new();
    match block
        .transactions()
        .iter()
        .find(|tx| !seen.insert(tx.signature.as_str()))
    {
        Some(tx) => Err(ChainError::DuplicateTransaction(tx.txid())),
        None => Ok(()),
    }
}
