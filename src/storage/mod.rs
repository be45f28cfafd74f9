//! On-disk chain store: one `<id>.blk` file per block plus a
//! `blockchain.bch` summary holding the whole chain.
//!
//! Every write lands in a `.tmp` sibling first and is renamed into place,
//! so a crash mid-write leaves the previous file intact.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::blockchain::Block;
use crate::error::StorageError;

pub const CHAIN_FILE: &str = "blockchain.bch";
const BLOCK_EXT: &str = "blk";
const TMP_EXT: &str = "tmp";

#[derive(Debug, Clone)]
pub struct ChainStore {
    dir: PathBuf,
}

impl ChainStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn block_path(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{id}.{BLOCK_EXT}"))
    }

    fn chain_path(&self) -> PathBuf {
        self.dir.join(CHAIN_FILE)
    }

    pub fn save_block(&self, block: &Block) -> Result<(), StorageError> {
        write_atomic(&self.block_path(block.id), &serde_json::to_vec(block)?)
    }

    pub fn load_block(&self, id: u64) -> Result<Option<Block>, StorageError> {
        let path = self.block_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&fs::read(path)?)?))
    }

    pub fn save_chain(&self, blocks: &[Block]) -> Result<(), StorageError> {
        write_atomic(&self.chain_path(), &serde_json::to_vec(blocks)?)
    }

    /// `None` when no chain has been stored yet.
    pub fn load_chain(&self) -> Result<Option<Vec<Block>>, StorageError> {
        let path = self.chain_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&fs::read(path)?)?))
    }

    /// Bulk transfer payload for a full chain replacement.
    pub fn export_archive(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.chain_path();
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }

    /// Replace the store contents with the chain carried by `archive`.
    /// The archive is decoded before anything on disk is touched.
    pub fn import_archive(&self, archive: &[u8]) -> Result<Vec<Block>, StorageError> {
        let blocks: Vec<Block> = serde_json::from_slice(archive)?;
        self.clear()?;
        for block in &blocks {
            self.save_block(block)?;
        }
        self.save_chain(&blocks)?;
        debug!(
            "STORE - imported {} blocks into {}",
            blocks.len(),
            self.dir.display()
        );
        Ok(blocks)
    }

    /// Remove every block, summary and temp file (the directory stays).
    pub fn clear(&self) -> Result<(), StorageError> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let owned = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == BLOCK_EXT || e == TMP_EXT)
                || path.file_name().is_some_and(|n| n == CHAIN_FILE);
            if owned && path.is_file() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension(TMP_EXT);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
