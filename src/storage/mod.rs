//! Flat-file persistence: `blocks/<16-hex-height>` for the canonical
//! chain and `mined/<64-hex-hash>` for locally-mined nonces.
//!
//! A thin wrapper struct with `Result<_, StorageError>` on every
//! operation, backed by a directory of small files instead of an
//! embedded KV store — persistence here is one file per height, not a
//! key-value mapping.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::codec::{decode_block_bits, encode_block_bits};
use crate::core::chain::ChainStore;
use crate::core::types::{Block, Hash};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("corrupt block file {path}: {source}")]
    Decode { path: PathBuf, source: crate::codec::CodecError },
}

pub struct Storage {
    base: PathBuf,
}

fn height_filename(height: u64) -> String {
    format!("{:016x}", height)
}

fn mined_filename(hash: &Hash) -> String {
    hex::encode(hash)
}

impl Storage {
    /// Creates `<base>/blocks` and `<base>/mined` if they don't exist.
    pub fn open<P: AsRef<Path>>(base: P) -> Result<Self, StorageError> {
        let base = base.as_ref().to_path_buf();
        let blocks_dir = base.join("blocks");
        let mined_dir = base.join("mined");
        fs::create_dir_all(&blocks_dir).map_err(|e| StorageError::Io { path: blocks_dir.clone(), source: e })?;
        fs::create_dir_all(&mined_dir).map_err(|e| StorageError::Io { path: mined_dir, source: e })?;
        Ok(Storage { base })
    }

    fn blocks_dir(&self) -> PathBuf {
        self.base.join("blocks")
    }

    fn mined_dir(&self) -> PathBuf {
        self.base.join("mined")
    }

    /// Walks the current longest chain and rewrites every file. Called
    /// once per save cycle (`SAVE_PERIOD_MS`).
    pub fn save_chain(&self, chain: &ChainStore) -> Result<(), StorageError> {
        for (height, hash) in chain.get_longest_chain().iter().enumerate() {
            let block = chain.get_block(hash).expect("hash from get_longest_chain is always admitted");
            let path = self.blocks_dir().join(height_filename(height as u64));
            fs::write(&path, encode_block_bits(block)).map_err(|e| StorageError::Io { path, source: e })?;
        }
        Ok(())
    }

    pub fn save_mined(&self, hash: &Hash, rand: u64) -> Result<(), StorageError> {
        let path = self.mined_dir().join(mined_filename(hash));
        fs::write(&path, format!("{:016x}", rand)).map_err(|e| StorageError::Io { path, source: e })
    }

    /// Reads `blocks/` in filename (i.e. height) order. Returns the
    /// decoded blocks for the caller to ingest one at a time via
    /// `handle_block`.
    pub fn load(&self) -> Result<Vec<Block>, StorageError> {
        let dir = self.blocks_dir();
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|e| StorageError::Io { path: dir.clone(), source: e })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();

        let mut blocks = Vec::with_capacity(entries.len());
        for path in entries {
            let bytes = fs::read(&path).map_err(|e| StorageError::Io { path: path.clone(), source: e })?;
            let block = decode_block_bits(&bytes).map_err(|e| StorageError::Decode { path, source: e })?;
            blocks.push(block);
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BlockTime;
    use primitive_types::U256;

    #[test]
    fn save_then_load_round_trips_the_genesis_only_chain() {
        let dir = std::env::temp_dir().join(format!("ubilog-storage-test-{:?}", std::thread::current().id()));
        let _ = fs::remove_dir_all(&dir);
        let storage = Storage::open(&dir).unwrap();

        let chain = ChainStore::new();
        storage.save_chain(&chain).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].is_genesis());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn save_mined_writes_a_readable_hex_nonce() {
        let dir = std::env::temp_dir().join(format!("ubilog-storage-mined-{:?}", std::thread::current().id()));
        let _ = fs::remove_dir_all(&dir);
        let storage = Storage::open(&dir).unwrap();

        let hash = [9u8; 32];
        storage.save_mined(&hash, 0xdead_beef).unwrap();
        let contents = fs::read_to_string(storage.mined_dir().join(mined_filename(&hash))).unwrap();
        assert_eq!(contents, "00000000deadbeef");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn height_filenames_sort_lexicographically_in_height_order() {
        assert!(height_filename(1) < height_filename(2));
        assert!(height_filename(9) < height_filename(10));
        let _ = BlockTime::new(0, U256::zero());
    }
}
