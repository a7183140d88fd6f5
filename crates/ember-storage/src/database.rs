//! RocksDB database wrapper.

use crate::{StorageError, StorageResult, WriteBatch};
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Named buckets for organizing chain data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Serialized blocks keyed by 8-byte big-endian height.
    Blocks,
    /// Block hash -> 8-byte height.
    BlockHashes,
    /// Address -> encoded balance.
    Balances,
    /// Address -> encoded stake record.
    Stakes,
    /// Txid -> 8-byte height.
    TxIndex,
    /// Chain metadata (`best_height`, `total_minted`).
    Meta,
    /// Default column family (required by RocksDB).
    Default,
}

impl Bucket {
    /// The on-disk name of the bucket.
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Blocks => "blocks",
            Bucket::BlockHashes => "block_hashes",
            Bucket::Balances => "balances",
            Bucket::Stakes => "stakes",
            Bucket::TxIndex => "tx_index",
            Bucket::Meta => "meta",
            Bucket::Default => "default",
        }
    }

    /// All buckets.
    pub fn all() -> &'static [Bucket] {
        &[
            Bucket::Blocks,
            Bucket::BlockHashes,
            Bucket::Balances,
            Bucket::Stakes,
            Bucket::TxIndex,
            Bucket::Meta,
            Bucket::Default,
        ]
    }
}

/// RocksDB database handle, cheap to clone.
pub struct Database {
    db: Arc<RwLock<DBWithThreadMode<MultiThreaded>>>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening database");

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(256);
        opts.set_keep_log_file_num(1);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = Bucket::all()
            .iter()
            .map(|bucket| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                ColumnFamilyDescriptor::new(bucket.name(), cf_opts)
            })
            .collect();

        let db =
            DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(&opts, path, cf_descriptors)?;
        debug!("database opened");

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    /// Read a value.
    pub fn get(&self, bucket: Bucket, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let db = self.db.read();
        let handle = db
            .cf_handle(bucket.name())
            .ok_or_else(|| StorageError::BucketNotFound(bucket.name().to_string()))?;
        Ok(db.get_cf(&handle, key)?)
    }

    /// Write a single value. Chain state goes through
    /// [`Database::write_batch`]; this exists for tests and tooling.
    pub fn put(&self, bucket: Bucket, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let db = self.db.read();
        let handle = db
            .cf_handle(bucket.name())
            .ok_or_else(|| StorageError::BucketNotFound(bucket.name().to_string()))?;
        db.put_cf(&handle, key, value)?;
        Ok(())
    }

    /// Apply a batch of writes atomically.
    pub fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        let db = self.db.read();
        let mut rocks_batch = rocksdb::WriteBatch::default();

        for op in batch.operations {
            let handle = db
                .cf_handle(op.bucket.name())
                .ok_or_else(|| StorageError::BucketNotFound(op.bucket.name().to_string()))?;
            match op.value {
                Some(value) => rocks_batch.put_cf(&handle, &op.key, &value),
                None => rocks_batch.delete_cf(&handle, &op.key),
            }
        }

        db.write(rocks_batch)?;
        Ok(())
    }

    /// Iterate a bucket in ascending key order, starting at `start`
    /// (or the first key when `start` is `None`).
    pub fn scan(
        &self,
        bucket: Bucket,
        start: Option<&[u8]>,
    ) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let db = self.db.read();
        let handle = db
            .cf_handle(bucket.name())
            .ok_or_else(|| StorageError::BucketNotFound(bucket.name().to_string()))?;

        let mode = match start {
            Some(key) => rocksdb::IteratorMode::From(key, rocksdb::Direction::Forward),
            None => rocksdb::IteratorMode::Start,
        };

        let mut entries = Vec::new();
        for item in db.iterator_cf(&handle, mode) {
            let (key, value) = item?;
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}
