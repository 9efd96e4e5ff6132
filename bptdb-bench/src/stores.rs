//! Tree factory functions for benchmarks

use bptdb::{BPlusTree, Value};
use tempfile::TempDir;

use crate::config::TreeShape;

/// Result type for benchmark setup
pub type BenchResult<T> = Result<T, Box<dyn std::error::Error>>;

/// A tree in its own temporary directory, removed on drop
pub struct BenchContext {
    tree: BPlusTree,
    _dir: TempDir,
}

impl BenchContext {
    pub fn tree(&mut self) -> &mut BPlusTree {
        &mut self.tree
    }
}

/// Create an empty tree with the given shape
pub fn create_tree(shape: TreeShape, sync_writes: bool) -> BenchResult<BenchContext> {
    let dir = tempfile::tempdir()?;
    let tree = BPlusTree::with_config()
        .leaf_capacity(shape.leaf_capacity())
        .internal_capacity(shape.internal_capacity())
        .sync_writes(sync_writes)
        .open(dir.path().join("bench.db"))?;
    log::debug!("Created {} bench tree in {:?}", shape, dir.path());
    Ok(BenchContext { tree, _dir: dir })
}

/// Create a tree pre-loaded with `records`
pub fn create_loaded_tree(
    shape: TreeShape,
    sync_writes: bool,
    records: &[(i64, Value)],
) -> BenchResult<BenchContext> {
    let mut ctx = create_tree(shape, sync_writes)?;
    for (key, value) in records {
        ctx.tree().insert(*key, *value)?;
    }
    Ok(ctx)
}
