use bptdb::{BPlusTree, IntegrityReport, StoreResult, Value};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::{env, fs};

/// Runs `test` against a fresh context from `before`, always calling `after`.
///
/// Errors from any phase fail the test with the phase named in the message.
pub fn run_test<B, T, A>(before: B, test: T, after: A)
where
    B: FnOnce() -> StoreResult<TestContext>,
    T: FnOnce(&mut TestContext) -> StoreResult<()>,
    A: FnOnce(TestContext) -> StoreResult<()>,
{
    let mut ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let test_result = test(&mut ctx);
    let after_result = after(ctx);

    if let Err(e) = test_result {
        panic!("Test failed: {:?}", e);
    }
    if let Err(e) = after_result {
        panic!("After run failed: {:?}", e);
    }
}

pub struct TestContext {
    path: PathBuf,
    tree: BPlusTree,
}

impl TestContext {
    pub fn new(path: PathBuf, tree: BPlusTree) -> Self {
        Self { path, tree }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tree(&mut self) -> &mut BPlusTree {
        &mut self.tree
    }

    /// Closes the tree and opens the same file again.
    pub fn reopen(self) -> StoreResult<TestContext> {
        let TestContext { path, tree } = self;
        tree.close()?;
        let tree = BPlusTree::with_config().sync_writes(false).open(&path)?;
        Ok(TestContext::new(path, tree))
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("bptdb-{}.db", id))
}

/// A tree with the default page-filling capacities.
pub fn create_test_context() -> StoreResult<TestContext> {
    let path = random_path();
    let tree = BPlusTree::with_config().sync_writes(false).open(&path)?;
    Ok(TestContext::new(path, tree))
}

/// A tree with tiny nodes, so a few dozen keys build several levels.
pub fn create_small_test_context(leaf: usize, internal: usize) -> StoreResult<TestContext> {
    let path = random_path();
    let tree = BPlusTree::with_config()
        .leaf_capacity(leaf)
        .internal_capacity(internal)
        .internal_reservation(64)
        .sync_writes(false)
        .open(&path)?;
    Ok(TestContext::new(path, tree))
}

pub fn cleanup(ctx: TestContext) -> StoreResult<()> {
    let TestContext { path, tree } = ctx;
    tree.close()?;
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}

/// Deterministic value for `key`, so round trips can be checked without
/// keeping a copy of every value.
pub fn value_for(key: i64) -> Value {
    Value::new(format!("value-{}", key).as_bytes()).unwrap_or_else(|_| Value::zeroed())
}

/// `keys` shuffled with a fixed seed.
pub fn shuffled(keys: impl IntoIterator<Item = i64>, seed: u64) -> Vec<i64> {
    let mut keys: Vec<i64> = keys.into_iter().collect();
    let mut rng = StdRng::seed_from_u64(seed);
    keys.shuffle(&mut rng);
    keys
}

/// Every key in the tree, via a full-range scan.
pub fn all_keys(tree: &BPlusTree) -> StoreResult<Vec<i64>> {
    Ok(tree
        .find_range(i64::MIN, i64::MAX)?
        .into_iter()
        .map(|entry| entry.key)
        .collect())
}

/// Runs the integrity check and fails the test on any finding.
pub fn assert_integrity(tree: &BPlusTree) -> StoreResult<IntegrityReport> {
    let report = tree.check_integrity()?;
    assert!(report.is_valid, "integrity errors: {:#?}", report.errors);
    Ok(report)
}
