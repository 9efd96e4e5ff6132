//! Benchmark configuration

/// Node sizing used for a benchmark tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeShape {
    /// Page-filling nodes (31 records per leaf, 248 entries per internal node)
    Wide,
    /// Tiny nodes, so the same data builds a much taller tree
    Narrow,
}

impl TreeShape {
    pub fn leaf_capacity(&self) -> usize {
        match self {
            TreeShape::Wide => bptdb::LEAF_CAPACITY,
            TreeShape::Narrow => 4,
        }
    }

    pub fn internal_capacity(&self) -> usize {
        match self {
            TreeShape::Wide => bptdb::INTERNAL_CAPACITY,
            TreeShape::Narrow => 4,
        }
    }
}

impl std::fmt::Display for TreeShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeShape::Wide => write!(f, "wide"),
            TreeShape::Narrow => write!(f, "narrow"),
        }
    }
}

/// Configuration for benchmark runs
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Record counts to benchmark
    pub record_counts: Vec<usize>,
    /// Shapes to run each benchmark with
    pub shapes: Vec<TreeShape>,
    /// Whether page writes are synced; off by default so runs measure the tree
    pub sync_writes: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            record_counts: vec![100, 1_000, 10_000],
            shapes: vec![TreeShape::Wide, TreeShape::Narrow],
            sync_writes: false,
        }
    }
}

impl BenchmarkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quick config with smaller record counts for fast testing
    pub fn quick() -> Self {
        Self {
            record_counts: vec![100, 1_000],
            ..Default::default()
        }
    }
}
