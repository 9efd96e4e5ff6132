#[cfg(test)]
mod tests {
    use bptdb::{NodeKind, StoreResult};
    use bptdb_int_test::test_util::{
        all_keys, assert_integrity, cleanup, create_small_test_context, create_test_context,
        run_test, shuffled, value_for, TestContext,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;

    #[ctor::ctor]
    fn init() {
        colog::init();
    }

    /// Leaf and internal minimums for the given capacities.
    fn minimums(leaf: usize, internal: usize) -> (usize, usize) {
        ((leaf - 1).div_ceil(2), internal.div_ceil(2) - 1)
    }

    fn check_occupancy(ctx: &mut TestContext) -> StoreResult<()> {
        let tree = ctx.tree();
        let (leaf_min, internal_min) = minimums(tree.leaf_capacity(), tree.internal_capacity());
        for (depth, level) in tree.level_order()?.iter().enumerate() {
            for node in level {
                let (min, max) = match node.kind {
                    NodeKind::Leaf => (leaf_min, tree.leaf_capacity()),
                    NodeKind::Internal => (internal_min, tree.internal_capacity()),
                };
                assert!(node.keys.len() <= max, "page {} overfull", node.page);
                if depth > 0 {
                    assert!(node.keys.len() >= min, "page {} underfull", node.page);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_round_trip_random_order() {
        run_test(
            create_test_context,
            |ctx| {
                let keys = shuffled(0..2000, 7);
                let tree = ctx.tree();
                for &k in &keys {
                    tree.insert(k, value_for(k))?;
                }
                for &k in &keys {
                    assert_eq!(tree.find(k)?, Some(value_for(k)));
                }
                assert_eq!(assert_integrity(tree)?.records, 2000);
                Ok(())
            },
            cleanup,
        );
    }

    #[test]
    fn test_leaf_chain_is_sorted_after_mixed_operations() {
        run_test(
            || create_small_test_context(5, 4),
            |ctx| {
                let mut rng = StdRng::seed_from_u64(11);
                let mut expected = BTreeSet::new();
                let tree = ctx.tree();

                for _ in 0..3000 {
                    let k = rng.random_range(-500..500);
                    if rng.random_bool(0.6) {
                        match tree.insert(k, value_for(k)) {
                            Ok(()) => assert!(expected.insert(k)),
                            Err(e) => {
                                assert!(e.is_logical());
                                assert!(expected.contains(&k));
                            }
                        }
                    } else {
                        match tree.delete(k) {
                            Ok(()) => assert!(expected.remove(&k)),
                            Err(e) => {
                                assert!(e.is_logical());
                                assert!(!expected.contains(&k));
                            }
                        }
                    }
                }

                let chained: Vec<i64> = tree.leaf_chain()?.into_iter().flatten().collect();
                assert!(chained.windows(2).all(|w| w[0] < w[1]));
                assert_eq!(chained, expected.iter().copied().collect::<Vec<_>>());
                assert_integrity(tree)?;
                Ok(())
            },
            cleanup,
        );
    }

    #[test]
    fn test_all_leaves_share_one_depth() {
        run_test(
            || create_small_test_context(3, 3),
            |ctx| {
                let tree = ctx.tree();
                for k in shuffled(0..500, 3) {
                    tree.insert(k, value_for(k))?;
                }
                for k in shuffled(0..500, 4).into_iter().take(300) {
                    tree.delete(k)?;
                }

                let levels = tree.level_order()?;
                let last = levels.len() - 1;
                for (depth, level) in levels.iter().enumerate() {
                    for node in level {
                        let expected = if depth == last { NodeKind::Leaf } else { NodeKind::Internal };
                        assert_eq!(node.kind, expected);
                    }
                }
                assert_eq!(tree.height()?, Some(last));
                Ok(())
            },
            cleanup,
        );
    }

    #[test]
    fn test_occupancy_holds_through_deletes() {
        run_test(
            || create_small_test_context(4, 5),
            |ctx| {
                for k in shuffled(0..400, 21) {
                    ctx.tree().insert(k, value_for(k))?;
                }
                check_occupancy(ctx)?;

                for (i, k) in shuffled(0..400, 22).into_iter().enumerate() {
                    ctx.tree().delete(k)?;
                    if i % 25 == 0 {
                        check_occupancy(ctx)?;
                    }
                }
                Ok(())
            },
            cleanup,
        );
    }

    #[test]
    fn test_emptied_tree_behaves_like_new() {
        run_test(
            || create_small_test_context(3, 3),
            |ctx| {
                let tree = ctx.tree();
                let keys = shuffled(0..200, 5);
                for &k in &keys {
                    tree.insert(k, value_for(k))?;
                }
                for &k in keys.iter().rev() {
                    tree.delete(k)?;
                }

                assert!(tree.is_empty()?);
                assert_eq!(tree.height()?, None);
                assert!(all_keys(tree)?.is_empty());
                for k in [0, 100, 199] {
                    assert_eq!(tree.find(k)?, None);
                }

                // every page came back to a free list
                let report = assert_integrity(tree)?;
                assert_eq!(report.leaf_pages + report.internal_pages, 0);
                assert!(report.free_pages > 0);

                // and the tree refills from them
                for &k in &keys {
                    tree.insert(k, value_for(k))?;
                }
                assert_eq!(all_keys(tree)?, (0..200).collect::<Vec<_>>());
                assert_integrity(tree)?;
                Ok(())
            },
            cleanup,
        );
    }

    #[test]
    fn test_range_matches_model() {
        run_test(
            || create_small_test_context(6, 4),
            |ctx| {
                let tree = ctx.tree();
                let keys: BTreeSet<i64> = shuffled((0..1000).map(|k| k * 3), 9).into_iter().collect();
                for &k in &keys {
                    tree.insert(k, value_for(k))?;
                }

                let mut rng = StdRng::seed_from_u64(13);
                for _ in 0..200 {
                    let a = rng.random_range(-100..3100);
                    let b = rng.random_range(-100..3100);
                    let got: Vec<i64> = tree.find_range(a, b)?.iter().map(|e| e.key).collect();
                    let want: Vec<i64> = if a <= b {
                        keys.range(a..=b).copied().collect()
                    } else {
                        Vec::new()
                    };
                    assert_eq!(got, want, "range {}..={}", a, b);
                }
                Ok(())
            },
            cleanup,
        );
    }
}
