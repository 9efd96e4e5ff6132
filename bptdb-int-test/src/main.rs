use bptdb::StoreResult;
use bptdb_int_test::test_util::{all_keys, cleanup, create_test_context, shuffled, value_for};
use log::warn;

fn main() -> StoreResult<()> {
    colog::init();
    println!("Starting stress test...");
    let mut ctx = create_test_context()?;
    let tree = ctx.tree();

    let count: i64 = 200_000;
    let keys = shuffled(0..count, 42);

    let start = std::time::Instant::now();
    for &k in &keys {
        tree.insert(k, value_for(k))?;
    }
    println!("Inserted {} records in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let mut found = 0;
    for &k in keys.iter().step_by(7) {
        if tree.find(k)?.is_some() {
            found += 1;
        }
    }
    println!("Found {} records in {:?}", found, start.elapsed());

    let start = std::time::Instant::now();
    let scanned = tree.find_range(count / 4, count / 2)?.len();
    println!("Scanned {} records in {:?}", scanned, start.elapsed());

    let start = std::time::Instant::now();
    for &k in keys.iter().filter(|k| *k % 2 == 0) {
        tree.delete(k)?;
    }
    println!("Deleted even keys in {:?}", start.elapsed());

    let start = std::time::Instant::now();
    let report = tree.check_integrity()?;
    println!(
        "Checked {} pages ({} records, height {:?}) in {:?}: {}",
        report.pages_checked,
        report.records,
        report.height,
        start.elapsed(),
        if report.is_valid { "valid" } else { "INVALID" }
    );
    for error in &report.errors {
        warn!("{}", error);
    }
    println!("{} keys remain", all_keys(tree)?.len());

    cleanup(ctx)
}
