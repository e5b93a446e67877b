//! End-to-end retention scenarios: pruning the sink's own files and sweeping
//! every matching file in the directory.

use std::{
    fs,
    time::{Duration, Instant},
};

use rollsink::{Frequency, RetentionLimit, RollEvent, RollingFileSink, RollingSinkBuilder};
use tempfile::tempdir;

fn wait_for_event<F>(sink: &RollingFileSink, timeout: Duration, mut matches: F)
where
    F: FnMut(&RollEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match sink.events().recv_timeout(remaining) {
            Ok(event) if matches(&event) => return,
            Ok(_) => continue,
            Err(err) => panic!("expected event within {timeout:?}: {err}"),
        }
    }
}

#[test]
fn keeps_the_active_file_plus_the_configured_count() {
    let dir = tempdir().expect("tempdir must create");
    let mut sink = RollingSinkBuilder::new(dir.path().join("log"))
        .with_size("20b".parse().expect("size must parse"))
        .with_retention(RetentionLimit::new(1))
        .build()
        .expect("build must succeed");

    let record = [b'x'; 19];
    for _ in 0..5 {
        sink.write(&record).expect("write must succeed");
    }
    // Two rotations: after records 2 and 4. The second prunes log.1.log.
    sink.close();

    let mut remaining: Vec<String> = fs::read_dir(dir.path())
        .expect("directory must be listable")
        .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
        .collect();
    remaining.sort();
    assert_eq!(remaining, ["log.2.log", "log.3.log"]);

    let active = fs::metadata(dir.path().join("log.3.log")).expect("active file must exist");
    assert_eq!(active.len(), 19, "active file must hold the last record");
}

#[test]
fn cleanup_complete_is_emitted_after_each_pass() {
    let dir = tempdir().expect("tempdir must create");
    let sink = RollingSinkBuilder::new(dir.path().join("log"))
        .with_size("20b".parse().expect("size must parse"))
        .with_retention(RetentionLimit::new(1))
        .build()
        .expect("build must succeed");

    sink.write(&[b'x'; 25]).expect("write must succeed");
    wait_for_event(&sink, Duration::from_secs(2), |event| {
        matches!(event, RollEvent::CleanupComplete)
    });
}

#[test]
fn sweep_mode_bounds_every_matching_file_and_spares_strangers() {
    let dir = tempdir().expect("tempdir must create");
    fs::write(dir.path().join("notLogFile"), "keep me\n").expect("stranger must be writable");

    let mut sink = RollingSinkBuilder::new(dir.path().join("log"))
        .with_frequency(Frequency::Every(Duration::from_millis(50)))
        .with_date_format("HH-mm-ss-S".parse().expect("pattern must parse"))
        .with_retention(RetentionLimit::new(2).removing_other_log_files())
        .build()
        .expect("build must succeed");

    // Rotate enough times that the sweep has had to delete something.
    let mut cleanups = 0;
    wait_for_event(&sink, Duration::from_secs(5), |event| {
        if matches!(event, RollEvent::CleanupComplete) {
            cleanups += 1;
        }
        cleanups == 4
    });
    sink.close();

    let names: Vec<String> = fs::read_dir(dir.path())
        .expect("directory must be listable")
        .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
        .collect();
    assert!(
        names.iter().any(|name| name == "notLogFile"),
        "foreign files must never be deleted: {names:?}"
    );
    let matching = names
        .iter()
        .filter(|name| name.starts_with("log.") && name.ends_with(".log"))
        .count();
    assert_eq!(
        matching, 2,
        "sweep keeps exactly the configured number of matches: {names:?}"
    );
}
