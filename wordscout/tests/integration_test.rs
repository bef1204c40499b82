use anyhow::Result;
use std::fs::{self, File};
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;
use wordscout::search::search;
use wordscout::{
    EncodingMode, EngineOptions, EventSink, RunStatus, ScanSearchEngine, ScanTarget, SearchConfig,
    SearchEvent, SearchOutcome, SearchQuery, SnapshotPolicy, StopOutcome,
};

fn create_test_files(dir: &Path, file_count: usize, lines_per_file: usize) -> Result<()> {
    for i in 0..file_count {
        let file_path = dir.join(format!("test_{}.txt", i));
        let mut file = File::create(file_path)?;
        for j in 0..lines_per_file {
            writeln!(file, "Line {} in file {}: TODO implement this", j, i)?;
            writeln!(file, "Another line {} in file {}: nothing special", j, i)?;
            writeln!(file, "FIXME: This is a bug in file {} line {}", i, j)?;
        }
    }
    Ok(())
}

fn config_for(root: &Path, token: &str) -> SearchConfig {
    SearchConfig {
        root_path: root.to_path_buf(),
        token: token.to_string(),
        thread_count: NonZeroUsize::new(4).unwrap(),
        ..SearchConfig::default()
    }
}

fn recorder() -> (Arc<Mutex<Vec<SearchEvent>>>, Arc<dyn EventSink>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let events = Arc::clone(&events);
        move |e: SearchEvent| events.lock().unwrap().push(e)
    };
    (events, Arc::new(sink))
}

#[test]
fn test_simple_token() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(dir.path(), 10, 100)?;

    let report = search(&config_for(dir.path(), "TODO"))?;

    assert_eq!(report.outcome, SearchOutcome::CompletedWithResults);
    assert_eq!(report.files_searched, 10);
    assert_eq!(report.files_with_matches(), 10);
    assert_eq!(report.total_matches, 1000);
    assert!(report.results.iter().all(|r| r.count == 100));
    Ok(())
}

#[test]
fn test_token_with_trailing_colon_is_split() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(dir.path(), 3, 10)?;

    // "FIXME:" tokenizes to "FIXME", and the colon never forms part of a token
    assert_eq!(search(&config_for(dir.path(), "FIXME"))?.total_matches, 30);
    assert_eq!(
        search(&config_for(dir.path(), "FIXME:"))?.outcome,
        SearchOutcome::CompletedNoMatches
    );
    Ok(())
}

#[test]
fn test_matching_is_case_sensitive_and_whole_token() -> Result<()> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("words.txt"),
        "Cat cat CAT category bobcat cat's \"cat\"\tcat\r\ncat",
    )?;

    let report = search(&config_for(dir.path(), "cat"))?;

    // cat, cat('s), "cat", cat, cat
    assert_eq!(report.total_matches, 5);
    Ok(())
}

#[test]
fn test_nested_directories_are_searched() -> Result<()> {
    let dir = tempdir()?;
    let nested = dir.path().join("a").join("b").join("c");
    fs::create_dir_all(&nested)?;
    fs::write(dir.path().join("top.txt"), "needle")?;
    fs::write(nested.join("deep.txt"), "needle needle")?;
    fs::write(nested.join("deep.md"), "needle")?;

    let report = search(&config_for(dir.path(), "needle"))?;

    assert_eq!(report.files_searched, 2);
    let deep = report
        .results
        .iter()
        .find(|r| r.file_name == "deep.txt")
        .expect("deep.txt should match");
    assert_eq!(deep.directory_path, nested);
    assert_eq!(deep.count, 2);
    Ok(())
}

#[test]
fn test_results_identical_across_thread_counts() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(dir.path(), 25, 20)?;

    let mut baseline = None;
    for threads in [1, 2, 8] {
        let config = SearchConfig {
            thread_count: NonZeroUsize::new(threads).unwrap(),
            ..config_for(dir.path(), "line")
        };
        let report = search(&config)?;
        let summary: Vec<_> = report
            .results
            .iter()
            .map(|r| (r.file_name.clone(), r.count))
            .collect();
        match &baseline {
            None => baseline = Some(summary),
            Some(expected) => assert_eq!(&summary, expected),
        }
    }
    Ok(())
}

#[test]
fn test_invalid_utf8_handling() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("bad.txt"), b"cat \xff\xfe cat")?;
    fs::write(dir.path().join("good.txt"), "cat")?;

    let lossy = search(&config_for(dir.path(), "cat"))?;
    assert_eq!(lossy.total_matches, 3);

    let strict = search(&SearchConfig {
        encoding_mode: EncodingMode::FailFast,
        ..config_for(dir.path(), "cat")
    })?;
    assert_eq!(strict.total_matches, 1);
    assert_eq!(strict.stats.files_skipped, 1);
    Ok(())
}

#[test]
fn test_progress_events_over_many_files() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(dir.path(), 250, 2)?;
    let (events, sink) = recorder();

    let mut engine = ScanSearchEngine::with_sink(
        EngineOptions {
            thread_count: NonZeroUsize::new(8).unwrap(),
            ..EngineOptions::default()
        },
        sink,
    )?;
    engine.search(
        &ScanTarget::with_filter(dir.path(), "*.txt")?,
        &SearchQuery::new("TODO")?,
    )?;

    let percents: Vec<u8> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            SearchEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(percents, (1..=100).collect::<Vec<u8>>());
    Ok(())
}

#[test]
fn test_cancel_from_another_thread() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(dir.path(), 400, 20)?;

    // The first match parks its worker until the stop thread has acted
    let (request_tx, request_rx) = mpsc::channel::<()>();
    let (ack_tx, ack_rx) = mpsc::channel::<StopOutcome>();
    let rendezvous = Mutex::new(Some((request_tx, ack_rx)));
    let (events, record) = recorder();
    let sink = move |e: SearchEvent| {
        record.emit(e.clone());
        if let SearchEvent::Match(_) = e {
            if let Some((request, ack)) = rendezvous.lock().unwrap().take() {
                request.send(()).unwrap();
                ack.recv().unwrap();
            }
        }
    };

    let mut engine = ScanSearchEngine::with_sink(
        EngineOptions {
            thread_count: NonZeroUsize::new(2).unwrap(),
            ..EngineOptions::default()
        },
        Arc::new(sink),
    )?;
    let handle = engine.stop_handle();
    let stopper = thread::spawn(move || {
        request_rx.recv().unwrap();
        let outcome = handle.request_stop();
        ack_tx.send(outcome).unwrap();
        outcome
    });

    let report = engine.search(
        &ScanTarget::with_filter(dir.path(), "*.txt")?,
        &SearchQuery::new("TODO")?,
    )?;

    assert_eq!(stopper.join().unwrap(), StopOutcome::Cancelling);
    assert_eq!(report.outcome, SearchOutcome::Cancelled);
    assert!(report.results.len() < 400);
    assert_eq!(engine.status(), RunStatus::Ready);
    assert_eq!(engine.stop_handle().request_stop(), StopOutcome::Shutdown);

    // No match or progress arrives once the run has drained
    thread::sleep(Duration::from_millis(50));
    let events = events.lock().unwrap();
    assert_eq!(
        events.last(),
        Some(&SearchEvent::Finished(SearchOutcome::Cancelled))
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, SearchEvent::Finished(_)))
            .count(),
        1
    );
    Ok(())
}

#[test]
fn test_stop_during_walk_discards_partial_list() -> Result<()> {
    let dir = tempdir()?;
    for d in 0..40 {
        let sub = dir.path().join(format!("dir_{:02}", d));
        fs::create_dir_all(&sub)?;
        for f in 0..50 {
            fs::write(sub.join(format!("{}.txt", f)), "cat")?;
        }
    }

    // Signals the stop thread without waiting, so the walk keeps going
    let (scan_tx, scan_rx) = mpsc::channel::<()>();
    let scan_tx = Mutex::new(scan_tx);
    let (events, record) = recorder();
    let sink = move |e: SearchEvent| {
        if e == SearchEvent::StatusChanged(RunStatus::Scanning) {
            let _ = scan_tx.lock().unwrap().send(());
        }
        record.emit(e);
    };

    let mut engine = ScanSearchEngine::with_sink(EngineOptions::default(), Arc::new(sink))?;
    let handle = engine.stop_handle();
    let stopper = thread::spawn(move || {
        scan_rx.recv().unwrap();
        handle.request_stop()
    });

    let report = engine.search(
        &ScanTarget::with_filter(dir.path(), "*.txt")?,
        &SearchQuery::new("cat")?,
    )?;
    let stop = stopper.join().unwrap();

    let events = events.lock().unwrap();
    let reached_search = events.contains(&SearchEvent::StatusChanged(RunStatus::Searching));
    match stop {
        StopOutcome::Cancelling if !reached_search => {
            // Stopped in Phase 1: nothing cached, Phase 2 never ran
            assert_eq!(report.outcome, SearchOutcome::Cancelled);
            assert_eq!(report.files_searched, 0);
            assert_eq!(engine.status(), RunStatus::Idle);
            assert!(engine.cached_files().is_none());
            assert!(!events
                .iter()
                .any(|e| matches!(e, SearchEvent::Progress(_) | SearchEvent::Match(_))));
        }
        StopOutcome::Cancelling => {
            assert_eq!(report.outcome, SearchOutcome::Cancelled);
            assert_eq!(engine.status(), RunStatus::Ready);
            assert_eq!(engine.cached_file_count(), 2000);
        }
        _ => assert_eq!(report.outcome, SearchOutcome::CompletedWithResults),
    }
    Ok(())
}

#[test]
fn test_reuse_then_rescan_after_directory_change() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("one.txt"), "cat")?;
    let target = ScanTarget::with_filter(dir.path(), "*.txt")?;
    let query = SearchQuery::new("cat")?;

    let mut engine = ScanSearchEngine::new(EngineOptions {
        snapshot_policy: SnapshotPolicy::Reuse,
        ..EngineOptions::default()
    })?;
    assert_eq!(engine.search(&target, &query)?.files_searched, 1);

    fs::write(dir.path().join("two.txt"), "cat")?;
    let reused = engine.search(&target, &query)?;
    assert!(reused.reused_snapshot);
    assert_eq!(reused.files_searched, 1);

    engine.open_directory(dir.path())?;
    let fresh = engine.search(&target, &query)?;
    assert!(!fresh.reused_snapshot);
    assert_eq!(fresh.files_searched, 2);
    Ok(())
}

#[test]
fn test_removed_file_between_runs_is_skipped() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("keep.txt"), "cat")?;
    fs::write(dir.path().join("gone.txt"), "cat cat")?;
    let target = ScanTarget::with_filter(dir.path(), "*.txt")?;
    let query = SearchQuery::new("cat")?;

    let mut engine = ScanSearchEngine::new(EngineOptions::default())?;
    engine.search(&target, &query)?;
    fs::remove_file(dir.path().join("gone.txt"))?;

    let report = engine.search(&target, &query)?;
    assert!(report.reused_snapshot);
    assert_eq!(report.outcome, SearchOutcome::CompletedWithResults);
    assert_eq!(report.total_matches, 1);
    assert_eq!(engine.progress().percent_displayed, 100);
    Ok(())
}
