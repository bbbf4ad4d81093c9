use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use ruckscursor::{
    Cursor, DB, DBOptions, Error, Iterator, ReadOptions, Scheduler, SchedulerOptions, Slice,
    Status, WriteOptions, error,
};

type Handler = Box<dyn FnOnce(error::Result<()>) + Send>;

fn open_db() -> DB {
    DB::open(DBOptions {
        worker_threads: 2,
        ..Default::default()
    })
    .unwrap()
}

fn open_abc() -> DB {
    let db = open_db();
    for (k, v) in [("a", "1"), ("b", "2"), ("c", "3")] {
        db.put(&WriteOptions::default(), Slice::from(k), Slice::from(v))
            .unwrap();
    }
    db
}

/// Issue an asynchronous positioning call and drain the scheduler until its
/// handler has run.
fn complete<F>(scheduler: &Scheduler, issue: F) -> error::Result<()>
where
    F: FnOnce(Handler) -> error::Result<()>,
{
    let slot = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicUsize::new(0));

    let handler_slot = Arc::clone(&slot);
    let handler_calls = Arc::clone(&calls);
    issue(Box::new(move |result| {
        handler_calls.fetch_add(1, Ordering::SeqCst);
        *handler_slot.lock() = Some(result);
    }))?;

    assert!(scheduler.run_until_idle_timeout(Duration::from_secs(10)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let result = slot.lock().take().unwrap();
    result
}

fn entry(cursor: &Cursor) -> Option<(String, String)> {
    let key = cursor.key().unwrap()?;
    let value = cursor.value().unwrap()?;
    Some((key.to_string(), value.to_string()))
}

fn pair(k: &str, v: &str) -> Option<(String, String)> {
    Some((k.to_string(), v.to_string()))
}

#[test]
fn test_walk_forward_and_backward() {
    let db = open_abc();
    let sched = db.scheduler();
    let cursor = db.new_cursor(&ReadOptions::default()).unwrap();

    complete(sched, |h| cursor.seek_to_first(h)).unwrap();
    assert_eq!(entry(&cursor), pair("a", "1"));
    cursor.next().unwrap();
    assert_eq!(entry(&cursor), pair("b", "2"));
    cursor.next().unwrap();
    assert_eq!(entry(&cursor), pair("c", "3"));
    cursor.next().unwrap();
    assert!(!cursor.valid().unwrap());
    assert!(cursor.status().unwrap().is_ok());

    complete(sched, |h| cursor.seek("b", h)).unwrap();
    assert_eq!(entry(&cursor), pair("b", "2"));

    complete(sched, |h| cursor.seek("bb", h)).unwrap();
    assert_eq!(entry(&cursor), pair("c", "3"));

    complete(sched, |h| cursor.seek_to_last(h)).unwrap();
    assert_eq!(entry(&cursor), pair("c", "3"));
    cursor.prev().unwrap();
    assert_eq!(entry(&cursor), pair("b", "2"));
    cursor.prev().unwrap();
    cursor.prev().unwrap();
    assert!(!cursor.valid().unwrap());
    assert!(cursor.status().unwrap().is_ok());

    complete(sched, |h| cursor.seek_for_prev("0", h)).unwrap();
    assert!(!cursor.valid().unwrap());
    complete(sched, |h| cursor.seek_for_prev("zz", h)).unwrap();
    assert_eq!(entry(&cursor), pair("c", "3"));

    cursor.close();
    assert_eq!(db.num_snapshots(), 0);
}

#[test]
fn test_seek_past_end_is_end_of_range() {
    let db = open_abc();
    let cursor = db.new_cursor(&ReadOptions::default()).unwrap();

    complete(db.scheduler(), |h| cursor.seek("d", h)).unwrap();
    assert!(!cursor.valid().unwrap());
    assert_eq!(cursor.key().unwrap(), None);
    assert_eq!(cursor.value().unwrap(), None);
    assert_eq!(cursor.status().unwrap(), Status::ok());
}

#[test]
fn test_empty_store() {
    let db = open_db();
    let cursor = db.new_cursor(&ReadOptions::default()).unwrap();

    complete(db.scheduler(), |h| cursor.seek_to_first(h)).unwrap();
    assert!(!cursor.valid().unwrap());
    assert!(cursor.status().unwrap().is_ok());

    complete(db.scheduler(), |h| cursor.seek_to_last(h)).unwrap();
    assert!(!cursor.valid().unwrap());

    let err = cursor.next().unwrap_err();
    assert!(err.is_illegal_state());
    let err = cursor.prev().unwrap_err();
    assert!(err.is_illegal_state());
}

#[test]
fn test_cursors_share_snapshot() {
    let db = open_abc();
    let snapshot = db.get_snapshot();
    let options = ReadOptions::with_snapshot(snapshot.clone());

    let first = db.new_cursor(&options).unwrap();
    let second = db.new_cursor(&options).unwrap();
    drop(options);
    db.release_snapshot(snapshot);
    assert_eq!(db.num_snapshots(), 1);

    first.close();
    assert_eq!(db.num_snapshots(), 1);

    complete(db.scheduler(), |h| second.seek_to_first(h)).unwrap();
    assert_eq!(entry(&second), pair("a", "1"));
    assert!(first.valid().unwrap_err().is_illegal_state());

    second.close();
    assert_eq!(db.num_snapshots(), 0);
}

fn rejected(_: error::Result<()>) {
    panic!("handler must not run after close");
}

#[test]
fn test_every_operation_fails_after_close() {
    let db = open_abc();
    let cursor = db.new_cursor(&ReadOptions::default()).unwrap();
    complete(db.scheduler(), |h| cursor.seek_to_first(h)).unwrap();

    cursor.close();
    cursor.close();
    assert!(cursor.is_closed());

    assert!(cursor.valid().unwrap_err().is_illegal_state());
    assert!(cursor.next().unwrap_err().is_illegal_state());
    assert!(cursor.prev().unwrap_err().is_illegal_state());
    assert!(cursor.key().unwrap_err().is_illegal_state());
    assert!(cursor.value().unwrap_err().is_illegal_state());
    assert!(cursor.status().unwrap_err().is_illegal_state());

    assert!(cursor.seek_to_first(rejected).unwrap_err().is_illegal_state());
    assert!(cursor.seek_to_last(rejected).unwrap_err().is_illegal_state());
    assert!(cursor.seek("a", rejected).unwrap_err().is_illegal_state());
    assert!(
        cursor
            .seek_for_prev("a", rejected)
            .unwrap_err()
            .is_illegal_state()
    );
    assert_eq!(db.scheduler().outstanding(), 0);

    let stats = db.statistics();
    assert_eq!(stats.num_cursors_created(), 1);
    assert_eq!(stats.num_cursors_closed(), 1);
}

#[test]
fn test_snapshot_isolation() {
    let db = open_abc();
    let cursor = db.new_cursor(&ReadOptions::default()).unwrap();

    db.put(&WriteOptions::default(), Slice::from("d"), Slice::from("4"))
        .unwrap();
    db.delete(&WriteOptions::default(), Slice::from("a"))
        .unwrap();
    db.put(&WriteOptions::default(), Slice::from("b"), Slice::from("22"))
        .unwrap();

    let mut seen = Vec::new();
    complete(db.scheduler(), |h| cursor.seek_to_first(h)).unwrap();
    while let Some(kv) = entry(&cursor) {
        seen.push(kv);
        cursor.next().unwrap();
    }
    assert_eq!(seen, vec![
        ("a".to_string(), "1".to_string()),
        ("b".to_string(), "2".to_string()),
        ("c".to_string(), "3".to_string()),
    ]);

    let fresh = db.new_cursor(&ReadOptions::default()).unwrap();
    complete(db.scheduler(), |h| fresh.seek_to_first(h)).unwrap();
    assert_eq!(entry(&fresh), pair("b", "22"));
}

#[test]
fn test_writes_during_traversal() {
    let db = Arc::new(open_db());
    for i in 0..100 {
        db.put(
            &WriteOptions::default(),
            Slice::from(format!("key{i:03}")),
            Slice::from("old"),
        )
        .unwrap();
    }
    let cursor = db.new_cursor(&ReadOptions::default()).unwrap();

    let writer_db = Arc::clone(&db);
    let writer = thread::spawn(move || {
        for i in 0..100 {
            writer_db
                .put(
                    &WriteOptions::default(),
                    Slice::from(format!("key{i:03}")),
                    Slice::from("new"),
                )
                .unwrap();
            writer_db
                .put(
                    &WriteOptions::default(),
                    Slice::from(format!("key{i:03}x")),
                    Slice::from("extra"),
                )
                .unwrap();
        }
    });

    complete(db.scheduler(), |h| cursor.seek_to_first(h)).unwrap();
    let mut count = 0;
    while cursor.valid().unwrap() {
        assert_eq!(cursor.value().unwrap(), Some(Slice::from("old")));
        count += 1;
        cursor.next().unwrap();
    }
    writer.join().unwrap();

    assert_eq!(count, 100);
    assert!(cursor.status().unwrap().is_ok());
}

#[test]
fn test_handler_runs_on_draining_thread() {
    let db = open_abc();
    let cursor = db.new_cursor(&ReadOptions::default()).unwrap();
    let caller = thread::current().id();
    let ran_on = Arc::new(Mutex::new(Vec::new()));

    let slot = Arc::clone(&ran_on);
    cursor
        .seek_to_last(move |result| {
            result.unwrap();
            slot.lock().push(thread::current().id());
        })
        .unwrap();

    thread::sleep(Duration::from_millis(20));
    assert!(ran_on.lock().is_empty());

    db.scheduler().run_until_idle();
    assert_eq!(*ran_on.lock(), vec![caller]);
    assert_eq!(entry(&cursor), pair("c", "3"));
}

#[test]
fn test_positioning_is_single_flight() {
    let db = open_abc();
    let cursor = db.new_cursor(&ReadOptions::default()).unwrap();

    let first = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&first);
    cursor
        .seek("b", move |result| *slot.lock() = Some(result))
        .unwrap();

    let err = cursor
        .seek_to_first(|_| panic!("rejected call must not complete"))
        .unwrap_err();
    assert!(err.is_illegal_state());
    assert!(cursor.next().unwrap_err().is_illegal_state());
    assert!(cursor.key().unwrap_err().is_illegal_state());

    // Finished on the worker or not, the position stays hidden until the
    // handler has run.
    thread::sleep(Duration::from_millis(20));
    assert!(cursor.valid().unwrap_err().is_illegal_state());
    assert!(first.lock().is_none());

    db.scheduler().run_until_idle();
    assert_eq!(first.lock().take(), Some(Ok(())));
    assert_eq!(entry(&cursor), pair("b", "2"));
}

#[test]
fn test_close_during_positioning() {
    let db = open_abc();
    let cursor = db.new_cursor(&ReadOptions::default()).unwrap();
    assert_eq!(db.num_snapshots(), 1);

    let outcome = Arc::new(Mutex::new(Vec::new()));
    let slot = Arc::clone(&outcome);
    cursor
        .seek_to_first(move |result| slot.lock().push(result))
        .unwrap();
    cursor.close();

    assert!(cursor.valid().unwrap_err().is_illegal_state());
    // Teardown waits for the completion to be drained.
    assert_eq!(db.num_snapshots(), 1);
    assert!(outcome.lock().is_empty());
    db.scheduler().run_until_idle();

    // The handler still runs exactly once; whether the positioning itself
    // ran depends on when the worker observed the close.
    let outcome = outcome.lock();
    assert_eq!(outcome.len(), 1);
    match &outcome[0] {
        Ok(()) => {},
        Err(err) => assert!(err.is_illegal_state()),
    }
    assert_eq!(db.num_snapshots(), 0);
    assert_eq!(db.statistics().num_open_cursors(), 0);
}

#[test]
fn test_drop_releases_snapshot() {
    let db = open_abc();
    {
        let _cursor = db.new_cursor(&ReadOptions::default()).unwrap();
        assert_eq!(db.num_snapshots(), 1);
    }
    assert_eq!(db.num_snapshots(), 0);
}

#[test]
fn test_oversized_seek_target() {
    let db = DB::open(DBOptions {
        worker_threads: 1,
        max_key_size: 8,
        ..Default::default()
    })
    .unwrap();
    let cursor = db.new_cursor(&ReadOptions::default()).unwrap();

    let err = cursor
        .seek("a-key-longer-than-eight", |_| panic!("must not run"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(!cursor.valid().unwrap());
}

/// In-memory traversal that fails on demand.
struct FaultyIterator {
    entries: Vec<(Slice, Slice)>,
    pos: Option<usize>,
    fail_seek: bool,
    /// Stepping onto this index fails.
    fail_at: Option<usize>,
    status: Status,
}

impl FaultyIterator {
    fn new(keys: &[&str]) -> Self {
        FaultyIterator {
            entries: keys
                .iter()
                .map(|k| (Slice::from(*k), Slice::from(k.to_uppercase())))
                .collect(),
            pos: None,
            fail_seek: false,
            fail_at: None,
            status: Status::ok(),
        }
    }

    fn land(&mut self, pos: Option<usize>) -> ruckscursor::Result<bool> {
        self.status = Status::ok();
        if pos.is_some() && pos == self.fail_at {
            self.pos = None;
            self.status = Status::io_error("device unreadable");
            return Err(self.status.clone());
        }
        self.pos = pos.filter(|&p| p < self.entries.len());
        Ok(self.pos.is_some())
    }

    fn check_seek(&mut self) -> ruckscursor::Result<()> {
        if self.fail_seek {
            self.pos = None;
            self.status = Status::corruption("bad block");
            return Err(self.status.clone());
        }
        Ok(())
    }
}

impl Iterator for FaultyIterator {
    fn seek_to_first(&mut self) -> ruckscursor::Result<bool> {
        self.check_seek()?;
        self.land(Some(0))
    }

    fn seek_to_last(&mut self) -> ruckscursor::Result<bool> {
        self.check_seek()?;
        self.land(self.entries.len().checked_sub(1))
    }

    fn seek(&mut self, target: &Slice) -> ruckscursor::Result<bool> {
        self.check_seek()?;
        let idx = self.entries.partition_point(|(k, _)| k < target);
        self.land(Some(idx))
    }

    fn seek_for_prev(&mut self, target: &Slice) -> ruckscursor::Result<bool> {
        self.check_seek()?;
        let idx = self.entries.partition_point(|(k, _)| k <= target);
        self.land(idx.checked_sub(1))
    }

    fn next(&mut self) -> ruckscursor::Result<bool> {
        let pos = self.pos.map(|p| p + 1);
        self.land(pos)
    }

    fn prev(&mut self) -> ruckscursor::Result<bool> {
        let pos = self.pos.and_then(|p| p.checked_sub(1));
        self.land(pos)
    }

    fn key(&self) -> Slice {
        self.pos
            .map(|p| self.entries[p].0.clone())
            .unwrap_or_default()
    }

    fn value(&self) -> Slice {
        self.pos
            .map(|p| self.entries[p].1.clone())
            .unwrap_or_default()
    }

    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn status(&self) -> Status {
        self.status.clone()
    }
}

fn scheduler() -> Scheduler {
    Scheduler::new(&SchedulerOptions {
        worker_threads: 1,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_exhausted_and_failed_are_distinguishable() {
    let sched = scheduler();

    let exhausted = Cursor::new(
        Box::new(FaultyIterator::new(&["a", "b"])),
        None,
        sched.clone(),
    );
    complete(&sched, |h| exhausted.seek_to_first(h)).unwrap();
    exhausted.next().unwrap();
    exhausted.next().unwrap();
    assert!(!exhausted.valid().unwrap());
    assert!(exhausted.status().unwrap().is_ok());

    let mut faulty = FaultyIterator::new(&["a", "b", "c"]);
    faulty.fail_at = Some(1);
    let failed = Cursor::new(Box::new(faulty), None, sched.clone());
    complete(&sched, |h| failed.seek_to_first(h)).unwrap();
    assert_eq!(failed.key().unwrap(), Some(Slice::from("a")));

    // The step itself succeeds; the failure shows up in status.
    failed.next().unwrap();
    assert!(!failed.valid().unwrap());
    let status = failed.status().unwrap();
    assert!(status.is_io_error());
    assert_eq!(status.message(), Some("device unreadable"));

    // A new positioning call clears it.
    complete(&sched, |h| failed.seek_to_last(h)).unwrap();
    assert_eq!(failed.key().unwrap(), Some(Slice::from("c")));
    assert!(failed.status().unwrap().is_ok());
}

#[test]
fn test_positioning_failure_is_delivered() {
    let sched = scheduler();
    let mut faulty = FaultyIterator::new(&["a"]);
    faulty.fail_seek = true;
    let cursor = Cursor::new(Box::new(faulty), None, sched.clone());

    let err = complete(&sched, |h| cursor.seek("a", h)).unwrap_err();
    let status = err.status().cloned().unwrap();
    assert!(status.is_corruption());

    assert!(!cursor.valid().unwrap());
    assert_eq!(cursor.status().unwrap(), status);
}

/// Traversal whose positioning panics.
struct PanickingIterator;

impl Iterator for PanickingIterator {
    fn seek_to_first(&mut self) -> ruckscursor::Result<bool> {
        panic!("worker blew up")
    }

    fn seek_to_last(&mut self) -> ruckscursor::Result<bool> {
        Ok(false)
    }

    fn seek(&mut self, _target: &Slice) -> ruckscursor::Result<bool> {
        Ok(false)
    }

    fn seek_for_prev(&mut self, _target: &Slice) -> ruckscursor::Result<bool> {
        Ok(false)
    }

    fn next(&mut self) -> ruckscursor::Result<bool> {
        Ok(false)
    }

    fn prev(&mut self) -> ruckscursor::Result<bool> {
        Ok(false)
    }

    fn key(&self) -> Slice {
        Slice::empty()
    }

    fn value(&self) -> Slice {
        Slice::empty()
    }

    fn valid(&self) -> bool {
        false
    }
}

#[test]
fn test_worker_panic_aborts_cursor() {
    let sched = scheduler();
    let cursor = Cursor::new(Box::new(PanickingIterator), None, sched.clone());

    let err = complete(&sched, |h| cursor.seek_to_first(h)).unwrap_err();
    assert_eq!(err, Error::Aborted);
    assert!(cursor.is_closed());
    assert!(cursor.valid().unwrap_err().is_illegal_state());
}
