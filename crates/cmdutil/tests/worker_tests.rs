use cmdutil::WorkerGroup;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_worker_group_bounds_concurrency() {
    let group = WorkerGroup::new(2);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        let finished = Arc::clone(&finished);
        group.run(move || {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            running.fetch_sub(1, Ordering::SeqCst);
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }
    group.wait();

    assert_eq!(finished.load(Ordering::SeqCst), 5);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(running.load(Ordering::SeqCst), 0);
}

#[test]
fn test_worker_group_default_runs_one_at_a_time() {
    let group = WorkerGroup::new(0);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        group.run(move || {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            running.fetch_sub(1, Ordering::SeqCst);
        });
    }
    group.wait();

    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[test]
fn test_worker_group_shared_between_submitters() {
    let group = Arc::new(WorkerGroup::new(3));
    let done = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..4)
        .map(|_| {
            let group = Arc::clone(&group);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for _ in 0..5 {
                    let done = Arc::clone(&done);
                    group.run(move || {
                        done.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        })
        .collect();
    for submitter in submitters {
        submitter.join().unwrap();
    }
    group.wait();

    assert_eq!(done.load(Ordering::SeqCst), 20);
    assert_eq!(group.limit(), 3);
}
