
use std::sync::Arc;

use restjob::scheduler::{Job, JobQueue, PoolEntry, WorkerPool};
use restjob::worker::ExecutionHandle;
use test_harness::FakeHandle;
use uuid::Uuid;

fn started_entry(job: Job) -> (PoolEntry, Arc<FakeHandle>) {
    let handle = Arc::new(FakeHandle::new(job.clone(), true));
    handle.start();
    (
        PoolEntry {
            job,
            handle: handle.clone(),
        },
        handle,
    )
}

#[test]
fn test_queue_is_fifo() {
    let mut queue = JobQueue::with_capacity(10);
    let a = Job::new("fake", "a");
    let b = Job::new("fake", "b");
    let c = Job::new("fake", "c");

    assert!(queue.push(a.clone()));
    assert!(queue.push(b.clone()));
    assert!(queue.push(c.clone()));

    assert_eq!(queue.pop().map(|j| j.id), Some(a.id));
    assert_eq!(queue.pop().map(|j| j.id), Some(b.id));
    assert_eq!(queue.pop().map(|j| j.id), Some(c.id));
    assert!(queue.pop().is_none());
}

#[test]
fn test_queue_rejects_when_full() {
    let mut queue = JobQueue::with_capacity(2);
    assert!(queue.push(Job::new("fake", "1")));
    assert!(queue.push(Job::new("fake", "2")));
    assert!(queue.is_full());

    let overflow = Job::new("fake", "3");
    assert!(!queue.push(overflow.clone()));
    assert_eq!(queue.len(), 2);
    assert!(!queue.contains(&overflow.id));
}

#[test]
fn test_zero_capacity_queue_admits_nothing() {
    let mut queue = JobQueue::with_capacity(0);
    assert!(queue.is_full());
    assert!(!queue.push(Job::new("fake", "1")));
    assert!(queue.is_empty());
}

#[test]
fn test_queue_remove_from_middle_keeps_order() {
    let mut queue = JobQueue::with_capacity(5);
    let a = Job::new("fake", "a");
    let b = Job::new("fake", "b");
    let c = Job::new("fake", "c");
    queue.push(a.clone());
    queue.push(b.clone());
    queue.push(c.clone());

    let removed = queue.remove(&b.id).unwrap();
    assert_eq!(removed.id, b.id);
    assert!(queue.remove(&Uuid::new_v4()).is_none());

    let ids: Vec<Uuid> = queue.jobs().iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![a.id, c.id]);
    assert_eq!(queue.get(&c.id).map(|j| j.payload.as_str()), Some("c"));
}

#[test]
fn test_queue_front_leaves_job_in_place() {
    let mut queue = JobQueue::with_capacity(3);
    assert!(queue.front().is_none());

    let a = Job::new("fake", "a");
    queue.push(a.clone());
    queue.push(Job::new("fake", "b"));

    assert_eq!(queue.front().map(|j| j.id), Some(a.id));
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.pop().map(|j| j.id), Some(a.id));
}

#[test]
fn test_pool_respects_slot_limit() {
    let mut pool = WorkerPool::with_slots(1);
    let (first, _) = started_entry(Job::new("fake", "1"));
    let (second, _) = started_entry(Job::new("fake", "2"));
    let second_id = second.job.id;

    assert!(pool.insert(first).is_ok());
    assert!(!pool.has_free_slot());

    let rejected = pool.insert(second).unwrap_err();
    assert_eq!(rejected.job.id, second_id);
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_pool_evicts_only_finished_entries() {
    let mut pool = WorkerPool::with_slots(3);
    let (a, handle_a) = started_entry(Job::new("fake", "a"));
    let (b, _handle_b) = started_entry(Job::new("fake", "b"));
    let (c, handle_c) = started_entry(Job::new("fake", "c"));
    let (id_a, id_b, id_c) = (a.job.id, b.job.id, c.job.id);
    pool.insert(a).unwrap();
    pool.insert(b).unwrap();
    pool.insert(c).unwrap();

    assert!(pool.evict_finished().is_empty());

    handle_a.finish();
    handle_c.finish();
    let mut evicted = pool.evict_finished();
    evicted.sort();
    let mut expected = vec![id_a, id_c];
    expected.sort();
    assert_eq!(evicted, expected);

    assert_eq!(pool.len(), 1);
    assert!(pool.contains(&id_b));
    assert!(!pool.contains(&id_a));
    assert!(!pool.contains(&id_c));
}

#[test]
fn test_pool_remove_and_lookup() {
    let mut pool = WorkerPool::with_slots(2);
    let (entry, _) = started_entry(Job::new("fake", "x"));
    let id = entry.job.id;
    pool.insert(entry).unwrap();

    assert_eq!(pool.get(&id).map(|e| e.job.id), Some(id));
    assert_eq!(pool.jobs().len(), 1);

    assert!(pool.remove(&id).is_some());
    assert!(pool.remove(&id).is_none());
    assert!(pool.is_empty());
    assert!(pool.has_free_slot());
}
