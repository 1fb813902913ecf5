//! Serialized access, busy rejection and workflow timeouts

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeSensor;
use fplink::{EnrollOptions, Error, MemoryStore, SearchOptions, SensorHandle, TemplateRecord};
use fplink::IdentityStore;

#[tokio::test(start_paused = true)]
async fn second_workflow_is_rejected_while_one_runs() {
    let (sensor, state) = FakeSensor::merge_variant();
    // Never sees a press: the first workflow parks in the debounce loop
    state.lock().constant_poll = Some(false);

    let handle = SensorHandle::new(sensor, Arc::new(MemoryStore::new()))
        .with_enroll_timeout(Duration::from_secs(3600));
    let background = handle.clone();

    let running = tokio::spawn(async move {
        background.enroll(EnrollOptions::new("alice")).await
    });

    // Let the spawned workflow take the sensor lock
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    let result = handle.search(SearchOptions::default()).await;
    assert!(matches!(result, Err(Error::Busy)));

    // Presence polling shares the same discipline
    let result = handle.detect_presence().await;
    assert!(matches!(result, Err(Error::Busy)));

    running.abort();
}

#[tokio::test(start_paused = true)]
async fn workflow_timeout_is_distinct_from_capture_failure() {
    let (sensor, state) = FakeSensor::merge_variant();
    state.lock().constant_poll = Some(false);

    let handle = SensorHandle::new(sensor, Arc::new(MemoryStore::new()))
        .with_enroll_timeout(Duration::from_millis(50));

    let result = handle.enroll(EnrollOptions::new("alice")).await;
    match result {
        Err(Error::WorkflowTimeout(budget)) => {
            assert_eq!(budget, Duration::from_millis(50));
        }
        other => panic!("expected workflow timeout, got {other:?}"),
    }

    // The transport was resynchronized after the abandoned wait
    let s = state.lock();
    assert!(s.calls.iter().any(|c| c == "resync"));
}

#[tokio::test(start_paused = true)]
async fn handle_is_reusable_after_a_timeout() {
    let (sensor, state) = FakeSensor::merge_variant();
    state.lock().constant_poll = Some(false);

    let handle = SensorHandle::new(sensor, Arc::new(MemoryStore::new()))
        .with_search_timeout(Duration::from_millis(50));

    let result = handle.search(SearchOptions::default()).await;
    assert!(matches!(result, Err(Error::WorkflowTimeout(_))));

    // Lock released; the next caller gets through to the sensor
    {
        let mut s = state.lock();
        s.constant_poll = None;
        s.push_press_cycle();
        s.push_capture();
        s.search_result = None;
    }

    let outcome = handle.search(SearchOptions::default()).await.unwrap();
    assert!(!outcome.is_match());
}

#[tokio::test]
async fn delete_enrollment_removes_device_then_record() {
    let (sensor, state) = FakeSensor::merge_variant();

    let store = Arc::new(MemoryStore::new());
    store
        .insert(TemplateRecord::new("alice", 17).unwrap())
        .await
        .unwrap();

    let handle = SensorHandle::new(sensor, store.clone());

    handle.delete_enrollment(17).await.unwrap();

    assert!(state.lock().calls.iter().any(|c| c == "delete:17"));
    assert!(store.get(17).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_enrollment_device_failure_leaves_record() {
    let (sensor, state) = FakeSensor::merge_variant();
    state.lock().fail_delete = true;

    let store = Arc::new(MemoryStore::new());
    store
        .insert(TemplateRecord::new("alice", 17).unwrap())
        .await
        .unwrap();

    let handle = SensorHandle::new(sensor, store.clone());

    let result = handle.delete_enrollment(17).await;
    assert!(matches!(result, Err(Error::Device { .. })));

    // Identity record untouched
    assert!(store.get(17).await.unwrap().is_some());
}

#[tokio::test]
async fn delete_enrollment_missing_record_is_consistency_error() {
    let (sensor, _state) = FakeSensor::merge_variant();

    let handle = SensorHandle::new(sensor, Arc::new(MemoryStore::new()));

    // Device delete succeeds, but the identity index has no record
    let result = handle.delete_enrollment(9).await;
    assert!(matches!(result, Err(Error::Consistency(_))));
}

#[tokio::test]
async fn enrolled_lists_store_records() {
    let (sensor, _state) = FakeSensor::merge_variant();

    let store = Arc::new(MemoryStore::new());
    store
        .insert(TemplateRecord::new("alice", 2).unwrap())
        .await
        .unwrap();
    store
        .insert(TemplateRecord::new("bob", 1).unwrap())
        .await
        .unwrap();

    let handle = SensorHandle::new(sensor, store);

    let records = handle.enrolled().await.unwrap();
    let labels: Vec<&str> = records.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["bob", "alice"]);
}
