//! Enrollment coordinator tests

mod common;

use std::sync::Arc;

use common::{CollectingEvents, FailingStore, FakeSensor};
use fplink::{EnrollOptions, Error, IdentityStore, MemoryStore, SensorHandle};

#[tokio::test(start_paused = true)]
async fn merge_variant_enrolls_three_samples() {
    let (sensor, state) = FakeSensor::merge_variant();
    {
        let mut s = state.lock();
        for _ in 0..3 {
            s.push_press_cycle();
            s.push_capture();
        }
    }

    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(CollectingEvents::default());
    let handle = SensorHandle::new(sensor, store.clone()).with_events(events.clone());

    let outcome = handle.enroll(EnrollOptions::new("alice")).await.unwrap();
    assert_eq!(outcome.slot, 17);
    assert_eq!(outcome.label, "alice");

    let s = state.lock();
    // Slot allocation precedes sampling; merge precedes store
    assert_eq!(s.calls[0], "allocate");
    assert_eq!(s.count_calls("capture"), 3);
    assert!(s.calls.iter().any(|c| c == "extract:0"));
    assert!(s.calls.iter().any(|c| c == "extract:2"));
    let merge_at = s.calls.iter().position(|c| c == "merge").unwrap();
    let store_at = s.calls.iter().position(|c| c == "store:17").unwrap();
    assert!(merge_at < store_at);

    // Identity record landed
    let record = store.get(17).await.unwrap().unwrap();
    assert_eq!(record.label, "alice");

    // Progress narrated each sample
    let messages = events.messages.lock();
    assert!(messages.iter().any(|m| m.contains("Sample 1/3")));
    assert!(messages.iter().any(|m| m.contains("Sample 3/3")));
}

#[tokio::test(start_paused = true)]
async fn persistence_failure_triggers_compensating_delete() {
    let (sensor, state) = FakeSensor::merge_variant();
    {
        let mut s = state.lock();
        for _ in 0..3 {
            s.push_press_cycle();
            s.push_capture();
        }
    }

    let handle = SensorHandle::new(sensor, Arc::new(FailingStore));

    let result = handle.enroll(EnrollOptions::new("alice")).await;
    assert!(matches!(result, Err(Error::Consistency(_))));

    let s = state.lock();
    // The stored template was rolled back on-device
    assert!(s.calls.iter().any(|c| c == "store:17"));
    assert!(s.calls.iter().any(|c| c == "delete:17"));
}

#[tokio::test(start_paused = true)]
async fn persistence_failure_with_failed_rollback_is_still_consistency_error() {
    let (sensor, state) = FakeSensor::merge_variant();
    {
        let mut s = state.lock();
        s.fail_delete = true;
        for _ in 0..3 {
            s.push_press_cycle();
            s.push_capture();
        }
    }

    let handle = SensorHandle::new(sensor, Arc::new(FailingStore));

    let result = handle.enroll(EnrollOptions::new("alice")).await;
    match result {
        Err(Error::Consistency(message)) => {
            assert!(message.contains("compensating delete"));
        }
        other => panic!("expected consistency error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn compare_variant_mismatch_mutates_nothing() {
    let (sensor, state) = FakeSensor::compare_variant();
    {
        let mut s = state.lock();
        s.compare_result = false;
        for _ in 0..2 {
            s.push_press_cycle();
            s.push_capture();
        }
    }

    let store = Arc::new(MemoryStore::new());
    let handle = SensorHandle::new(sensor, store.clone());

    let result = handle.enroll(EnrollOptions::new("bob")).await;
    assert!(matches!(result, Err(Error::SampleMismatch)));

    let s = state.lock();
    assert!(s.calls.iter().any(|c| c == "compare"));
    // Neither the device nor the identity store was touched
    assert!(!s.calls.iter().any(|c| c.starts_with("store:")));
    assert!(!s.calls.iter().any(|c| c.starts_with("delete:")));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn compare_variant_uses_device_assigned_slot() {
    let (sensor, state) = FakeSensor::compare_variant();
    {
        let mut s = state.lock();
        for _ in 0..2 {
            s.push_press_cycle();
            s.push_capture();
        }
    }

    let store = Arc::new(MemoryStore::new());
    let handle = SensorHandle::new(sensor, store.clone());

    let outcome = handle.enroll(EnrollOptions::new("bob")).await.unwrap();
    assert_eq!(outcome.slot, 5);

    let s = state.lock();
    // Two samples, no up-front allocation, no merge
    assert_eq!(s.count_calls("capture"), 2);
    assert!(!s.calls.iter().any(|c| c == "allocate"));
    assert!(!s.calls.iter().any(|c| c == "merge"));

    assert_eq!(store.get(5).await.unwrap().unwrap().label, "bob");
}

#[tokio::test(start_paused = true)]
async fn exhausted_capture_attempts_abort_enrollment() {
    let (sensor, state) = FakeSensor::merge_variant();
    {
        let mut s = state.lock();
        // Three clean press cycles whose captures all come back empty
        for _ in 0..3 {
            s.push_press_cycle();
            s.captures.push_back(None);
        }
    }

    let handle = SensorHandle::new(sensor, Arc::new(MemoryStore::new()));

    let result = handle.enroll(EnrollOptions::new("carol")).await;
    assert!(matches!(result, Err(Error::CaptureFailed { attempts: 3 })));

    let s = state.lock();
    assert_eq!(s.count_calls("capture"), 3);
    assert!(!s.calls.iter().any(|c| c.starts_with("store:")));
}
