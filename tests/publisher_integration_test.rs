//! Write path integration tests
//!
//! Drives the full service (listener, queue, publisher thread) against the
//! in-memory backend, with faults injected through `FlakyStore`.

mod common;

use common::*;
use std::sync::Arc;
use std::time::Duration;
use timeline_history::constants::filters;
use timeline_history::events::{ApplicationContext, EventKind, LifecycleListener};
use timeline_history::store::PrimaryFilter;
use timeline_history::{InMemoryTimelineStore, ServiceState, TimelineError, TimelineService};

const WAIT: Duration = Duration::from_secs(5);

fn started_service(
    config: timeline_history::TimelineConfig,
    store: Arc<dyn timeline_history::TimelineStore>,
    app: &str,
) -> TimelineService {
    let service = TimelineService::new(config, store).unwrap();
    service.start(ApplicationContext::new(app)).unwrap();
    service
}

#[test]
fn test_environment_update_merges_into_next_terminal_batch() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let service = started_service(fast_config(), store.clone(), "app-1");
    let listener = service.listener().unwrap();

    listener.on_event(app_start("etl")).unwrap();
    listener
        .on_event(env_update(&[("spark.master", "local")]))
        .unwrap();
    listener.on_event(app_end()).unwrap();
    service.stop().unwrap();

    assert_eq!(store.post_count(), 2);
    let entity = store.snapshot(entity_type(), "app-1").unwrap();
    let kinds: Vec<EventKind> = entity.events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::ApplicationStart,
            EventKind::EnvironmentUpdate,
            EventKind::ApplicationEnd
        ]
    );
    assert!(entity.has_filter(&PrimaryFilter::completed()));
    assert!(entity.has_filter(&PrimaryFilter::new(filters::USER, "analyst")));
    assert!(entity.has_filter(&PrimaryFilter::new(filters::APPLICATION_ID, "app-1")));
}

#[test]
fn test_batch_size_one_posts_every_event() {
    let mut config = fast_config();
    config.publisher.max_batch_size = 1;
    let store = Arc::new(InMemoryTimelineStore::new());
    let service = started_service(config, store.clone(), "app-1");
    let listener = service.listener().unwrap();

    listener.on_event(app_start("etl")).unwrap();
    listener.on_event(env_update(&[])).unwrap();
    listener.on_event(app_end()).unwrap();
    service.stop().unwrap();

    assert_eq!(store.post_count(), 3);
    assert_eq!(service.metrics().batches_posted, 3);
    assert_eq!(service.metrics().last_sequence, 3);
}

#[test]
fn test_stop_flushes_all_queued_events() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let service = started_service(fast_config(), store.clone(), "app-1");
    let listener = service.listener().unwrap();

    listener.on_event(app_start("etl")).unwrap();
    let pending = 25;
    for job_id in 0..pending {
        listener.on_event(job_start(job_id)).unwrap();
    }
    service.stop().unwrap();

    assert_eq!(service.current_state(), ServiceState::Stopped);
    let entity = store.snapshot(entity_type(), "app-1").unwrap();
    assert_eq!(entity.events.len(), pending as usize + 1);

    let report = service.last_flush_report().unwrap();
    assert!(!report.timed_out);
    assert_eq!(report.events_lost, 0);
    assert_eq!(service.queue_depth(), 0);
}

#[test]
fn test_exhausted_retries_drop_the_batch() {
    let mut config = fast_config();
    config.publisher.max_retries = 3;
    let store = Arc::new(FlakyStore::new());
    store.fail_next_posts(3);
    let service = started_service(config, store.clone(), "app-1");
    let listener = service.listener().unwrap();

    listener.on_event(app_start("etl")).unwrap();
    assert!(service.await_events_processed(1, WAIT));

    let metrics = service.metrics();
    assert_eq!(metrics.batches_failed, 1);
    assert_eq!(metrics.events_dropped, 1);
    assert_eq!(metrics.post_attempts, 3);
    assert_eq!(metrics.post_failures, 3);
    assert!(store.inner().snapshot(entity_type(), "app-1").is_none());

    // The failure counter resets; the next batch goes through
    listener.on_event(app_end()).unwrap();
    service.stop().unwrap();

    let entity = store.inner().snapshot(entity_type(), "app-1").unwrap();
    assert_eq!(entity.events.len(), 1);
    assert_eq!(entity.events[0].kind, EventKind::ApplicationEnd);
    assert_eq!(service.metrics().events_posted, 1);
}

#[test]
fn test_retry_after_false_negative_does_not_duplicate() {
    let store = Arc::new(FlakyStore::new());
    store.false_negative_next_posts(1);
    let service = started_service(fast_config(), store.clone(), "app-1");
    let listener = service.listener().unwrap();

    listener.on_event(app_start("etl")).unwrap();
    listener.on_event(job_start(1)).unwrap();
    listener.on_event(app_end()).unwrap();
    service.stop().unwrap();

    let entity = store.inner().snapshot(entity_type(), "app-1").unwrap();
    let ids: Vec<u64> = entity.events.iter().map(|e| e.event_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(store.post_calls(), 3);
    assert_eq!(service.metrics().post_failures, 1);
    assert_eq!(service.metrics().events_posted, 3);
}

#[test]
fn test_rejected_post_is_not_retried() {
    let store = Arc::new(FlakyStore::new());
    store.reject_next_posts(1);
    let service = started_service(fast_config(), store.clone(), "app-1");
    let listener = service.listener().unwrap();

    listener.on_event(app_start("etl")).unwrap();
    assert!(service.await_events_processed(1, WAIT));
    service.stop().unwrap();

    assert_eq!(store.post_calls(), 1);
    assert_eq!(service.metrics().events_dropped, 1);
}

#[test]
fn test_saturated_queue_rejects_with_back_pressure() {
    let mut config = fast_config();
    config.publisher.queue_capacity = 2;
    config.publisher.enqueue_timeout_ms = 20;
    let store = Arc::new(FlakyStore::new());
    store.delay_posts(Duration::from_millis(300));
    let service = started_service(config, store.clone(), "app-1");
    let listener = service.listener().unwrap();

    listener.on_event(app_start("etl")).unwrap();

    let mut saturated = None;
    for job_id in 0..10 {
        if let Err(e) = listener.on_event(job_start(job_id)) {
            saturated = Some(e);
            break;
        }
    }

    match saturated {
        Some(TimelineError::QueueSaturated { capacity, .. }) => assert_eq!(capacity, 2),
        other => panic!("expected queue saturation, got {other:?}"),
    }
    assert_eq!(service.metrics().events_rejected, 1);
    service.stop().unwrap();
}

#[test]
fn test_flush_timeout_reports_lost_events() {
    let mut config = fast_config();
    config.publisher.flush_timeout_ms = 150;
    config.publisher.max_batch_size = 1;
    let store = Arc::new(FlakyStore::new());
    store.delay_posts(Duration::from_millis(400));
    let service = started_service(config, store.clone(), "app-1");
    let listener = service.listener().unwrap();

    listener.on_event(app_start("etl")).unwrap();
    for job_id in 0..5 {
        listener.on_event(job_start(job_id)).unwrap();
    }
    service.stop().unwrap();

    // The post in flight at the deadline completes; later batches are lost
    let report = service.last_flush_report().unwrap();
    assert!(report.timed_out);
    assert!(report.events_lost >= 4);
    assert_eq!(store.post_calls(), store.applied_posts());

    let metrics = service.metrics();
    assert_eq!(metrics.events_posted + metrics.events_lost_on_flush, 6);
    assert_eq!(service.current_state(), ServiceState::Stopped);
}

#[test]
fn test_flush_deadline_lets_in_flight_post_finish() {
    let mut config = fast_config();
    config.publisher.flush_timeout_ms = 100;
    let store = Arc::new(FlakyStore::new());
    store.delay_posts(Duration::from_millis(300));
    let service = started_service(config, store.clone(), "app-1");
    let listener = service.listener().unwrap();

    for job_id in 0..3 {
        listener.on_event(job_start(job_id)).unwrap();
    }
    service.stop().unwrap();

    let report = service.last_flush_report().unwrap();
    assert_eq!(report.events_posted, 3);
    assert_eq!(report.events_lost, 0);
    assert!(report.duration_ms >= 300);
    assert_eq!(store.post_calls(), 1);
    assert_eq!(store.applied_posts(), 1);

    let entity = store.inner().snapshot(entity_type(), "app-1").unwrap();
    assert_eq!(entity.events.len(), 3);
}

#[test]
fn test_services_sharing_an_entity_keep_each_others_events() {
    let store = Arc::new(InMemoryTimelineStore::new());

    let first = started_service(fast_config(), store.clone(), "app-1");
    first.listener().unwrap().on_event(app_start("etl")).unwrap();
    first.stop().unwrap();

    let second = started_service(fast_config(), store.clone(), "app-1");
    second.listener().unwrap().on_event(app_end()).unwrap();
    second.stop().unwrap();

    assert_eq!(second.metrics().events_posted, 1);
    let entity = store.snapshot(entity_type(), "app-1").unwrap();
    let kinds: Vec<EventKind> = entity.events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::ApplicationStart, EventKind::ApplicationEnd]);
    assert_eq!(entity.events[0].event_id, entity.events[1].event_id);
    assert_ne!(entity.events[0].producer_id, entity.events[1].producer_id);
    assert!(entity.has_filter(&PrimaryFilter::completed()));
}

#[test]
fn test_concurrent_stop_waits_for_stopped() {
    let store = Arc::new(FlakyStore::new());
    store.delay_posts(Duration::from_millis(100));
    let service = Arc::new(started_service(fast_config(), store, "app-1"));
    service
        .listener()
        .unwrap()
        .on_event(app_start("etl"))
        .unwrap();

    let stoppers: Vec<_> = (0..3)
        .map(|_| {
            let service = service.clone();
            std::thread::spawn(move || service.stop())
        })
        .collect();

    for stopper in stoppers {
        stopper.join().unwrap().unwrap();
    }
    assert_eq!(service.current_state(), ServiceState::Stopped);
    assert_eq!(service.metrics().events_posted, 1);
}

#[test]
fn test_events_from_multiple_threads_all_arrive() {
    let store = Arc::new(InMemoryTimelineStore::new());
    let service = started_service(fast_config(), store.clone(), "app-1");
    let listener = service.listener().unwrap();
    listener.on_event(app_start("etl")).unwrap();

    let producers: Vec<_> = (0..4)
        .map(|thread| {
            let listener = listener.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    listener.on_event(job_start(thread * 100 + i)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    service.stop().unwrap();

    let entity = store.snapshot(entity_type(), "app-1").unwrap();
    assert_eq!(entity.events.len(), 101);
    assert_eq!(service.metrics().events_enqueued, 101);
}
