use std::sync::Arc;

use super::*;
use crate::cache::CacheLevel;

struct PanickingSink;

impl EventSink for PanickingSink {
    fn emit(&self, _event: &CacheEvent) {
        panic!("exporter is broken");
    }
}

#[test]
fn test_recording_sink_counts_by_name() {
    let sink = Arc::new(RecordingSink::new());
    let diagnostics = Diagnostics::new(sink.clone());
    let cache: Arc<str> = Arc::from("test");

    diagnostics.emit(CacheEvent::Hit {
        cache: cache.clone(),
        level: CacheLevel::L1,
    });
    diagnostics.emit(CacheEvent::Miss {
        cache: cache.clone(),
    });
    diagnostics.emit(CacheEvent::Miss { cache });

    assert_eq!(sink.count("hit"), 1);
    assert_eq!(sink.count("miss"), 2);
    assert_eq!(sink.events().len(), 3);

    sink.clear();
    assert!(sink.events().is_empty());
}

#[test]
fn test_panicking_sink_is_contained() {
    let diagnostics = Diagnostics::new(Arc::new(PanickingSink));

    diagnostics.emit(CacheEvent::ModelRetrained { samples: 10 });
}

#[test]
fn test_fanout_reaches_every_sink() {
    let a = Arc::new(RecordingSink::new());
    let b = Arc::new(RecordingSink::new());
    let fanout = FanoutSink::new()
        .with(a.clone())
        .with(Arc::new(TracingSink))
        .with(Arc::new(MetricsSink))
        .with(b.clone());

    fanout.emit(&CacheEvent::TaskFailed {
        task: "sync",
        error: "boom".to_string(),
    });

    assert_eq!(a.count("task_failed"), 1);
    assert_eq!(b.count("task_failed"), 1);
}

#[test]
fn test_event_names_are_stable() {
    assert_eq!(
        CacheEvent::EvictionCandidates {
            strategy: "lru".to_string(),
            count: 3
        }
        .name(),
        "eviction_candidates"
    );
    assert_eq!(HitSource::Remote.as_str(), "remote");
}
