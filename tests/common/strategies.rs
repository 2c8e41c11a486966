//! Proptest strategies for lifecycle event sequences.

#![allow(dead_code)]

use proptest::prelude::*;
use timeline_history::events::LifecycleEvent;

/// Any non-terminal lifecycle event
pub fn non_terminal_event_strategy() -> impl Strategy<Value = LifecycleEvent> {
    prop_oneof![
        (0u64..50, prop::collection::vec(0u64..200, 0..4))
            .prop_map(|(job_id, stage_ids)| LifecycleEvent::JobStart { job_id, stage_ids }),
        (0u64..50, any::<bool>())
            .prop_map(|(job_id, succeeded)| LifecycleEvent::JobEnd { job_id, succeeded }),
        (0u64..200, 0u32..3, "[a-z]{1,8}", 1u32..64).prop_map(
            |(stage_id, attempt, name, num_tasks)| LifecycleEvent::StageSubmitted {
                stage_id,
                attempt,
                name,
                num_tasks,
            }
        ),
        ("[a-z0-9]{1,6}", "[a-z]{1,6}", 0u64..4096).prop_map(|(block_id, executor_id, size)| {
            LifecycleEvent::BlockUpdated {
                block_id,
                executor_id,
                memory_size: size,
                disk_size: 0,
            }
        }),
        prop::collection::btree_map("[a-z.]{1,10}", "[a-z0-9]{0,6}", 0..3)
            .prop_map(|properties| LifecycleEvent::EnvironmentUpdate { properties }),
    ]
}

/// Start, a run of non-terminal events, and optionally an end
pub fn application_run_strategy() -> impl Strategy<Value = Vec<LifecycleEvent>> {
    (
        prop::collection::vec(non_terminal_event_strategy(), 0..40),
        any::<bool>(),
    )
        .prop_map(|(middle, ended)| {
            let mut events = vec![LifecycleEvent::ApplicationStart {
                app_name: "prop-app".to_string(),
                user: None,
            }];
            events.extend(middle);
            if ended {
                events.push(LifecycleEvent::ApplicationEnd);
            }
            events
        })
}

/// Batch size including the one-event-per-batch edge case
pub fn batch_size_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(1usize), 2usize..8, Just(100usize)]
}
