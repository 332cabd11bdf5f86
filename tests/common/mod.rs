#![allow(dead_code, unused_imports)]

pub use workdag_test_utils::builders;
pub use workdag_test_utils::fake_actions;
pub use workdag_test_utils::{fast_config, init_tracing, with_timeout};

use std::time::Duration;

use workdag::Coordinator;
use workdag::engine::TaskSnapshot;
use workdag::task::TaskId;

/// Wait for `id` to reach a terminal state, failing the test otherwise.
pub async fn finished(coordinator: &Coordinator, id: TaskId) -> TaskSnapshot {
    coordinator
        .wait_for(id, Duration::from_secs(5))
        .await
        .unwrap_or_else(|| panic!("{id} did not finish in time"))
}
