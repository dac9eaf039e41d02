//! Kill a process and all of its descendants.
//!
//! The tree is enumerated through [`ProcessTable`] first, then killed
//! deepest-first so a dying parent cannot orphan a child we have not seen
//! yet. Every pid is attempted; failures are collected and returned.

use std::collections::HashSet;
use std::time::Duration;

use funchost_core::{KillError, KillFailure, ProcessTable};
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry behaviour for kills the OS refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillPolicy {
    /// Total attempts per pid while the OS reports access denied.
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl Default for KillPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_millis(250),
        }
    }
}

/// Kill `root` and every descendant, children before parents.
///
/// "Already exited" is success. Access denied is retried per `policy`. Any
/// remaining failure is recorded and the next pid is attempted.
pub async fn kill_process_tree(
    table: &dyn ProcessTable,
    root: u32,
    policy: KillPolicy,
) -> Vec<KillFailure> {
    let order = post_order(table, root);
    debug!(root = %root, pids = ?order, "Killing process tree");

    let mut failures = Vec::new();
    for pid in order {
        if let Err(error) = kill_with_retry(table, pid, policy).await {
            warn!(pid = %pid, error = %error, "Failed to kill process");
            failures.push(KillFailure { pid, error });
        }
    }
    failures
}

/// Descendants of `root` in post-order, followed by `root` itself.
fn post_order(table: &dyn ProcessTable, root: u32) -> Vec<u32> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    // (pid, children already pushed)
    let mut stack = vec![(root, false)];

    while let Some((pid, expanded)) = stack.pop() {
        // pid 0 is the scheduler/idle process on every platform we run on.
        if pid == 0 {
            continue;
        }
        if expanded {
            order.push(pid);
            continue;
        }
        // pid reuse can make a stale table report a cycle
        if !visited.insert(pid) {
            continue;
        }
        stack.push((pid, true));
        for child in table.children_of(pid) {
            if !visited.contains(&child) {
                stack.push((child, false));
            }
        }
    }
    order
}

async fn kill_with_retry(
    table: &dyn ProcessTable,
    pid: u32,
    policy: KillPolicy,
) -> Result<(), KillError> {
    let mut attempt = 1;
    loop {
        match table.kill(pid) {
            Ok(()) | Err(KillError::AlreadyExited) => return Ok(()),
            Err(KillError::AccessDenied) if attempt < policy.attempts => {
                debug!(pid = %pid, attempt, "Access denied killing process, retrying");
                sleep(policy.retry_delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted kill results per pid; the last entry repeats.
    #[derive(Default)]
    struct FakeProcessTable {
        children: HashMap<u32, Vec<u32>>,
        results: HashMap<u32, Vec<Result<(), KillError>>>,
        kills: Mutex<Vec<u32>>,
    }

    impl FakeProcessTable {
        /// root 1 -> children 2, 3; 2 -> grandchild 4
        fn tree() -> Self {
            Self {
                children: HashMap::from([(1, vec![2, 3]), (2, vec![4])]),
                ..Self::default()
            }
        }

        fn with_results(mut self, pid: u32, results: Vec<Result<(), KillError>>) -> Self {
            self.results.insert(pid, results);
            self
        }

        fn kills(&self) -> Vec<u32> {
            self.kills.lock().unwrap().clone()
        }
    }

    impl ProcessTable for FakeProcessTable {
        fn children_of(&self, pid: u32) -> Vec<u32> {
            self.children.get(&pid).cloned().unwrap_or_default()
        }

        fn kill(&self, pid: u32) -> Result<(), KillError> {
            let mut kills = self.kills.lock().unwrap();
            let attempt = kills.iter().filter(|p| **p == pid).count();
            kills.push(pid);
            match self.results.get(&pid) {
                Some(results) => results[attempt.min(results.len() - 1)].clone(),
                None => Ok(()),
            }
        }
    }

    fn fast() -> KillPolicy {
        KillPolicy {
            attempts: 3,
            retry_delay: Duration::from_millis(1),
        }
    }

    fn position(kills: &[u32], pid: u32) -> usize {
        kills.iter().position(|p| *p == pid).unwrap()
    }

    #[tokio::test]
    async fn kills_all_four_children_first() {
        let table = FakeProcessTable::tree();
        let failures = kill_process_tree(&table, 1, fast()).await;

        assert!(failures.is_empty());
        let kills = table.kills();
        assert_eq!(kills.len(), 4);
        assert!(position(&kills, 4) < position(&kills, 2));
        assert!(position(&kills, 2) < position(&kills, 1));
        assert!(position(&kills, 3) < position(&kills, 1));
    }

    #[tokio::test]
    async fn already_exited_on_any_node_is_not_a_failure() {
        for pid in 1..=4 {
            let table = FakeProcessTable::tree().with_results(pid, vec![Err(KillError::AlreadyExited)]);
            let failures = kill_process_tree(&table, 1, fast()).await;

            assert!(failures.is_empty(), "pid {pid}: {failures:?}");
            assert_eq!(table.kills().len(), 4);
        }
    }

    #[tokio::test]
    async fn access_denied_is_retried() {
        let table = FakeProcessTable::tree()
            .with_results(3, vec![Err(KillError::AccessDenied), Ok(())]);
        let failures = kill_process_tree(&table, 1, fast()).await;

        assert!(failures.is_empty());
        assert_eq!(table.kills().iter().filter(|p| **p == 3).count(), 2);
    }

    #[tokio::test]
    async fn persistent_access_denied_is_reported_and_siblings_still_killed() {
        let table = FakeProcessTable::tree().with_results(2, vec![Err(KillError::AccessDenied)]);
        let failures = kill_process_tree(&table, 1, fast()).await;

        assert_eq!(
            failures,
            vec![KillFailure {
                pid: 2,
                error: KillError::AccessDenied
            }]
        );
        let kills = table.kills();
        assert_eq!(kills.iter().filter(|p| **p == 2).count(), 3);
        for pid in [1, 3, 4] {
            assert!(kills.contains(&pid));
        }
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let table = FakeProcessTable::tree()
            .with_results(4, vec![Err(KillError::Failed("EINVAL".to_string()))]);
        let failures = kill_process_tree(&table, 1, fast()).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(table.kills().iter().filter(|p| **p == 4).count(), 1);
    }

    #[tokio::test]
    async fn pid_zero_and_cycles_are_skipped() {
        let table = FakeProcessTable {
            children: HashMap::from([(1, vec![0, 2]), (2, vec![1])]),
            ..FakeProcessTable::default()
        };
        let failures = kill_process_tree(&table, 1, fast()).await;

        assert!(failures.is_empty());
        assert_eq!(table.kills(), vec![2, 1]);
    }
}
