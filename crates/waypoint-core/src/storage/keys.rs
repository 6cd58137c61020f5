//! Document key layout.
//!
//! ```text
//! tasks/current        the in-flight task (overwritten on every save)
//! tasks/<uuid>         permanent per-task copy, kept for audit
//! queues/<queue-id>    one document per work queue
//! ```

use uuid::Uuid;

/// Key of the "current task" slot.
pub const CURRENT_TASK: &str = "tasks/current";

/// Prefix shared by all task documents.
pub const TASK_PREFIX: &str = "tasks/";

/// Prefix shared by all queue documents.
pub const QUEUE_PREFIX: &str = "queues/";

/// Key of the permanent copy of a task.
pub fn task(id: &Uuid) -> String {
    format!("{TASK_PREFIX}{id}")
}

/// Key of a queue document.
pub fn queue(id: &str) -> String {
    format!("{QUEUE_PREFIX}{id}")
}

/// Check that a key is a relative, slash-separated path with no empty,
/// `.` or `..` segments.
pub fn is_valid(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_and_queue_keys() {
        let id = Uuid::nil();
        assert_eq!(task(&id), "tasks/00000000-0000-0000-0000-000000000000");
        assert_eq!(queue("nightly-1700000000000"), "queues/nightly-1700000000000");
    }

    #[test]
    fn key_validation() {
        assert!(is_valid(CURRENT_TASK));
        assert!(is_valid("queues/a-b"));
        assert!(!is_valid(""));
        assert!(!is_valid("/etc/passwd"));
        assert!(!is_valid("queues/../secrets"));
        assert!(!is_valid("queues//x"));
        assert!(!is_valid("queues\\x"));
    }
}
