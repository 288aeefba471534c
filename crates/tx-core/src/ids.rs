//! Opaque, prefixed identifier generation.
//!
//! Row ids are never raw UUIDs: every entity gets a short, prefixed,
//! lowercase-hex id (`tx-a3f91c2d`, `worker-7e0c1b4a`, ...) derived from a
//! v4 UUID. Callers needing determinism in tests inject an `IdGenerator`
//! rather than calling `Uuid::new_v4()` directly.

use uuid::Uuid;

const HASH_LEN: usize = 12;

fn short_hash() -> String {
    Uuid::new_v4().simple().to_string()[..HASH_LEN].to_string()
}

pub fn task_id() -> String {
    format!("tx-{}", short_hash())
}

pub fn worker_id() -> String {
    format!("worker-{}", short_hash())
}

pub fn run_id() -> String {
    format!("run-{}", short_hash())
}

pub fn attempt_id() -> String {
    format!("attempt-{}", short_hash())
}

pub fn learning_id() -> String {
    format!("learning-{}", short_hash())
}

pub fn candidate_id() -> String {
    format!("candidate-{}", short_hash())
}

pub fn anchor_id() -> String {
    format!("anchor-{}", short_hash())
}

/// Pluggable id source so services can be unit tested deterministically
/// instead of asserting against whatever `Uuid::new_v4()` happens to
/// produce.
pub trait IdGenerator: Send + Sync {
    fn task_id(&self) -> String;
    fn worker_id(&self) -> String;
    fn run_id(&self) -> String;
    fn attempt_id(&self) -> String;
    fn learning_id(&self) -> String;
    fn candidate_id(&self) -> String;
    fn anchor_id(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn task_id(&self) -> String {
        task_id()
    }
    fn worker_id(&self) -> String {
        worker_id()
    }
    fn run_id(&self) -> String {
        run_id()
    }
    fn attempt_id(&self) -> String {
        attempt_id()
    }
    fn learning_id(&self) -> String {
        learning_id()
    }
    fn candidate_id(&self) -> String {
        candidate_id()
    }
    fn anchor_id(&self) -> String {
        anchor_id()
    }
}

/// Hands out deterministic, monotonically-numbered ids per prefix; used in
/// tests that assert on exact id strings.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: std::sync::atomic::AtomicU64,
}

impl SequentialIdGenerator {
    fn next(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("{prefix}-seq{n:08x}")
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn task_id(&self) -> String {
        self.next("tx")
    }
    fn worker_id(&self) -> String {
        self.next("worker")
    }
    fn run_id(&self) -> String {
        self.next("run")
    }
    fn attempt_id(&self) -> String {
        self.next("attempt")
    }
    fn learning_id(&self) -> String {
        self.next("learning")
    }
    fn candidate_id(&self) -> String {
        self.next("candidate")
    }
    fn anchor_id(&self) -> String {
        self.next("anchor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_prefixed_and_unique() {
        let a = task_id();
        let b = task_id();
        assert!(a.starts_with("tx-"));
        assert_ne!(a, b);
        assert_eq!(a.len(), "tx-".len() + HASH_LEN);
    }

    #[test]
    fn sequential_generator_is_deterministic() {
        let gen = SequentialIdGenerator::default();
        assert_eq!(gen.task_id(), "tx-seq00000000");
        assert_eq!(gen.task_id(), "tx-seq00000001");
    }
}
