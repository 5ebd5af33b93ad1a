//! Fixed-capacity slot pool bounding how many units of work run at once.
//!
//! A unit acquires a `Slot` before it starts and holds it until it is done;
//! dropping the slot releases it, so a unit that errors or panics still
//! frees its slot. `wait` is the drain barrier: it returns only once every
//! slot handed out so far has come back.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct SlotPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One acquired slot. Released on drop.
#[must_use = "dropping a slot releases it immediately"]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl Slot {
    /// Releases the slot explicitly.
    pub fn release(self) {}
}

impl SlotPool {
    /// Creates a pool with `capacity` slots. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> Slot {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("slot pool semaphore is never closed");
        Slot { _permit: permit }
    }

    /// Blocks until all outstanding slots have been released.
    ///
    /// Takes every slot at once and hands them straight back, so the pool is
    /// usable again afterwards.
    pub async fn wait(&self) {
        let all = self
            .semaphore
            .acquire_many(self.capacity as u32)
            .await
            .expect("slot pool semaphore is never closed");
        drop(all);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, timeout, Duration};

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let pool = SlotPool::new(0);
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_third_acquire_blocks_until_release() {
        let pool = SlotPool::new(2);
        let first = pool.acquire().await;
        let _second = pool.acquire().await;
        assert_eq!(pool.available(), 0);

        let blocked = timeout(Duration::from_millis(50), pool.acquire()).await;
        assert!(blocked.is_err(), "third acquire should block while both slots are held");

        first.release();
        let third = timeout(Duration::from_millis(500), pool.acquire()).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_wait_drains_all_dispatched_units() {
        let pool = Arc::new(SlotPool::new(2));
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..6u64 {
            let slot = pool.acquire().await;
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let _slot = slot;
                sleep(Duration::from_millis(10 + i * 5)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        pool.wait().await;
        assert_eq!(done.load(Ordering::SeqCst), 6);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_slot_released_when_task_panics() {
        let pool = SlotPool::new(1);
        let slot = pool.acquire().await;
        let handle = tokio::spawn(async move {
            let _slot = slot;
            panic!("unit failed");
        });
        assert!(handle.await.is_err());

        timeout(Duration::from_millis(500), pool.wait())
            .await
            .expect("wait should return once the panicked unit dropped its slot");
    }
}
