//! A fixed set of async locks addressed by string key. Keys hashing into the same bucket share a
//! lock, which bounds memory no matter how many distinct keys are seen.

use std::sync::Arc;

use openssl::sha::sha256;
use tokio::sync::Mutex;

static LOCK_COUNT: usize = 256;

#[derive(Debug, Default)]
pub struct LockEntry {
    pub lock: Mutex<()>,
}

#[derive(Debug)]
pub struct Locks {
    pub locks: Vec<Arc<LockEntry>>,
}

impl Default for Locks {
    fn default() -> Self {
        Self::new()
    }
}

impl Locks {
    pub fn new() -> Self {
        let mut locks = Self { locks: Vec::with_capacity(LOCK_COUNT) };

        for _ in 0..LOCK_COUNT {
            locks.locks.push(Arc::new(LockEntry::default()));
        }

        locks
    }

    pub fn get_lock(&self, key: &str) -> Arc<LockEntry> {
        let index: usize = sha256(key.as_bytes())[0].into();
        self.locks[index % self.locks.len()].clone()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_locks_same_key_same_entry() {
        let locks = Locks::new();
        assert_eq!(locks.locks.len(), LOCK_COUNT);
        assert!(Arc::ptr_eq(&locks.get_lock("test"), &locks.get_lock("test")));
    }

    #[actix_rt::test]
    async fn test_locks_serialize_holders() {
        let locks = Arc::new(Locks::new());
        let counter = Arc::new(std::sync::Mutex::new(Vec::new()));

        let entry = locks.get_lock("key");
        let guard = entry.lock.lock().await;

        let locks2 = Arc::clone(&locks);
        let counter2 = Arc::clone(&counter);
        let waiter = actix_rt::spawn(async move {
            let entry = locks2.get_lock("key");
            let _guard = entry.lock.lock().await;
            counter2.lock().unwrap().push("second");
        });

        actix_rt::time::sleep(Duration::from_millis(100)).await;
        counter.lock().unwrap().push("first");
        drop(guard);

        waiter.await.unwrap();
        assert_eq!(*counter.lock().unwrap(), vec!["first", "second"]);
    }
}
