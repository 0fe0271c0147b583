//! Bounded SQLite connection pool
//!
//! At most `capacity` connections exist at once. Connections are opened
//! lazily and returned to the idle list when the guard drops; callers block on
//! a condition variable while the pool is saturated.

use crate::error::Result;
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

type Opener = Box<dyn Fn() -> Result<Connection> + Send + Sync>;

struct PoolShared {
    state: Mutex<PoolState>,
    cvar: Condvar,
    capacity: usize,
    open: Opener,
}

struct PoolState {
    idle: Vec<Connection>,
    created: usize,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared handle to a fixed-capacity set of connections
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

/// A checked-out connection, returned to the pool on drop
pub struct PooledConnection {
    conn: Option<Connection>,
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// Build a pool around `open`, eagerly opening one connection so
    /// configuration errors surface immediately.
    pub fn new<F>(capacity: usize, open: F) -> Result<Self>
    where
        F: Fn() -> Result<Connection> + Send + Sync + 'static,
    {
        let capacity = capacity.max(1);
        let first = open()?;
        Ok(Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    idle: vec![first],
                    created: 1,
                }),
                cvar: Condvar::new(),
                capacity,
                open: Box::new(open),
            }),
        })
    }

    /// Check out a connection, blocking while all `capacity` are in use
    pub fn get(&self) -> Result<PooledConnection> {
        let shared = &self.shared;
        let mut guard = shared.lock();
        loop {
            if let Some(conn) = guard.idle.pop() {
                return Ok(PooledConnection {
                    conn: Some(conn),
                    shared: Arc::clone(shared),
                });
            }

            if guard.created < shared.capacity {
                guard.created += 1;
                drop(guard);
                return match (shared.open)() {
                    Ok(conn) => {
                        tracing::debug!(capacity = shared.capacity, "Opened pooled connection");
                        Ok(PooledConnection {
                            conn: Some(conn),
                            shared: Arc::clone(shared),
                        })
                    }
                    Err(e) => {
                        let mut guard = shared.lock();
                        guard.created -= 1;
                        drop(guard);
                        shared.cvar.notify_one();
                        Err(e)
                    }
                };
            }

            guard = shared
                .cvar
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Maximum number of simultaneous connections
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Connections currently checked out
    pub fn in_use(&self) -> usize {
        let guard = self.shared.lock();
        guard.created - guard.idle.len()
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection already returned")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection already returned")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let mut guard = self.shared.lock();
            guard.idle.push(conn);
            drop(guard);
            self.shared.cvar.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    fn memory_pool(capacity: usize) -> ConnectionPool {
        ConnectionPool::new(capacity, || Ok(Connection::open_in_memory()?)).unwrap()
    }

    #[test]
    fn test_connections_are_reused() {
        let pool = memory_pool(3);
        {
            let conn = pool.get().unwrap();
            conn.execute_batch("SELECT 1").unwrap();
            assert_eq!(pool.in_use(), 1);
        }
        assert_eq!(pool.in_use(), 0);
        let _a = pool.get().unwrap();
        let _b = pool.get().unwrap();
        assert_eq!(pool.in_use(), 2);
    }

    #[test]
    fn test_saturated_pool_blocks_until_release() {
        let pool = memory_pool(2);
        let a = pool.get().unwrap();
        let _b = pool.get().unwrap();

        let acquired = Arc::new(AtomicBool::new(false));
        let waiter = {
            let pool = pool.clone();
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _c = pool.get().unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!acquired.load(Ordering::SeqCst));
        assert_eq!(pool.in_use(), 2);

        drop(a);
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert!(pool.in_use() <= pool.capacity());
    }

    #[test]
    fn test_zero_capacity_means_one() {
        let pool = memory_pool(0);
        assert_eq!(pool.capacity(), 1);
        let _conn = pool.get().unwrap();
    }
}
