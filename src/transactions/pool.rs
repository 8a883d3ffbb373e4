use crate::types::{AaStateTransaction, TxId};
use alloy::primitives::{Address, U256};
use parking_lot::Mutex;
use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    fmt::Debug,
};

/// Scheduling surface between the submission path and the dispatch loop.
///
/// Implementations must be safe to call concurrently and must never block.
pub trait AaPool: Debug + Send + Sync {
    /// Replaces the pool contents with jobs recovered from storage.
    fn init(&self, jobs: Vec<AaStateTransaction>);

    /// Inserts a new job, or reinserts a job that was popped and requeued.
    fn push(&self, job: AaStateTransaction);

    /// Returns the next job eligible for dispatch, if any.
    fn pop(&self) -> Option<AaStateTransaction>;

    /// Invoked once the in-flight job of `account` resolved.
    fn update(&self, account: Address);

    /// Number of jobs waiting in the pool.
    fn len(&self) -> usize;

    /// Whether no job is waiting.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`AaPool`] enforcing strict per-account nonce ordering.
///
/// An account has at most one job in flight. Its next job, the one with the lowest AA nonce, only
/// becomes eligible after [`AaPool::update`] was called for the account.
#[derive(Debug, Default)]
pub struct NoncePool {
    inner: Mutex<PoolInner>,
}

#[derive(Debug, Default)]
struct PoolInner {
    /// Waiting jobs.
    jobs: HashMap<TxId, AaStateTransaction>,
    /// Waiting jobs of each account, ordered by nonce. account -> (nonce, id)
    accounts: HashMap<Address, BTreeSet<(U256, TxId)>>,
    /// Jobs dispatched and not yet resolved. account -> id
    in_flight: HashMap<Address, TxId>,
    /// Accounts with a waiting job and nothing in flight, served round-robin.
    ready: VecDeque<Address>,
}

impl PoolInner {
    fn insert(&mut self, job: AaStateTransaction) {
        if self.jobs.contains_key(&job.id) {
            return;
        }

        let account = job.from();
        if self.in_flight.get(&account) == Some(&job.id) {
            // The dispatched job came back.
            self.in_flight.remove(&account);
        }

        self.accounts.entry(account).or_default().insert((job.tx.nonce(), job.id));
        self.jobs.insert(job.id, job);
        self.mark_ready(account);
    }

    fn mark_ready(&mut self, account: Address) {
        if self.in_flight.contains_key(&account)
            || !self.accounts.contains_key(&account)
            || self.ready.contains(&account)
        {
            return;
        }
        self.ready.push_back(account);
    }

    fn take_next(&mut self) -> Option<AaStateTransaction> {
        while let Some(account) = self.ready.pop_front() {
            let Some(queue) = self.accounts.get_mut(&account) else { continue };
            let Some((_, id)) = queue.pop_first() else {
                self.accounts.remove(&account);
                continue;
            };
            if queue.is_empty() {
                self.accounts.remove(&account);
            }

            let Some(job) = self.jobs.remove(&id) else { continue };
            self.in_flight.insert(account, id);
            return Some(job);
        }

        None
    }
}

impl AaPool for NoncePool {
    fn init(&self, jobs: Vec<AaStateTransaction>) {
        let mut inner = self.inner.lock();
        *inner = PoolInner::default();
        for job in jobs {
            inner.insert(job);
        }
    }

    fn push(&self, job: AaStateTransaction) {
        self.inner.lock().insert(job);
    }

    fn pop(&self) -> Option<AaStateTransaction> {
        self.inner.lock().take_next()
    }

    fn update(&self, account: Address) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(&account);
        inner.mark_ready(account);
    }

    fn len(&self) -> usize {
        self.inner.lock().jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AaTransaction, Transaction};
    use alloy::primitives::Bytes;
    use std::{sync::Arc, thread};

    fn job(from: Address, nonce: u64) -> AaStateTransaction {
        AaStateTransaction::new(AaTransaction {
            signature: Bytes::from(nonce.to_be_bytes().to_vec()),
            transaction: Transaction { from, nonce: U256::from(nonce), payload: vec![] },
        })
    }

    fn nonce(job: &AaStateTransaction) -> u64 {
        job.tx.nonce().to::<u64>()
    }

    #[test]
    fn same_account_waits_for_update() {
        let pool = NoncePool::default();
        let account = Address::with_last_byte(1);
        pool.push(job(account, 1));
        pool.push(job(account, 0));
        assert_eq!(pool.len(), 2);

        let first = pool.pop().unwrap();
        assert_eq!(nonce(&first), 0);
        assert!(pool.pop().is_none());
        assert_eq!(pool.len(), 1);

        pool.update(account);
        assert_eq!(nonce(&pool.pop().unwrap()), 1);
        assert!(pool.pop().is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn accounts_are_independent() {
        let pool = NoncePool::default();
        let alice = Address::with_last_byte(1);
        let bob = Address::with_last_byte(2);
        pool.push(job(alice, 0));
        pool.push(job(alice, 1));
        pool.push(job(bob, 5));

        let mut popped: Vec<_> =
            std::iter::from_fn(|| pool.pop()).map(|job| (job.from(), nonce(&job))).collect();
        popped.sort();
        assert_eq!(popped, vec![(alice, 0), (bob, 5)]);
    }

    #[test]
    fn push_is_idempotent() {
        let pool = NoncePool::default();
        let job = job(Address::ZERO, 0);
        pool.push(job.clone());
        pool.push(job.clone());
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.pop().unwrap().id, job.id);
        assert!(pool.pop().is_none());
    }

    #[test]
    fn requeued_job_is_dispatched_again() {
        let pool = NoncePool::default();
        let account = Address::with_last_byte(1);
        pool.push(job(account, 0));
        pool.push(job(account, 1));

        let first = pool.pop().unwrap();
        pool.push(first.clone());

        // The requeued job keeps its place ahead of later nonces.
        assert_eq!(pool.pop().unwrap().id, first.id);
        assert!(pool.pop().is_none());
    }

    #[test]
    fn update_without_waiting_jobs_is_noop() {
        let pool = NoncePool::default();
        pool.update(Address::ZERO);
        assert!(pool.pop().is_none());

        pool.push(job(Address::ZERO, 0));
        pool.update(Address::ZERO);
        assert!(pool.pop().is_some());
    }

    #[test]
    fn init_restores_nonce_order() {
        let pool = NoncePool::default();
        pool.push(job(Address::with_last_byte(9), 0));

        let account = Address::with_last_byte(1);
        pool.init(vec![job(account, 2), job(account, 0), job(account, 1)]);
        assert_eq!(pool.len(), 3);

        for expected in 0..3 {
            assert_eq!(nonce(&pool.pop().unwrap()), expected);
            assert!(pool.pop().is_none());
            pool.update(account);
        }
        assert!(pool.is_empty());
    }

    #[test]
    fn concurrent_pushes_are_not_lost() {
        let pool = Arc::new(NoncePool::default());
        let handles: Vec<_> = (0..8u8)
            .map(|account| {
                let pool = pool.clone();
                thread::spawn(move || {
                    for nonce in 0..32 {
                        pool.push(job(Address::with_last_byte(account), nonce));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.len(), 8 * 32);

        let mut dispatched = 0;
        while !pool.is_empty() {
            let batch: Vec<_> = std::iter::from_fn(|| pool.pop()).collect();
            assert!(batch.len() <= 8);
            for job in batch {
                pool.update(job.from());
                dispatched += 1;
            }
        }
        assert_eq!(dispatched, 8 * 32);
    }
}
