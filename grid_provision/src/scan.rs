use crate::explorer::Explorer;
use crate::lifecycle::NextAction;
use crate::reservation::Reservation;
use crate::schema::Date;
use futures::future::join_all;
use log::{debug, error, trace};
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Amount of concurrent lookups, unless configured otherwise.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Which reservations a scan yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFilter {
    /// Only yield reservations of this customer.
    pub customer_tid: i64,
    /// Also yield deleted reservations.
    pub include_deleted: bool,
    /// Also yield expired reservations.
    pub include_expired: bool,
}

impl ScanFilter {
    /// Yield the live reservations of a customer.
    pub fn owned_by(customer_tid: i64) -> Self {
        ScanFilter {
            customer_tid,
            include_deleted: false,
            include_expired: false,
        }
    }

    /// Check if a reservation passes the filter at the given moment.
    pub fn matches(&self, reservation: &Reservation, now: Date) -> bool {
        if reservation.customer_tid != self.customer_tid {
            return false;
        }
        if !self.include_deleted && reservation.next_action == NextAction::Deleted {
            return false;
        }
        if !self.include_expired && reservation.is_expired(now) {
            return false;
        }
        true
    }
}

/// Looks up a range of reservation ids concurrently.
pub struct Scanner<E> {
    explorer: Arc<E>,
    pool_size: usize,
}

impl<E: Explorer + 'static> Scanner<E> {
    /// Create a scanner doing `pool_size` lookups at the same time.
    pub fn new(explorer: Arc<E>, pool_size: usize) -> Self {
        Scanner {
            explorer,
            pool_size: pool_size.max(1),
        }
    }

    /// Start scanning the ids in `ids`. Matching reservations are sent on the returned channel,
    /// in no particular order. The channel is closed once every id has been looked up, or once
    /// the scan is cancelled. Ids which can't be fetched are skipped.
    ///
    /// This must be called from within a tokio runtime.
    pub fn scan(
        &self,
        ids: Range<i64>,
        filter: ScanFilter,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<Reservation> {
        let (job_tx, job_rx) = mpsc::channel::<i64>(self.pool_size);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel(self.pool_size);

        let producer_cancel = cancel.clone();
        tokio::spawn(async move {
            for id in ids {
                tokio::select! {
                    _ = producer_cancel.cancelled() => break,
                    sent = job_tx.send(id) => if sent.is_err() { break },
                }
            }
            trace!("scan producer done");
            // job_tx is dropped here, which lets the workers drain and exit
        });

        let mut workers = Vec::with_capacity(self.pool_size);
        for worker_id in 0..self.pool_size {
            let explorer = self.explorer.clone();
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let filter = filter.clone();
            let cancel = cancel.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    let next = {
                        let mut jobs = jobs.lock().await;
                        tokio::select! {
                            _ = cancel.cancelled() => None,
                            id = jobs.recv() => id,
                        }
                    };
                    let id = match next {
                        Some(id) => id,
                        None => break,
                    };

                    let reservation = tokio::select! {
                        _ = cancel.cancelled() => break,
                        res = explorer.get(id) => res,
                    };
                    match reservation {
                        Ok(r) if filter.matches(&r, Date::now()) => {
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                sent = results.send(r) => if sent.is_err() {
                                    // receiver is gone, nobody cares about the results anymore
                                    break;
                                },
                            }
                        }
                        Ok(_) => trace!("reservation {} filtered out", id),
                        Err(e) => debug!("could not fetch reservation {}: {}", id, e),
                    }
                }
                trace!("scan worker {} done", worker_id);
            }));
        }

        tokio::spawn(async move {
            for res in join_all(workers).await {
                if let Err(e) = res {
                    error!("scan worker failed: {}", e);
                }
            }
            drop(result_tx);
            debug!("scan finished");
        });

        result_rx
    }
}

#[cfg(test)]
mod tests {
    use super::{ScanFilter, Scanner};
    use crate::capacity::{CapacityPool, CapacityReservation};
    use crate::explorer::{
        CapacityPoolCreateResponse, Explorer, ExplorerResult, ReservationCreateResponse,
    };
    use crate::lifecycle::NextAction;
    use crate::reservation::Reservation;
    use crate::schema::Date;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    /// Every id is a reservation of customer `id % 3`, ids divisible by 5 are deleted, ids
    /// divisible by 7 are expired and ids divisible by 11 don't exist.
    #[derive(Default)]
    struct SyntheticExplorer {
        lookups: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Explorer for SyntheticExplorer {
        async fn create(&self, _: &Reservation) -> ExplorerResult<ReservationCreateResponse> {
            Err("not supported".to_string().into())
        }

        async fn get(&self, id: i64) -> ExplorerResult<Reservation> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if id % 11 == 0 {
                return Err(format!("reservation {} not found", id).into());
            }
            let mut r = Reservation {
                id,
                customer_tid: id % 3,
                ..Default::default()
            };
            if id % 5 == 0 {
                r.next_action = NextAction::Deleted;
            }
            r.data_reservation.expiration_reservation = if id % 7 == 0 {
                Date::from_unix(1)
            } else {
                Date::from_unix(i64::MAX / 2)
            };
            Ok(r)
        }

        async fn sign_delete(&self, _: i64, _: i64, _: &str) -> ExplorerResult<()> {
            Err("not supported".to_string().into())
        }

        async fn pool_create(
            &self,
            _: &CapacityReservation,
        ) -> ExplorerResult<CapacityPoolCreateResponse> {
            Err("not supported".to_string().into())
        }

        async fn pool_get(&self, _: i64) -> ExplorerResult<CapacityPool> {
            Err("not supported".to_string().into())
        }

        async fn pools_get_by_owner(&self, _: i64) -> ExplorerResult<Vec<CapacityPool>> {
            Err("not supported".to_string().into())
        }
    }

    async fn collect(mut rx: tokio::sync::mpsc::Receiver<Reservation>) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Some(r) = rx.recv().await {
            ids.push(r.id);
        }
        ids
    }

    #[tokio::test]
    async fn yields_matching_ids_once() {
        let explorer = Arc::new(SyntheticExplorer::default());
        let scanner = Scanner::new(explorer.clone(), 10);
        let rx = scanner.scan(1..200, ScanFilter::owned_by(1), CancellationToken::new());

        let ids = collect(rx).await;
        let unique: BTreeSet<i64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len(), "duplicate results");

        let expected: BTreeSet<i64> = (1..200)
            .filter(|id| id % 3 == 1 && id % 5 != 0 && id % 7 != 0 && id % 11 != 0)
            .collect();
        assert_eq!(unique, expected);
        assert_eq!(explorer.lookups.load(Ordering::SeqCst), 199);
    }

    #[tokio::test]
    async fn include_deleted_and_expired() {
        let explorer = Arc::new(SyntheticExplorer::default());
        let scanner = Scanner::new(explorer, 3);
        let filter = ScanFilter {
            customer_tid: 2,
            include_deleted: true,
            include_expired: true,
        };
        let ids: BTreeSet<i64> = collect(scanner.scan(0..100, filter, CancellationToken::new()))
            .await
            .into_iter()
            .collect();
        let expected: BTreeSet<i64> = (0..100).filter(|id| id % 3 == 2 && id % 11 != 0).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn empty_range_closes() {
        let scanner = Scanner::new(Arc::new(SyntheticExplorer::default()), 0);
        let ids = collect(scanner.scan(5..5, ScanFilter::owned_by(1), CancellationToken::new())).await;
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn cancellation_closes_channel() {
        let explorer = Arc::new(SyntheticExplorer {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let scanner = Scanner::new(explorer.clone(), 2);
        let cancel = CancellationToken::new();
        let rx = scanner.scan(0..100_000, ScanFilter::owned_by(1), cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let ids = tokio::time::timeout(Duration::from_secs(5), collect(rx))
            .await
            .expect("result channel was not closed after cancellation");
        assert!(ids.len() < 100);
        assert!(explorer.lookups.load(Ordering::SeqCst) < 100_000);
    }

    #[tokio::test]
    async fn cancellation_stops_workers_blocked_on_results() {
        let explorer = Arc::new(SyntheticExplorer::default());
        let scanner = Scanner::new(explorer.clone(), 2);
        let cancel = CancellationToken::new();
        // results are never read, so the workers fill the channel and block
        let rx = scanner.scan(0..100_000, ScanFilter::owned_by(1), cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        // every worker holds a handle to the explorer until it exits
        tokio::time::timeout(Duration::from_secs(5), async {
            while Arc::strong_count(&explorer) > 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("workers kept running after cancellation");
        drop(rx);
    }
}
