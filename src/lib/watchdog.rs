//
// Single-shot supervisors for one scan cycle. A watchdog is armed at the start
// of the cycle and either stood down when the work completes or fires, after
// which the cycle is aborted with the matching error.
//

use std::future::pending;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::radar::RadarError;

pub struct ScanWatchDog {
    interval: Duration,
    deadline: Instant,
    stand_down: CancellationToken,
}

impl ScanWatchDog {
    pub fn arm(interval: Duration) -> Self {
        log::debug!("Scan watchdog armed for {:?}", interval);
        ScanWatchDog {
            interval,
            deadline: Instant::now() + interval,
            stand_down: CancellationToken::new(),
        }
    }

    pub fn stand_down(&self) {
        self.stand_down.cancel();
    }

    /// Resolves with `ScanTimeout` when the interval passes. Never resolves
    /// once stood down.
    pub async fn expired(&self) -> RadarError {
        tokio::select! {
            _ = self.stand_down.cancelled() => pending().await,
            _ = sleep_until(self.deadline) => {
                log::error!("Scan did not complete within {:?}", self.interval);
                RadarError::ScanTimeout(self.interval)
            }
        }
    }
}

/// Fires when an interval passes without the data listener setting the
/// shared `data_received` flag.
pub struct DataWatchDog {
    interval: Duration,
    data_received: Arc<AtomicBool>,
    stand_down: CancellationToken,
}

impl DataWatchDog {
    pub fn arm(interval: Duration, data_received: Arc<AtomicBool>) -> Self {
        log::debug!("Data watchdog armed for {:?}", interval);
        data_received.store(false, Ordering::Relaxed);
        DataWatchDog {
            interval,
            data_received,
            stand_down: CancellationToken::new(),
        }
    }

    pub fn stand_down(&self) {
        self.stand_down.cancel();
    }

    /// Check and clear the flag.
    pub fn check(&self) -> Result<(), RadarError> {
        if self.data_received.swap(false, Ordering::Relaxed) {
            Ok(())
        } else {
            Err(RadarError::DataTimeout(self.interval))
        }
    }

    pub async fn expired(&self) -> RadarError {
        loop {
            tokio::select! {
                _ = self.stand_down.cancelled() => return pending().await,
                _ = sleep(self.interval) => {
                    if let Err(e) = self.check() {
                        log::error!("No radar data received within {:?}", self.interval);
                        return e;
                    }
                    log::trace!("Data watchdog: data received");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const UNIT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn scan_watchdog_fires() {
        let start = Instant::now();
        let dog = ScanWatchDog::arm(UNIT);
        let e = dog.expired().await;
        assert!(matches!(e, RadarError::ScanTimeout(i) if i == UNIT));
        assert!(start.elapsed() >= UNIT);
    }

    #[tokio::test]
    async fn scan_watchdog_stood_down() {
        let dog = ScanWatchDog::arm(UNIT);
        dog.stand_down();
        assert!(timeout(UNIT * 2, dog.expired()).await.is_err());
    }

    #[tokio::test]
    async fn data_watchdog_fires_without_data() {
        let start = Instant::now();
        let flag = Arc::new(AtomicBool::new(true));
        let dog = DataWatchDog::arm(UNIT, flag);

        let e = timeout(UNIT * 3 / 2, dog.expired()).await.unwrap();
        assert!(matches!(e, RadarError::DataTimeout(_)));
        assert!(start.elapsed() >= UNIT);
    }

    #[tokio::test]
    async fn data_watchdog_fed() {
        let flag = Arc::new(AtomicBool::new(false));
        let dog = DataWatchDog::arm(UNIT, flag.clone());

        let feeder = tokio::spawn(async move {
            for _ in 0..12 {
                flag.store(true, Ordering::Relaxed);
                sleep(UNIT / 4).await;
            }
        });
        assert!(timeout(UNIT * 5 / 2, dog.expired()).await.is_err());
        feeder.abort();
    }

    #[tokio::test]
    async fn data_watchdog_stood_down() {
        let dog = DataWatchDog::arm(UNIT, Arc::new(AtomicBool::new(false)));
        dog.stand_down();
        assert!(timeout(UNIT * 2, dog.expired()).await.is_err());
    }

    #[test]
    fn data_check_clears_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let dog = DataWatchDog::arm(UNIT, flag.clone());
        flag.store(true, Ordering::Relaxed);
        assert!(dog.check().is_ok());
        assert!(dog.check().is_err());
    }
}
