use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_graceful_shutdown::SubsystemHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::locator::discover;
use crate::navico::state::Status;
use crate::network::find_interface_addr;
use crate::radar::{Controller, RadarError};
use crate::recording::continuous_file_name;
use crate::status::{IndicatorState, StatusIndicator};
use crate::watchdog::{DataWatchDog, ScanWatchDog};

const RECORDING_POLL: Duration = Duration::from_millis(100);

/// Poll the status report until the radar reports `wanted`. Commands are not
/// acknowledged, so this is the only way to know a power command took effect.
pub async fn wait_for_status(
    controller: &Controller,
    wanted: Status,
    retries: u32,
    poll: Duration,
) -> Result<(), RadarError> {
    for attempt in 0..retries {
        if controller.reports().power_status() == Some(wanted) {
            log::debug!("{}: {} after {} polls", controller.key(), wanted, attempt);
            return Ok(());
        }
        controller.get_reports().await;
        sleep(poll).await;
    }
    if controller.reports().power_status() == Some(wanted) {
        return Ok(());
    }
    log::warn!(
        "{}: status {:?} instead of {}",
        controller.key(),
        controller.reports().power_status(),
        wanted
    );
    Err(RadarError::NotTransmitting(retries))
}

async fn wait_for_recording(controller: &Controller) {
    while controller.is_recording() {
        sleep(RECORDING_POLL).await;
    }
}

/// Repeated scan cycles: locate, connect, configure, transmit, record, standby.
pub struct Scanner {
    config: Config,
    indicator: Arc<dyn StatusIndicator>,
}

impl Scanner {
    pub fn new(config: Config, indicator: Arc<dyn StatusIndicator>) -> Self {
        Scanner { config, indicator }
    }

    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), RadarError> {
        let shutdown = subsys.create_cancellation_token();
        let r = match self.scan_loop(&shutdown).await {
            Err(RadarError::Shutdown) => {
                log::info!("Scanner shutdown");
                Ok(())
            }
            r => r,
        };

        if let Err(e) = &r {
            log::error!("Fatal: {}", e);
            self.indicator.error();
            sleep(self.config.fatal_exit_delay()).await;
        }
        self.indicator.power(false);
        r
    }

    async fn scan_loop(&self, shutdown: &CancellationToken) -> Result<(), RadarError> {
        let nic_addr = find_interface_addr(self.config.interface.as_deref())?;
        self.indicator.power(true);

        loop {
            self.cycle(nic_addr, shutdown).await?;
            self.indicator.on_state(IndicatorState::Idle);
            log::info!("Next scan in {:?}", self.config.scan_cycle_delay());
            tokio::select! {
                _ = shutdown.cancelled() => return Err(RadarError::Shutdown),
                _ = sleep(self.config.scan_cycle_delay()) => {}
            }
        }
    }

    async fn cycle(
        &self,
        nic_addr: Ipv4Addr,
        shutdown: &CancellationToken,
    ) -> Result<(), RadarError> {
        let located = tokio::select! {
            _ = shutdown.cancelled() => return Err(RadarError::Shutdown),
            r = discover(
                nic_addr,
                self.config.locate_timeout(),
                self.config.locate_retry(),
            ) => r?,
        };
        let channel = self.config.channel;
        let interfaces = located.interfaces(channel).ok_or_else(|| {
            RadarError::Config(format!("radar {} has no channel {}", located.serial_no, channel))
        })?;

        let key = located.key(channel);
        // A controller dropped while connecting cancels its own tasks
        let mut controller = tokio::select! {
            _ = shutdown.cancelled() => return Err(RadarError::Shutdown),
            r = Controller::connect(
                &key,
                &interfaces,
                self.config.connect_timeout(),
                self.config.keep_alive_interval(),
            ) => r?,
        };
        self.indicator.on_state(IndicatorState::Connected);

        self.session(&mut controller, shutdown).await
    }

    /// Scan until done, failed or shut down. In every case the radar is put back
    /// in standby before disconnecting.
    async fn session(
        &self,
        controller: &mut Controller,
        shutdown: &CancellationToken,
    ) -> Result<(), RadarError> {
        let r = tokio::select! {
            _ = shutdown.cancelled() => Err(RadarError::Shutdown),
            r = self.scan(controller) => r,
        };

        controller.stop_recording_data();
        controller.standby().await;
        controller.disconnect().await;
        r
    }

    async fn scan(&self, controller: &Controller) -> Result<(), RadarError> {
        self.config.radar.apply(controller).await;

        controller.transmit().await;
        wait_for_status(
            controller,
            Status::Transmit,
            self.config.transmit_retries,
            self.config.transmit_poll(),
        )
        .await?;
        self.indicator.on_state(IndicatorState::Transmitting);
        log::info!("{}: {:?}", controller.key(), controller.reports());

        let path = continuous_file_name(&self.config.output_dir);
        let scan_dog = ScanWatchDog::arm(self.config.scan_watchdog());
        let data_dog = DataWatchDog::arm(self.config.data_watchdog(), controller.data_received());
        controller.start_sector_recording(&path, self.config.sectors_to_record);
        self.indicator.on_state(IndicatorState::Recording);

        let r = tokio::select! {
            e = scan_dog.expired() => Err(e),
            e = data_dog.expired() => Err(e),
            _ = wait_for_recording(controller) => Ok(()),
        };
        scan_dog.stand_down();
        data_dog.stand_down();
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radar::tests::FakeRadar;
    use crate::radar::{ControllerState, KEEP_ALIVE_INTERVAL};
    use crate::status::LogIndicator;

    async fn connected(radar: &mut FakeRadar) -> Controller {
        let sockets = radar.sockets.take().unwrap();
        radar.report_status(1).await;
        Controller::start("test", sockets, Duration::from_secs(5), KEEP_ALIVE_INTERVAL)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn transmit_confirmed_by_polling() {
        let mut radar = FakeRadar::new().await;
        let mut controller = connected(&mut radar).await;

        controller.transmit().await;
        let confirm = async {
            radar.receive_command([0x01, 0xc1]).await;
            sleep(Duration::from_millis(150)).await;
            radar.report_status(2).await;
        };
        let (r, ()) = tokio::join!(
            wait_for_status(&controller, Status::Transmit, 20, Duration::from_millis(50)),
            confirm
        );
        assert!(r.is_ok());
        controller.disconnect().await;
    }

    #[tokio::test]
    async fn transmit_not_confirmed() {
        let mut radar = FakeRadar::new().await;
        let mut controller = connected(&mut radar).await;

        let r = wait_for_status(&controller, Status::Transmit, 3, Duration::from_millis(20)).await;
        assert!(matches!(r, Err(RadarError::NotTransmitting(3))));
        controller.disconnect().await;
    }

    #[tokio::test]
    async fn shutdown_puts_radar_in_standby() {
        let mut radar = FakeRadar::new().await;
        let mut controller = connected(&mut radar).await;
        let scanner = Scanner::new(Config::default(), Arc::new(LogIndicator::new()));
        let shutdown = CancellationToken::new();

        let stop = async {
            assert_eq!(radar.receive_command([0x01, 0xc1]).await, [0x01, 0xc1, 0x01]);
            shutdown.cancel();
            radar.receive_command([0x01, 0xc1]).await
        };
        let (r, standby) = tokio::join!(scanner.session(&mut controller, &shutdown), stop);

        assert!(matches!(r, Err(RadarError::Shutdown)));
        assert_eq!(standby, [0x01, 0xc1, 0x00]);
        assert_eq!(controller.state(), ControllerState::Disconnected);
        assert!(!controller.is_recording());
    }
}
