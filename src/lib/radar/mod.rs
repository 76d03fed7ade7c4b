use crossbeam::atomic::AtomicCell;
use crossbeam::channel::bounded;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::locator::MulticastInterfaces;
use crate::navico::Model;
use crate::navico::command::{Command, ReportRequest, SeaClutter};
use crate::navico::report::RawReports;
use crate::navico::state::{
    DopplerMode, HaloMode, Level, Reports, ScanSpeed, SeaState, TargetBoost, code_of,
};
use crate::network::{create_multicast_send, create_udp_multicast_listen};
use crate::recording::Recorder;
use crate::recording::writer::{Writer, WriterMessage};

mod receiver;

pub const MIN_RANGE: u32 = 50;
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_millis(5000);
const WAKE_UP_INTERVAL: Duration = Duration::from_millis(500);
const WRITER_QUEUE_LENGTH: usize = 1000;

#[derive(Error, Debug)]
pub enum RadarError {
    #[error("I/O operation failed")]
    Io(#[from] std::io::Error),
    #[error("Interface '{0}' is not available")]
    InterfaceNotFound(String),
    #[error("Interface '{0}' has no valid IPv4 address")]
    InterfaceNoV4(String),
    #[error("Cannot detect Ethernet devices")]
    EnumerationFailed,
    #[error("Radar did not respond within {0:?}")]
    ConnectTimeout(Duration),
    #[error("No radar located within {0:?}")]
    LocateTimeout(Duration),
    #[error("Scan did not complete within {0:?}")]
    ScanTimeout(Duration),
    #[error("No radar data received within {0:?}")]
    DataTimeout(Duration),
    #[error("Radar did not start transmitting after {0} attempts")]
    NotTransmitting(u32),
    #[error("Not connected")]
    NotConnected,
    #[error("Shutdown")]
    Shutdown,
    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Created,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}

/// State written by the listener tasks and read by everyone else.
pub(crate) struct Shared {
    pub(crate) reports: RwLock<Reports>,
    pub(crate) raw_reports: RwLock<RawReports>,
    pub(crate) recorder: Mutex<Recorder>,
    pub(crate) data_received: Arc<AtomicBool>,
    pub(crate) radar_was_detected: AtomicBool,
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The three sockets of a connection.
pub struct Sockets {
    pub report: UdpSocket,
    pub data: UdpSocket,
    pub send: UdpSocket,
}

impl Sockets {
    pub fn open(interfaces: &MulticastInterfaces) -> Result<Self, RadarError> {
        let report = create_udp_multicast_listen(&interfaces.report, &interfaces.nic_addr)?;
        let data = create_udp_multicast_listen(&interfaces.data, &interfaces.nic_addr)?;
        let send = create_multicast_send(&interfaces.send, &interfaces.nic_addr)?;
        log::debug!(
            "Listening for reports on {} and data on {}, sending to {} via {}",
            interfaces.report,
            interfaces.data,
            interfaces.send,
            interfaces.nic_addr
        );
        Ok(Sockets { report, data, send })
    }
}

/// Encodes commands for the current model and sends them. Failures are logged;
/// a lost command is never fatal.
struct CommandSender {
    key: String,
    socket: UdpSocket,
    shared: Arc<Shared>,
}

impl CommandSender {
    async fn send(&self, command: Command) {
        let model = read(&self.shared.reports).model;
        for packet in command.encode(model) {
            match self.socket.send(&packet).await {
                Ok(_) => log::trace!("{}: sent {:?} {:02X?}", self.key, command, packet),
                Err(e) => {
                    log::error!("{}: cannot send {:?}: {}", self.key, command, e);
                    return;
                }
            }
        }
    }

    async fn wake_up(&self) {
        self.send(Command::StayOn).await;
        self.send(Command::RequestReport(ReportRequest::Report03))
            .await;
        self.send(Command::RequestReport(ReportRequest::Many)).await;
    }
}

struct Tasks {
    report: JoinHandle<()>,
    data: JoinHandle<()>,
    writer: JoinHandle<()>,
    keep_alive: JoinHandle<()>,
}

async fn join(key: &str, what: &str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        log::error!("{}: {} task failed: {}", key, what, e);
    }
}

async fn keep_alive_loop(sender: Arc<CommandSender>, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!("{}: keep-alive stopped", sender.key);
                break;
            }
            _ = sleep(interval) => {
                sender.wake_up().await;
            }
        }
    }
}

/// A connection to one radar channel. Owns the sockets and the listener,
/// writer and keep-alive tasks from `connect` until `disconnect`.
pub struct Controller {
    key: String,
    state: Arc<AtomicCell<ControllerState>>,
    shared: Arc<Shared>,
    sender: Arc<CommandSender>,
    cancel: CancellationToken,
    tasks: Option<Tasks>,
}

impl Controller {
    pub async fn connect(
        key: &str,
        interfaces: &MulticastInterfaces,
        connect_timeout: Duration,
        keep_alive_interval: Duration,
    ) -> Result<Controller, RadarError> {
        let sockets = Sockets::open(interfaces)?;
        Self::start(key, sockets, connect_timeout, keep_alive_interval).await
    }

    /// Start the tasks on already opened sockets and wake up the radar.
    pub async fn start(
        key: &str,
        sockets: Sockets,
        connect_timeout: Duration,
        keep_alive_interval: Duration,
    ) -> Result<Controller, RadarError> {
        let state = Arc::new(AtomicCell::new(ControllerState::Created));
        let cancel = CancellationToken::new();
        let (tx, rx) = bounded::<WriterMessage>(WRITER_QUEUE_LENGTH);

        let shared = Arc::new(Shared {
            reports: RwLock::new(Reports::default()),
            raw_reports: RwLock::new(RawReports::default()),
            recorder: Mutex::new(Recorder::new(key, tx)),
            data_received: Arc::new(AtomicBool::new(false)),
            radar_was_detected: AtomicBool::new(false),
        });
        let sender = Arc::new(CommandSender {
            key: key.to_string(),
            socket: sockets.send,
            shared: shared.clone(),
        });

        state.store(ControllerState::Connecting);
        log::info!("{}: connecting", key);

        let tasks = Tasks {
            report: tokio::spawn(receiver::report_loop(
                key.to_string(),
                sockets.report,
                shared.clone(),
                state.clone(),
                cancel.clone(),
            )),
            data: tokio::spawn(receiver::data_loop(
                key.to_string(),
                sockets.data,
                shared.clone(),
                cancel.clone(),
            )),
            writer: {
                let writer = Writer::new(key, rx);
                let cancel = cancel.clone();
                tokio::task::spawn_blocking(move || writer.run(cancel))
            },
            keep_alive: tokio::spawn(keep_alive_loop(
                sender.clone(),
                keep_alive_interval,
                cancel.clone(),
            )),
        };

        let mut controller = Controller {
            key: key.to_string(),
            state,
            shared,
            sender,
            cancel,
            tasks: Some(tasks),
        };

        let deadline = Instant::now() + connect_timeout;
        while !controller.shared.radar_was_detected.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                log::warn!(
                    "{}: radar did not respond within {:?}",
                    key,
                    connect_timeout
                );
                controller.abandon().await;
                return Err(RadarError::ConnectTimeout(connect_timeout));
            }
            controller.sender.wake_up().await;
            sleep(WAKE_UP_INTERVAL.min(deadline.saturating_duration_since(Instant::now()))).await;
        }

        Ok(controller)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> ControllerState {
        self.state.load()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ControllerState::Connected
    }

    /// Snapshot of the typed state.
    pub fn reports(&self) -> Reports {
        read(&self.shared.reports).clone()
    }

    pub fn raw_reports(&self) -> RawReports {
        read(&self.shared.raw_reports).clone()
    }

    pub fn model(&self) -> Model {
        read(&self.shared.reports).model
    }

    /// Flag set by every received data frame, for `DataWatchDog`.
    pub fn data_received(&self) -> Arc<AtomicBool> {
        self.shared.data_received.clone()
    }

    pub async fn send(&self, command: Command) {
        self.sender.send(command).await;
    }

    /// Ask the radar for all report families. The answer arrives asynchronously
    /// in `reports()`.
    pub async fn get_reports(&self) {
        for request in [
            ReportRequest::Report03,
            ReportRequest::Many,
            ReportRequest::Report04,
            ReportRequest::Report02And08,
        ] {
            self.send(Command::RequestReport(request)).await;
        }
    }

    async fn send_setting(&self, command: Command, get_report: bool) {
        log::debug!("{}: {:?}", self.key, command);
        self.send(command).await;
        if get_report {
            self.get_reports().await;
        }
    }

    pub async fn transmit(&self) {
        log::info!("{}: transmit", self.key);
        self.send(Command::Power { transmit: true }).await;
    }

    pub async fn standby(&self) {
        log::info!("{}: standby", self.key);
        self.send(Command::Power { transmit: false }).await;
    }

    /// Range in meters, limited to what the detected model supports.
    pub async fn set_range(&self, meters: u32, get_report: bool) {
        let meters = clamp_range(meters, self.model());
        let decimeters = (meters * 10) as i32;
        self.send_setting(Command::Range { decimeters }, get_report)
            .await;
    }

    pub async fn set_bearing_alignment(&self, degrees: f64, get_report: bool) {
        let deci_degrees = deci_degrees(degrees) as i16;
        self.send_setting(Command::BearingAlignment { deci_degrees }, get_report)
            .await;
    }

    pub async fn set_gain(&self, value: i32, auto: bool, get_report: bool) {
        let value = clamp_byte(value);
        self.send_setting(Command::Gain { auto, value }, get_report)
            .await;
    }

    /// On HALO radars `value` is the auto mode adjustment when `auto` is set.
    pub async fn set_sea_clutter(&self, value: i32, auto: bool, get_report: bool) {
        let sea = match auto {
            true => SeaClutter::Auto(value.clamp(i8::MIN as i32, i8::MAX as i32) as i8),
            false => SeaClutter::Manual(clamp_byte(value)),
        };
        self.send_setting(Command::SeaClutter(sea), get_report).await;
    }

    pub async fn set_rain_clutter(&self, value: i32, get_report: bool) {
        let value = clamp_byte(value);
        self.send_setting(Command::Rain { value }, get_report).await;
    }

    pub async fn set_side_lobe_suppression(&self, value: i32, auto: bool, get_report: bool) {
        let value = clamp_byte(value);
        self.send_setting(Command::SideLobeSuppression { auto, value }, get_report)
            .await;
    }

    pub async fn set_interference_rejection(&self, level: Level, get_report: bool) {
        self.send_setting(Command::InterferenceRejection(code_of(level)), get_report)
            .await;
    }

    pub async fn set_local_interference_rejection(&self, level: Level, get_report: bool) {
        self.send_setting(
            Command::LocalInterferenceRejection(code_of(level)),
            get_report,
        )
        .await;
    }

    pub async fn set_sea_state(&self, sea_state: SeaState, get_report: bool) {
        self.send_setting(Command::SeaState(sea_state), get_report)
            .await;
    }

    pub async fn set_scan_speed(&self, speed: ScanSpeed, get_report: bool) {
        self.send_setting(Command::ScanSpeed(code_of(speed)), get_report)
            .await;
    }

    pub async fn set_mode(&self, mode: HaloMode, get_report: bool) {
        self.send_setting(Command::Mode(mode), get_report).await;
    }

    /// 0 or 1 on 4G, 0 to 3 on HALO.
    pub async fn set_target_expansion(&self, value: u8, get_report: bool) {
        let max = if self.model() == Model::HALO { 3 } else { 1 };
        self.send_setting(Command::TargetExpansion(value.min(max)), get_report)
            .await;
    }

    pub async fn set_target_separation(&self, level: Level, get_report: bool) {
        self.send_setting(Command::TargetSeparation(code_of(level)), get_report)
            .await;
    }

    pub async fn set_target_boost(&self, boost: TargetBoost, get_report: bool) {
        self.send_setting(Command::TargetBoost(code_of(boost)), get_report)
            .await;
    }

    pub async fn set_noise_rejection(&self, level: Level, get_report: bool) {
        self.send_setting(Command::NoiseRejection(code_of(level)), get_report)
            .await;
    }

    pub async fn set_doppler(&self, mode: DopplerMode, get_report: bool) {
        self.send_setting(Command::Doppler(mode), get_report).await;
    }

    pub async fn set_doppler_speed(&self, cm_per_s: u16, get_report: bool) {
        self.send_setting(Command::DopplerSpeed { cm_per_s }, get_report)
            .await;
    }

    pub async fn set_accent_light(&self, level: Level, get_report: bool) {
        self.send_setting(Command::AccentLight(code_of(level)), get_report)
            .await;
    }

    pub async fn set_antenna_height(&self, meters: f64, get_report: bool) {
        let millimeters = (meters * 1000.0).round().clamp(0.0, u16::MAX as f64) as u16;
        self.send_setting(Command::AntennaHeight { millimeters }, get_report)
            .await;
    }

    /// Configure one of the four no-transmit sectors; angles in degrees.
    pub async fn set_sector_blanking(
        &self,
        sector: u8,
        enabled: bool,
        start: f64,
        end: f64,
        get_report: bool,
    ) {
        if sector > 3 {
            log::warn!("{}: no blanking sector {}", self.key, sector);
            return;
        }
        let command = Command::SectorBlanking {
            sector,
            enabled,
            start_deci_degrees: deci_degrees(start) as i16,
            end_deci_degrees: deci_degrees(end) as i16,
        };
        self.send_setting(command, get_report).await;
    }

    pub fn start_sector_recording(&self, path: &Path, sectors_to_record: u32) {
        lock(&self.shared.recorder).start_sector_recording(path, sectors_to_record);
    }

    pub fn start_continuous_recording(&self, output_dir: &Path) -> Option<PathBuf> {
        lock(&self.shared.recorder).start_continuous_recording(output_dir)
    }

    pub fn stop_recording_data(&self) {
        lock(&self.shared.recorder).stop_recording_data();
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.shared.recorder).is_recording()
    }

    /// Stop all tasks, in the order report, data, writer, keep-alive.
    /// Calling it again does nothing.
    pub async fn disconnect(&mut self) {
        let Some(tasks) = self.tasks.take() else {
            return;
        };
        self.state.store(ControllerState::Disconnecting);
        log::info!("{}: disconnecting", self.key);

        self.stop(tasks).await;
        self.state.store(ControllerState::Disconnected);
        log::info!("{}: disconnected", self.key);
    }

    /// Tear down a connection attempt the radar never answered. The state goes
    /// from `Connecting` straight to `Disconnected`.
    async fn abandon(&mut self) {
        if let Some(tasks) = self.tasks.take() {
            self.stop(tasks).await;
        }
        self.state.store(ControllerState::Disconnected);
    }

    async fn stop(&self, tasks: Tasks) {
        self.cancel.cancel();
        join(&self.key, "report", tasks.report).await;
        join(&self.key, "data", tasks.data).await;
        join(&self.key, "writer", tasks.writer).await;
        join(&self.key, "keep-alive", tasks.keep_alive).await;
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub fn clamp_range(meters: u32, model: Model) -> u32 {
    meters.clamp(MIN_RANGE, model.max_range())
}

pub fn clamp_byte(value: i32) -> u8 {
    value.clamp(0, u8::MAX as i32) as u8
}

/// Degrees to deci-degrees in [0, 3600).
pub fn deci_degrees(degrees: f64) -> i32 {
    ((degrees * 10.0).round() as i32).rem_euclid(3600)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::navico::data::tests::{gen4_frame, gen4_line};
    use crate::navico::report::tests::report;
    use crate::navico::state::Status;
    use tokio::time::timeout;

    async fn bind() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    /// The radar side of a loopback connection.
    pub(crate) struct FakeRadar {
        pub(crate) socket: UdpSocket,
        pub(crate) sockets: Option<Sockets>,
        report_addr: std::net::SocketAddr,
        data_addr: std::net::SocketAddr,
    }

    impl FakeRadar {
        pub(crate) async fn new() -> Self {
            let socket = bind().await;
            let report = bind().await;
            let data = bind().await;
            let send = bind().await;
            send.connect(socket.local_addr().unwrap()).await.unwrap();
            FakeRadar {
                report_addr: report.local_addr().unwrap(),
                data_addr: data.local_addr().unwrap(),
                socket,
                sockets: Some(Sockets { report, data, send }),
            }
        }

        pub(crate) async fn receive(&self) -> Vec<u8> {
            let mut buf = [0u8; 64];
            let len = timeout(Duration::from_secs(2), self.socket.recv(&mut buf))
                .await
                .unwrap()
                .unwrap();
            buf[..len].to_vec()
        }

        /// Wait for a packet starting with `id`.
        pub(crate) async fn receive_command(&self, id: [u8; 2]) -> Vec<u8> {
            loop {
                let packet = self.receive().await;
                if packet[0..2] == id {
                    return packet;
                }
            }
        }

        pub(crate) async fn report_status(&self, status: u8) {
            let mut status_report = report(0x01c4, 18);
            status_report[2] = status;
            self.socket
                .send_to(&status_report, self.report_addr)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn connect_and_control() {
        let mut radar = FakeRadar::new().await;
        let sockets = radar.sockets.take().unwrap();

        let connecting = tokio::spawn(Controller::start(
            "test",
            sockets,
            Duration::from_secs(5),
            KEEP_ALIVE_INTERVAL,
        ));
        // The controller wakes the radar up until it answers
        assert_eq!(radar.receive().await, COMMAND_STAY_ON);
        radar.report_status(2).await;

        let mut controller = connecting.await.unwrap().unwrap();
        assert!(controller.is_connected());
        assert_eq!(controller.reports().power_status(), Some(Status::Transmit));
        assert!(controller.raw_reports().status.is_some());

        controller.set_range(100_000, false).await;
        let packet = radar.receive_command([0x03, 0xc1]).await;
        assert_eq!(&packet[2..6], &888_960i32.to_le_bytes());

        controller.set_range(10, false).await;
        let packet = radar.receive_command([0x03, 0xc1]).await;
        assert_eq!(&packet[2..6], &500i32.to_le_bytes());

        controller.standby().await;
        assert_eq!(radar.receive_command([0x00, 0xc1]).await, [0x00, 0xc1, 0x01]);
        assert_eq!(radar.receive().await, [0x01, 0xc1, 0x00]);

        controller.disconnect().await;
        assert_eq!(controller.state(), ControllerState::Disconnected);
        controller.disconnect().await;
        assert_eq!(controller.state(), ControllerState::Disconnected);
    }

    const COMMAND_STAY_ON: [u8; 2] = crate::navico::command::COMMAND_STAY_ON_A;

    #[tokio::test]
    async fn connect_times_out() {
        let mut radar = FakeRadar::new().await;
        let sockets = radar.sockets.take().unwrap();
        let start = Instant::now();

        let r = Controller::start("test", sockets, Duration::from_millis(300), KEEP_ALIVE_INTERVAL)
            .await;

        assert!(matches!(r, Err(RadarError::ConnectTimeout(_))));
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn abandoned_connection_skips_disconnecting() {
        let mut radar = FakeRadar::new().await;
        let sockets = radar.sockets.take().unwrap();
        radar.report_status(1).await;
        let mut controller =
            Controller::start("test", sockets, Duration::from_secs(5), KEEP_ALIVE_INTERVAL)
                .await
                .unwrap();
        controller.state.store(ControllerState::Connecting);

        let state = controller.state.clone();
        let watcher = tokio::spawn(async move {
            let mut seen = vec![state.load()];
            while state.load() != ControllerState::Disconnected {
                if state.load() != seen[seen.len() - 1] {
                    seen.push(state.load());
                }
                tokio::task::yield_now().await;
            }
            seen.push(ControllerState::Disconnected);
            seen
        });

        controller.abandon().await;
        assert!(controller.tasks.is_none());
        assert_eq!(
            watcher.await.unwrap(),
            vec![ControllerState::Connecting, ControllerState::Disconnected]
        );
    }

    #[tokio::test]
    async fn records_spoke_data() {
        let mut radar = FakeRadar::new().await;
        let sockets = radar.sockets.take().unwrap();
        radar.report_status(1).await;
        let mut controller =
            Controller::start("test", sockets, Duration::from_secs(5), KEEP_ALIVE_INTERVAL)
                .await
                .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.bin");
        let flag = controller.data_received();
        controller.start_sector_recording(&path, 1);
        controller.start_sector_recording(&path, 5);

        for angles in [[4000u16, 4095], [0, 1]] {
            let frame = gen4_frame(&[
                gen4_line(angles[0], 0x02, 0x11),
                gen4_line(angles[1], 0x02, 0x11),
            ]);
            radar.socket.send_to(&frame, radar.data_addr).await.unwrap();
        }

        timeout(Duration::from_secs(2), async {
            while controller.is_recording() {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(flag.load(Ordering::Relaxed));

        controller.disconnect().await;
        let bytes = std::fs::read(&path).unwrap();
        let mut r = std::io::Cursor::new(bytes);
        let frame = crate::recording::file_format::read_frame(&mut r)
            .unwrap()
            .unwrap();
        assert_eq!(frame.header.spoke_count, 2);
        assert_eq!(frame.spokes[1].angle, 4095);
        assert!(
            crate::recording::file_format::read_frame(&mut r)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn clamping() {
        assert_eq!(clamp_range(10, Model::HALO), 50);
        assert_eq!(clamp_range(100_000, Model::Unknown), 88_896);
        assert_eq!(clamp_range(100_000, Model::HALO), 100_000);
        assert_eq!(clamp_range(30_000, Model::BR24), 30_000);
        assert_eq!(clamp_byte(-5), 0);
        assert_eq!(clamp_byte(300), 255);
        assert_eq!(deci_degrees(-10.0), 3500);
        assert_eq!(deci_degrees(360.0), 0);
        assert_eq!(deci_degrees(12.34), 123);
    }

    #[test]
    fn report_moves_to_connected() {
        let (tx, _rx) = bounded(1);
        let shared = Shared {
            reports: RwLock::new(Reports::default()),
            raw_reports: RwLock::new(RawReports::default()),
            recorder: Mutex::new(Recorder::new("test", tx)),
            data_received: Arc::new(AtomicBool::new(false)),
            radar_was_detected: AtomicBool::new(false),
        };
        let state = AtomicCell::new(ControllerState::Connecting);

        assert!(receiver::process_report("test", &[0x01, 0xc4, 0x02], &shared, &state).is_err());
        assert_eq!(state.load(), ControllerState::Connecting);

        let mut settings = report(0x02c4, 99);
        settings[2..6].copy_from_slice(&18520i32.to_le_bytes());
        receiver::process_report("test", &settings, &shared, &state).unwrap();
        assert_eq!(state.load(), ControllerState::Connected);
        assert!(shared.radar_was_detected.load(Ordering::Relaxed));
        assert_eq!(read(&shared.reports).settings.unwrap().range_m, 1852.0);
        assert!(read(&shared.reports).status.is_none());
    }
}
