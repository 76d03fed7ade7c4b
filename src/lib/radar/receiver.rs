use anyhow::{Error, bail};
use crossbeam::atomic::AtomicCell;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::{ControllerState, Shared, lock, read, write};
use crate::navico::SPOKES_PER_FRAME;
use crate::navico::data::{FRAME_HEADER_LENGTH, RADAR_LINE_LENGTH, decode_frame};
use crate::navico::report::{Report, decode_report};
use crate::util::PrintableSlice;

const REPORT_BUFFER_SIZE: usize = 1024;
const DATA_BUFFER_SIZE: usize = FRAME_HEADER_LENGTH + SPOKES_PER_FRAME * RADAR_LINE_LENGTH;
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Decodes every report into the shared state. The first report of any kind
/// moves the controller from `Connecting` to `Connected`.
pub(super) async fn report_loop(
    key: String,
    socket: UdpSocket,
    shared: Arc<Shared>,
    state: Arc<AtomicCell<ControllerState>>,
    cancel: CancellationToken,
) {
    log::debug!("{}: listening for reports", key);
    let mut buf = Vec::with_capacity(REPORT_BUFFER_SIZE);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!("{}: report listener stopped", key);
                break;
            }
            r = socket.recv_buf_from(&mut buf) => {
                match r {
                    Ok((_len, addr)) => {
                        log::trace!("{}: {} -> {:02X?}", key, addr, &buf);
                        if let Err(e) = process_report(&key, &buf, &shared, &state) {
                            log::error!("{}: {}", key, e);
                        }
                        buf.clear();
                    }
                    Err(e) => {
                        log::error!("{}: receive report error: {}", key, e);
                        sleep(RECEIVE_ERROR_BACKOFF).await;
                    }
                }
            }
        }
    }
}

pub(super) fn process_report(
    key: &str,
    data: &[u8],
    shared: &Shared,
    state: &AtomicCell<ControllerState>,
) -> Result<(), Error> {
    let report = match decode_report(data) {
        Ok(report) => report,
        Err(e) => bail!("report dropped: {} {}", e, PrintableSlice::new(data)),
    };

    match &report {
        Report::Other(id) => {
            log::trace!("{}: ignoring report {:04X}", key, id);
        }
        Report::Beacon(_) => {
            log::trace!("{}: beacon on report address", key);
        }
        _ => {
            write(&shared.raw_reports).store(&report);
            let mut reports = write(&shared.reports);
            reports.update(&report);
            log::trace!("{}: reports now {:?}", key, reports);
        }
    }

    if !shared.radar_was_detected.swap(true, Ordering::AcqRel) {
        log::info!("{}: radar responded", key);
    }
    if state
        .compare_exchange(ControllerState::Connecting, ControllerState::Connected)
        .is_ok()
    {
        log::info!("{}: connected", key);
    }
    Ok(())
}

/// Decodes spoke frames and hands them to the recorder.
pub(super) async fn data_loop(
    key: String,
    socket: UdpSocket,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    log::debug!("{}: listening for spoke data", key);
    let mut buf = Vec::with_capacity(DATA_BUFFER_SIZE);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!("{}: data listener stopped", key);
                break;
            }
            r = socket.recv_buf_from(&mut buf) => {
                match r {
                    Ok(_) => {
                        process_frame(&key, &buf, &shared);
                        buf.clear();
                    }
                    Err(e) => {
                        log::error!("{}: receive data error: {}", key, e);
                        sleep(RECEIVE_ERROR_BACKOFF).await;
                    }
                }
            }
        }
    }
}

pub(super) fn process_frame(key: &str, data: &[u8], shared: &Shared) {
    shared.data_received.store(true, Ordering::Relaxed);

    let (model, gain) = {
        let reports = read(&shared.reports);
        (
            reports.model,
            reports.settings.map(|s| s.gain as u16).unwrap_or(0),
        )
    };

    match decode_frame(data, model) {
        Ok(frame) => {
            if frame.dropped > 0 {
                log::debug!(
                    "{}: {} of {} spokes invalid",
                    key,
                    frame.dropped,
                    frame.dropped + frame.spokes.len()
                );
            }
            let timestamp = chrono::Utc::now().timestamp() as u32;
            lock(&shared.recorder).process_frame(&frame, timestamp, gain);
        }
        Err(e) => {
            log::warn!("{}: frame dropped: {}", key, e);
        }
    }
}
