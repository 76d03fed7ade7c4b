use chrono::Local;
use crossbeam::channel::{Sender, TrySendError};
use std::path::{Path, PathBuf};

use crate::navico::NAVICO_SPOKES_RAW;
use crate::navico::data::Frame;

pub mod file_format;
pub mod writer;

use file_format::FrameRecord;
use writer::WriterMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingMode {
    Sectors(u32),
    Continuous,
}

/// Detects completed rotations from the azimuth of successive spokes.
///
/// The scan number cannot be used for this: HALO only sends its low byte.
/// A rotation completes when, after the azimuth has gone past the first one seen,
/// it falls below that first azimuth or wraps around by more than half a turn.
/// Smaller backward steps come from reordered or repeated frames and are ignored.
#[derive(Debug, Clone, Default)]
struct RotationCounter {
    first: Option<u16>,
    previous: Option<u16>,
    exceeded: bool,
    rotations: u32,
}

impl RotationCounter {
    /// Returns true when `angle` completes a rotation.
    fn track(&mut self, angle: u16) -> bool {
        let first = *self.first.get_or_insert(angle);
        let wrapped = self
            .previous
            .is_some_and(|previous| previous > angle && previous - angle > NAVICO_SPOKES_RAW / 2);
        self.previous = Some(angle);

        if self.exceeded && (angle < first || wrapped) {
            self.exceeded = angle > first;
            self.rotations += 1;
            return true;
        }
        if angle > first {
            self.exceeded = true;
        }
        false
    }
}

#[derive(Debug)]
struct Session {
    mode: RecordingMode,
    rotations: RotationCounter,
}

/// Owns the recording session. Frames from the data listener are passed
/// through `process_frame`, which forwards them to the writer queue.
pub struct Recorder {
    key: String,
    tx: Sender<WriterMessage>,
    session: Option<Session>,
    frames_dropped: u64,
}

impl Recorder {
    pub fn new(key: &str, tx: Sender<WriterMessage>) -> Self {
        Recorder {
            key: key.to_string(),
            tx,
            session: None,
            frames_dropped: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Rotations completed in the current session.
    pub fn rotations(&self) -> u32 {
        self.session
            .as_ref()
            .map(|s| s.rotations.rotations)
            .unwrap_or(0)
    }

    pub fn start_sector_recording(&mut self, path: &Path, sectors_to_record: u32) {
        if self.already_recording() {
            return;
        }
        log::info!(
            "{}: recording {} rotations to '{}'",
            self.key,
            sectors_to_record,
            path.display()
        );
        self.start(path.to_path_buf(), RecordingMode::Sectors(sectors_to_record));
    }

    /// Record to a new timestamped file in `output_dir` until stopped.
    pub fn start_continuous_recording(&mut self, output_dir: &Path) -> Option<PathBuf> {
        if self.already_recording() {
            return None;
        }
        let path = continuous_file_name(output_dir);
        log::info!("{}: recording continuously to '{}'", self.key, path.display());
        self.start(path.clone(), RecordingMode::Continuous);
        Some(path)
    }

    pub fn stop_recording_data(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!(
                "{}: recording stopped after {} rotations",
                self.key,
                session.rotations.rotations
            );
            self.control(WriterMessage::Close);
        }
    }

    fn already_recording(&self) -> bool {
        if let Some(session) = &self.session {
            log::warn!(
                "{}: already recording ({:?}), start request ignored",
                self.key,
                session.mode
            );
            return true;
        }
        false
    }

    fn start(&mut self, path: PathBuf, mode: RecordingMode) {
        self.session = Some(Session {
            mode,
            rotations: RotationCounter::default(),
        });
        self.control(WriterMessage::Open(path));
    }

    /// Queue the spokes of `frame` for writing, up to the end of the last
    /// rotation of a sector recording.
    pub fn process_frame(&mut self, frame: &Frame, timestamp: u32, gain: u16) {
        let Some(session) = &mut self.session else {
            return;
        };

        let mut spokes = frame.spokes.len();
        let mut complete = false;
        for (i, spoke) in frame.spokes.iter().enumerate() {
            if !session.rotations.track(spoke.angle) {
                continue;
            }
            log::debug!(
                "{}: rotation {} complete at angle {}",
                self.key,
                session.rotations.rotations,
                spoke.angle
            );
            if let RecordingMode::Sectors(sectors) = session.mode {
                if session.rotations.rotations >= sectors {
                    spokes = i;
                    complete = true;
                    break;
                }
            }
        }

        if spokes > 0 {
            self.queue(FrameRecord::new(frame, spokes, timestamp, gain));
        }
        if complete {
            self.stop_recording_data();
        }
    }

    /// Frames are dropped when the writer falls behind, so the listener never
    /// waits for the disk.
    fn queue(&mut self, record: FrameRecord) {
        match self.tx.try_send(WriterMessage::Frame(record)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.frames_dropped += 1;
                log::warn!(
                    "{}: writer queue full, {} frames dropped",
                    self.key,
                    self.frames_dropped
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("{}: writer is gone", self.key);
            }
        }
    }

    /// Open and close must reach the writer, or frames end up in the wrong file.
    fn control(&self, message: WriterMessage) {
        if self.tx.send(message).is_err() {
            log::error!("{}: writer is gone", self.key);
        }
    }
}

pub fn continuous_file_name(output_dir: &Path) -> PathBuf {
    output_dir.join(format!("{}.bin", Local::now().format("%Y%m%d_%H%M%S")))
}
