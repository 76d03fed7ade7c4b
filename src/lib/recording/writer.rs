use crossbeam::channel::{Receiver, RecvTimeoutError};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::file_format::{FrameRecord, write_frame};

const IDLE_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub enum WriterMessage {
    Open(PathBuf),
    Frame(FrameRecord),
    Close,
}

/// Consumes the recording queue and appends frames to the current output file.
/// Runs on a blocking thread; it never touches the network.
pub struct Writer {
    key: String,
    rx: Receiver<WriterMessage>,
    file: Option<(PathBuf, BufWriter<File>)>,
    frames_written: u64,
}

impl Writer {
    pub fn new(key: &str, rx: Receiver<WriterMessage>) -> Self {
        Writer {
            key: key.to_string(),
            rx,
            file: None,
            frames_written: 0,
        }
    }

    pub fn run(mut self, cancel: CancellationToken) {
        log::debug!("{}: writer started", self.key);
        loop {
            if cancel.is_cancelled() {
                while let Ok(message) = self.rx.try_recv() {
                    self.handle(message);
                }
                break;
            }
            match self.rx.recv_timeout(IDLE_TIMEOUT) {
                Ok(message) => self.handle(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.close();
        log::debug!("{}: writer stopped", self.key);
    }

    fn handle(&mut self, message: WriterMessage) {
        match message {
            WriterMessage::Open(path) => {
                self.close();
                match open(&path) {
                    Ok(file) => {
                        log::info!("{}: recording to '{}'", self.key, path.display());
                        self.file = Some((path, file));
                    }
                    Err(e) => {
                        log::error!("{}: cannot create '{}': {}", self.key, path.display(), e);
                    }
                }
            }
            WriterMessage::Frame(frame) => {
                let Some((path, file)) = &mut self.file else {
                    log::trace!("{}: no output file, frame dropped", self.key);
                    return;
                };
                match write_frame(file, &frame) {
                    Ok(()) => self.frames_written += 1,
                    Err(e) => {
                        log::error!("{}: write to '{}' failed: {}", self.key, path.display(), e);
                    }
                }
            }
            WriterMessage::Close => self.close(),
        }
    }

    fn close(&mut self) {
        if let Some((path, mut file)) = self.file.take() {
            if let Err(e) = file.flush() {
                log::error!("{}: flush of '{}' failed: {}", self.key, path.display(), e);
            }
            log::info!(
                "{}: closed '{}' after {} frames",
                self.key,
                path.display(),
                self.frames_written
            );
            self.frames_written = 0;
        }
    }
}

fn open(path: &Path) -> std::io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = File::options().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}
