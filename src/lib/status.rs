use std::sync::Mutex;

use strum::Display;

/// What the operator sees on the status LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum IndicatorState {
    Idle,
    Connected,
    Transmitting,
    Recording,
}

/// The LED and power relay hardware. Implementations must be cheap; they are
/// called from the scan loop.
pub trait StatusIndicator: Send + Sync {
    fn on_state(&self, state: IndicatorState);

    /// Persistent failure signal, shown until the process exits.
    fn error(&self);

    fn power(&self, on: bool);
}

/// Indicator without hardware: transitions are logged.
#[derive(Default)]
pub struct LogIndicator {
    state: Mutex<Option<IndicatorState>>,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<IndicatorState> {
        self.state.lock().ok().and_then(|s| *s)
    }
}

impl StatusIndicator for LogIndicator {
    fn on_state(&self, state: IndicatorState) {
        if let Ok(mut current) = self.state.lock() {
            if *current != Some(state) {
                log::info!("Status: {}", state);
                *current = Some(state);
            }
        }
    }

    fn error(&self) {
        log::error!("Status: ERROR");
    }

    fn power(&self, on: bool) {
        log::info!("Radar power {}", if on { "on" } else { "off" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_indicator_tracks_state() {
        let indicator = LogIndicator::new();
        assert_eq!(indicator.state(), None);
        indicator.on_state(IndicatorState::Connected);
        indicator.on_state(IndicatorState::Recording);
        indicator.on_state(IndicatorState::Recording);
        assert_eq!(indicator.state(), Some(IndicatorState::Recording));
        assert_eq!(IndicatorState::Transmitting.to_string(), "Transmitting");
    }
}
