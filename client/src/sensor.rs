//! Client half of the sensor station.
//!
//! A scan locks the terminal locally the moment it is requested and keeps the
//! scanning screen up for at least [`SCAN_DURATION`]. The host's answer is
//! only committed (via `FinishScan`) once that timer has run out, so a fast
//! response never cuts the animation short.

use crate::mirror::ShipMirror;
use log::{debug, info, warn};
use shared::{Command, ScanResponse, SensorChange, WorkstationId, SCAN_DURATION};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct LocalScan {
    started: Instant,
    response: Option<ScanResponse>,
}

#[derive(Debug)]
pub struct SensorTerminal {
    scan: Option<LocalScan>,
    duration: Duration,
}

impl SensorTerminal {
    pub fn new() -> Self {
        Self::with_duration(SCAN_DURATION)
    }

    pub fn with_duration(duration: Duration) -> Self {
        Self {
            scan: None,
            duration,
        }
    }

    /// True while this terminal holds its own optimistic scan lock.
    pub fn is_scanning(&self) -> bool {
        self.scan.is_some()
    }

    pub fn has_response(&self) -> bool {
        self.scan.as_ref().is_some_and(|s| s.response.is_some())
    }

    /// Starts a scan if the mirrored station allows one.
    pub fn request_scan(&mut self, mirror: &ShipMirror, now: Instant) -> Option<Command> {
        if !mirror.is_powered(WorkstationId::SensorStation) {
            warn!("Sensor station has no power");
            return None;
        }

        let sensor = &mirror.state().sensor;
        if self.scan.is_some() || sensor.scanning_in_progress || !sensor.able_to_scan {
            warn!("Scan refused: a scan is running or scanning is disabled");
            return None;
        }

        info!("Scanning...");
        self.scan = Some(LocalScan {
            started: now,
            response: None,
        });
        Some(Command::Scan)
    }

    pub fn on_scan_result(&mut self, response: ScanResponse) {
        match &mut self.scan {
            Some(scan) => {
                debug!("Scan response held (event waiting: {})", response.event_waiting);
                scan.response = Some(response);
            }
            None => warn!("Scan response arrived with no local scan"),
        }
    }

    pub fn on_scan_failed(&mut self) {
        if self.scan.take().is_some() {
            warn!("Scan failed, terminal unlocked");
        }
    }

    /// Drops a lock the host never granted. Scanning only becomes possible
    /// again after some other scan has ended, so a local scan still waiting
    /// for its answer at that point was refused.
    pub fn on_sensor_change(&mut self, change: &SensorChange) {
        if *change != SensorChange::AbleToScan(true) || self.has_response() {
            return;
        }
        if self.scan.take().is_some() {
            warn!("Another scan ended first, terminal unlocked");
        }
    }

    /// Returns `FinishScan` once the scanning screen has run its course and
    /// the host has answered.
    pub fn update(&mut self, now: Instant) -> Option<Command> {
        let scan = self.scan.as_ref()?;
        if scan.response.is_none() || now.duration_since(scan.started) < self.duration {
            return None;
        }

        self.scan = None;
        info!("Scan finished");
        Some(Command::FinishScan)
    }

    pub fn on_video_finished(&self, mirror: &ShipMirror, url: &str) -> Option<Command> {
        match mirror.incoming_transmission_event() {
            Some(event) if event.video_url == url => Some(Command::CompleteCommEvent {
                event_id: event.event_id.clone(),
            }),
            _ => {
                warn!("Finished video {} is not the tracked transmission", url);
                None
            }
        }
    }

    pub fn on_translation_error(&self, mirror: &ShipMirror, event_id: &str) -> Option<Command> {
        match mirror.incoming_transmission_event() {
            Some(event) if event.event_id == event_id => Some(Command::CompleteCommEvent {
                event_id: event.event_id.clone(),
            }),
            _ => {
                warn!("Translation error for stale event {}", event_id);
                None
            }
        }
    }
}

impl Default for SensorTerminal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{CommEvent, ShipSnapshot, StateChange, TemplateKind};

    fn ready_mirror() -> ShipMirror {
        let mut mirror = ShipMirror::new();
        let mut snapshot = ShipSnapshot::default();
        snapshot.sensor.able_to_scan = true;
        mirror.apply_snapshot(snapshot);
        mirror
    }

    fn tracked(mirror: &mut ShipMirror, id: &str, url: &str) {
        mirror.apply_change(StateChange::Sensor(SensorChange::IncomingTransmissionEvent(
            Some(CommEvent {
                event_id: id.to_string(),
                template: TemplateKind::Incoming,
                video_url: url.to_string(),
            }),
        )));
    }

    #[test]
    fn test_scan_locks_locally() {
        let mirror = ready_mirror();
        let mut terminal = SensorTerminal::new();
        let now = Instant::now();

        assert_eq!(terminal.request_scan(&mirror, now), Some(Command::Scan));
        assert!(terminal.is_scanning());
        assert_eq!(terminal.request_scan(&mirror, now), None);
    }

    #[test]
    fn test_scan_refused_when_unable() {
        let mut mirror = ready_mirror();
        mirror.apply_change(StateChange::Sensor(SensorChange::AbleToScan(false)));

        let mut terminal = SensorTerminal::new();
        assert_eq!(terminal.request_scan(&mirror, Instant::now()), None);
        assert!(!terminal.is_scanning());
    }

    #[test]
    fn test_finish_waits_for_timer_and_response() {
        let mirror = ready_mirror();
        let mut terminal = SensorTerminal::new();
        let start = Instant::now();
        terminal.request_scan(&mirror, start);

        // Instant response: still inside the scanning window.
        terminal.on_scan_result(ScanResponse::default());
        assert_eq!(terminal.update(start + Duration::from_secs(1)), None);

        assert_eq!(
            terminal.update(start + SCAN_DURATION),
            Some(Command::FinishScan)
        );
        assert!(!terminal.is_scanning());
        assert_eq!(terminal.update(start + SCAN_DURATION * 2), None);
    }

    #[test]
    fn test_timer_alone_does_not_finish() {
        let mirror = ready_mirror();
        let mut terminal = SensorTerminal::new();
        let start = Instant::now();
        terminal.request_scan(&mirror, start);

        assert_eq!(terminal.update(start + SCAN_DURATION * 3), None);
        assert!(terminal.is_scanning());
    }

    #[test]
    fn test_failed_scan_releases_lock() {
        let mirror = ready_mirror();
        let mut terminal = SensorTerminal::new();
        terminal.request_scan(&mirror, Instant::now());

        terminal.on_scan_failed();
        assert!(!terminal.is_scanning());
    }

    #[test]
    fn test_another_scan_ending_releases_refused_lock() {
        let mut mirror = ready_mirror();
        let mut terminal = SensorTerminal::new();
        let start = Instant::now();
        assert_eq!(terminal.request_scan(&mirror, start), Some(Command::Scan));

        // Someone else's scan won; it runs and commits.
        for change in [
            SensorChange::ScanningInProgress(true),
            SensorChange::AbleToScan(false),
            SensorChange::ScanningInProgress(false),
            SensorChange::AbleToScan(true),
        ] {
            mirror.apply_change(StateChange::Sensor(change.clone()));
            terminal.on_sensor_change(&change);
        }

        assert!(!terminal.is_scanning());
        assert_eq!(terminal.update(start + SCAN_DURATION * 10), None);
        assert_eq!(
            terminal.request_scan(&mirror, start + SCAN_DURATION * 10),
            Some(Command::Scan)
        );
    }

    #[test]
    fn test_held_response_survives_sensor_changes() {
        let mirror = ready_mirror();
        let mut terminal = SensorTerminal::new();
        let start = Instant::now();
        terminal.request_scan(&mirror, start);
        terminal.on_scan_result(ScanResponse::default());

        terminal.on_sensor_change(&SensorChange::AbleToScan(true));
        assert!(terminal.is_scanning());
        assert_eq!(
            terminal.update(start + SCAN_DURATION),
            Some(Command::FinishScan)
        );
    }

    #[test]
    fn test_video_finished_gates_on_tracked_url() {
        let mut mirror = ready_mirror();
        tracked(&mut mirror, "e2", "video/e2.mp4");
        let terminal = SensorTerminal::new();

        assert_eq!(terminal.on_video_finished(&mirror, "video/e1.mp4"), None);
        assert_eq!(
            terminal.on_video_finished(&mirror, "video/e2.mp4"),
            Some(Command::CompleteCommEvent {
                event_id: "e2".to_string()
            })
        );
    }

    #[test]
    fn test_translation_error_gates_on_event_id() {
        let mut mirror = ready_mirror();
        let terminal = SensorTerminal::new();
        assert_eq!(terminal.on_translation_error(&mirror, "e1"), None);

        tracked(&mut mirror, "e1", "video/e1.mp4");
        assert!(terminal.on_translation_error(&mirror, "e1").is_some());
        assert_eq!(terminal.on_translation_error(&mirror, "e0"), None);
    }
}
