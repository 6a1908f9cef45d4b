//! Host half of the sensor station: scanning and incoming transmissions.
//!
//! A scan is committed in two phases. [`SensorStation::scan`] locks the
//! station and asks the game-state service; the response is held until the
//! requesting client, whose scanning animation has a minimum duration, sends
//! `FinishScan`. Only then do the transmission flags change for everyone.

use crate::error::{GameBrainError, SensorError};
use crate::game_brain::GameBrainRequest;
use crate::replicated::{Outbox, Replicated};
use log::{debug, info, warn};
use shared::{
    CommEvent, Equivalent, GameData, PlayerId, Rpc, ScanResponse, SensorChange, SensorScreen,
    SensorSnapshot, StateChange, TemplateKind,
};

#[derive(Debug, Clone, PartialEq)]
struct PendingScan {
    requester: PlayerId,
    response: Option<ScanResponse>,
}

pub struct SensorStation {
    incoming_transmission: Replicated<bool>,
    incoming_transmission_event: Replicated<Option<CommEvent>>,
    scanning_in_progress: Replicated<bool>,
    current_location_scanned: Replicated<bool>,
    able_to_scan: Replicated<bool>,
    screen: Replicated<SensorScreen>,
    pending_scan: Option<PendingScan>,
    powered: bool,
    outbox: Outbox,
}

impl SensorStation {
    pub fn new() -> Self {
        Self {
            incoming_transmission: Replicated::new(false),
            incoming_transmission_event: Replicated::new(None),
            scanning_in_progress: Replicated::new(false),
            current_location_scanned: Replicated::new(false),
            able_to_scan: Replicated::new(true),
            screen: Replicated::new(SensorScreen::ReadyToScan),
            pending_scan: None,
            powered: true,
            outbox: Outbox::default(),
        }
    }

    pub fn incoming_transmission(&self) -> bool {
        self.incoming_transmission.value()
    }

    pub fn incoming_transmission_event(&self) -> Option<&CommEvent> {
        self.incoming_transmission_event.get().as_ref()
    }

    pub fn scanning_in_progress(&self) -> bool {
        self.scanning_in_progress.value()
    }

    pub fn current_location_scanned(&self) -> bool {
        self.current_location_scanned.value()
    }

    pub fn able_to_scan(&self) -> bool {
        self.able_to_scan.value()
    }

    pub fn screen(&self) -> &SensorScreen {
        self.screen.get()
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn scan_requester(&self) -> Option<PlayerId> {
        self.pending_scan.as_ref().map(|p| p.requester)
    }

    pub fn outbox_mut(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    fn write_flag(&mut self, flag: SensorFlag, value: bool) {
        let (field, change): (&mut Replicated<bool>, fn(bool) -> SensorChange) = match flag {
            SensorFlag::Incoming => (
                &mut self.incoming_transmission,
                SensorChange::IncomingTransmission,
            ),
            SensorFlag::Scanning => (
                &mut self.scanning_in_progress,
                SensorChange::ScanningInProgress,
            ),
            SensorFlag::Scanned => (
                &mut self.current_location_scanned,
                SensorChange::CurrentLocationScanned,
            ),
            SensorFlag::Able => (&mut self.able_to_scan, SensorChange::AbleToScan),
        };
        if field.set(value) {
            self.outbox.change(StateChange::Sensor(change(value)));
        }
    }

    fn write_event(&mut self, event: Option<CommEvent>) {
        if self.incoming_transmission_event.get().is_equivalent(&event) {
            return;
        }
        self.incoming_transmission_event.set(event.clone());
        self.outbox.change(StateChange::Sensor(
            SensorChange::IncomingTransmissionEvent(event),
        ));
    }

    fn show(&mut self, screen: SensorScreen) {
        if self.screen.set(screen.clone()) {
            debug!("Sensor screen {:?}", screen);
            self.outbox
                .change(StateChange::Sensor(SensorChange::Screen(screen)));
        }
    }

    fn template(&self) -> TemplateKind {
        self.incoming_transmission_event()
            .map(|e| e.template)
            .unwrap_or_default()
    }

    /// Starts a scan for `requester`. Double invocations are refused and
    /// leave the first scan's flags in place.
    pub fn scan(&mut self, requester: PlayerId, location_id: &str) -> Result<(), SensorError> {
        if !self.powered {
            warn!("Scan from {} refused: sensor station unpowered", requester);
            return Err(SensorError::Unpowered);
        }
        if self.scanning_in_progress() {
            warn!("Scan from {} refused: already scanning", requester);
            return Err(SensorError::ScanInProgress);
        }
        if !self.able_to_scan() {
            warn!("Scan from {} refused: unable to scan", requester);
            return Err(SensorError::UnableToScan);
        }

        info!("Player {} scanning {}", requester, location_id);
        self.write_flag(SensorFlag::Scanning, true);
        self.write_flag(SensorFlag::Able, false);
        self.show(SensorScreen::Scanning);
        self.pending_scan = Some(PendingScan {
            requester,
            response: None,
        });
        self.outbox.request(GameBrainRequest::Scan {
            requester,
            location_id: location_id.to_string(),
        });
        Ok(())
    }

    pub fn on_scan_response(
        &mut self,
        requester: PlayerId,
        result: Result<ScanResponse, GameBrainError>,
    ) {
        let Some(pending) = self.pending_scan.as_mut() else {
            warn!("Dropping scan response for {}: no scan pending", requester);
            return;
        };
        if pending.requester != requester || pending.response.is_some() {
            warn!("Dropping stale scan response for {}", requester);
            return;
        }

        match result {
            Ok(response) => {
                debug!("Scan response for {}: {:?}", requester, response);
                pending.response = Some(response.clone());
                self.write_flag(SensorFlag::Scanning, false);
                self.outbox.send_to(requester, Rpc::ScanResult { response });
            }
            Err(e) => {
                warn!("Scan for {} failed: {}", requester, e);
                self.pending_scan = None;
                self.write_flag(SensorFlag::Scanning, false);
                self.write_flag(SensorFlag::Able, true);
                self.outbox.send_to(requester, Rpc::ScanFailed);
                self.set_workstation_view_on_enter();
            }
        }
    }

    /// Commits the held scan response. Only the player that started the scan
    /// may finish it.
    pub fn finish_scan(&mut self, player: PlayerId) -> Result<(), SensorError> {
        let requester = match &self.pending_scan {
            Some(PendingScan {
                requester,
                response: Some(_),
            }) => *requester,
            _ => {
                warn!("Finish scan from {} ignored: no response yet", player);
                return Err(SensorError::NoScanResponse);
            }
        };
        if requester != player {
            warn!(
                "Finish scan from {} ignored: scan belongs to {}",
                player, requester
            );
            return Err(SensorError::NotScanRequester(player));
        }

        let Some(response) = self.pending_scan.take().and_then(|p| p.response) else {
            return Err(SensorError::NoScanResponse);
        };
        self.commit_response(response);
        Ok(())
    }

    fn commit_response(&mut self, response: ScanResponse) {
        let waiting = response.event_waiting && response.comm_event.is_some();
        self.write_flag(SensorFlag::Incoming, waiting);
        self.write_event(if waiting { response.comm_event } else { None });
        self.write_flag(SensorFlag::Able, true);
        self.write_flag(SensorFlag::Scanned, true);

        if waiting {
            let template = self.template();
            info!("Incoming transmission ({:?})", template);
            self.show(SensorScreen::IncomingTransmission { template });
        } else {
            info!("Scan found nothing");
            self.show(SensorScreen::NoResults);
        }
    }

    /// Chooses the screen for a player stepping up to the station.
    pub fn set_workstation_view_on_enter(&mut self) {
        if !self.powered {
            self.show(SensorScreen::Off);
            return;
        }

        if self.scanning_in_progress() {
            self.show(SensorScreen::Scanning);
        } else if self.incoming_transmission() {
            self.write_flag(SensorFlag::Able, false);
            let template = self.template();
            self.show(SensorScreen::IncomingTransmission { template });
        } else if self.current_location_scanned() {
            self.show(SensorScreen::RefreshScan);
        } else {
            self.show(SensorScreen::ReadyToScan);
        }
    }

    pub fn play_transmission(&mut self) -> Result<(), SensorError> {
        if !self.powered {
            return Err(SensorError::Unpowered);
        }
        let event = match self.incoming_transmission_event() {
            Some(event) if self.incoming_transmission() => event.clone(),
            _ => {
                warn!("Nothing to play: no incoming transmission");
                return Err(SensorError::NoTransmission);
            }
        };

        info!("Playing transmission {}", event.event_id);
        self.show(SensorScreen::PlayingVideo {
            url: event.video_url.clone(),
        });
        self.outbox.broadcast(Rpc::PlayVideo {
            event_id: event.event_id,
            url: event.video_url,
        });
        Ok(())
    }

    /// Acknowledges the tracked transmission. Acknowledgements for any other
    /// event are stale and dropped.
    pub fn complete_comm_event(&mut self, event_id: &str) -> Result<(), SensorError> {
        match self.incoming_transmission_event() {
            Some(event) if event.event_id == event_id => {}
            Some(_) => {
                warn!("Dropping stale completion for {}", event_id);
                return Err(SensorError::StaleCommEvent(event_id.to_string()));
            }
            None => {
                warn!("Dropping completion for {}: no transmission", event_id);
                return Err(SensorError::NoTransmission);
            }
        }

        info!("Comm event {} complete", event_id);
        self.outbox.request(GameBrainRequest::CompleteCommEvent {
            event_id: event_id.to_string(),
        });
        self.write_flag(SensorFlag::Incoming, false);
        self.write_event(None);
        self.write_flag(SensorFlag::Able, true);
        if self.powered {
            self.show(SensorScreen::TransmissionComplete);
        }
        Ok(())
    }

    /// Returns true if the power flag changed.
    pub fn set_powered(&mut self, powered: bool) -> bool {
        if self.powered == powered {
            return false;
        }
        self.powered = powered;

        if powered {
            self.set_workstation_view_on_enter();
        } else {
            info!("Sensor station lost power");
            self.abort_scan();
            self.show(SensorScreen::Off);
            self.outbox.broadcast(Rpc::StopVideo);
        }
        true
    }

    /// Abandons a scan that can no longer be finished and tells the requester
    /// to drop its lock. A response arriving afterwards is stale.
    fn abort_scan(&mut self) {
        let Some(pending) = self.pending_scan.take() else {
            return;
        };
        warn!("Scan by {} aborted", pending.requester);
        self.write_flag(SensorFlag::Scanning, false);
        self.write_flag(SensorFlag::Able, true);
        self.outbox.send_to(pending.requester, Rpc::ScanFailed);
    }

    /// Drops a pending scan whose requester left; nobody else can finish it.
    pub fn release_requester(&mut self, player: PlayerId) {
        if self.scan_requester() != Some(player) {
            return;
        }
        info!("Scan requester {} left, releasing the scan", player);
        self.pending_scan = None;
        self.write_flag(SensorFlag::Scanning, false);
        self.write_flag(SensorFlag::Able, true);
        self.set_workstation_view_on_enter();
    }

    /// Merges the sensor flags of a game-state snapshot. Skipped while a
    /// scan is pending so the requester's commit is what reveals results.
    pub fn on_game_data(&mut self, data: &GameData) {
        if self.pending_scan.is_some() {
            debug!("Deferring sensor feed merge: scan pending");
            return;
        }

        let before = (
            self.incoming_transmission(),
            self.current_location_scanned(),
            self.incoming_transmission_event().cloned(),
        );

        let incoming = data.incoming_transmission && data.comm_event.is_some();
        self.write_flag(SensorFlag::Incoming, incoming);
        self.write_event(if incoming {
            data.comm_event.clone()
        } else {
            None
        });
        self.write_flag(SensorFlag::Scanned, data.current_location_scanned);
        if !incoming {
            self.write_flag(SensorFlag::Able, true);
        }

        let after = (
            self.incoming_transmission(),
            self.current_location_scanned(),
            self.incoming_transmission_event().cloned(),
        );
        let playing = matches!(self.screen(), SensorScreen::PlayingVideo { .. });
        if before != after && !playing {
            self.set_workstation_view_on_enter();
        }
    }

    pub fn fill_snapshot(&self, snapshot: &mut SensorSnapshot) {
        snapshot.incoming_transmission = self.incoming_transmission();
        snapshot.incoming_transmission_event = self.incoming_transmission_event().cloned();
        snapshot.scanning_in_progress = self.scanning_in_progress();
        snapshot.current_location_scanned = self.current_location_scanned();
        snapshot.able_to_scan = self.able_to_scan();
        snapshot.screen = self.screen().clone();
    }
}

impl Default for SensorStation {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum SensorFlag {
    Incoming,
    Scanning,
    Scanned,
    Able,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replicated::Outgoing;

    fn event(id: &str) -> CommEvent {
        CommEvent {
            event_id: id.to_string(),
            template: TemplateKind::Incoming,
            video_url: format!("videos/{}.mp4", id),
        }
    }

    fn waiting(id: &str) -> ScanResponse {
        ScanResponse {
            event_waiting: true,
            comm_event: Some(event(id)),
        }
    }

    fn requests(station: &mut SensorStation) -> usize {
        station
            .outbox_mut()
            .drain()
            .iter()
            .filter(|o| matches!(o, Outgoing::Request(GameBrainRequest::Scan { .. })))
            .count()
    }

    #[test]
    fn test_scan_locks_station() {
        let mut station = SensorStation::new();
        station.scan(1, "relay").unwrap();

        assert!(station.scanning_in_progress());
        assert!(!station.able_to_scan());
        assert_eq!(station.screen(), &SensorScreen::Scanning);
        assert_eq!(requests(&mut station), 1);
    }

    #[test]
    fn test_scan_double_invocation_is_refused() {
        let mut station = SensorStation::new();
        station.scan(1, "relay").unwrap();
        station.outbox_mut().drain();

        assert_eq!(station.scan(1, "relay"), Err(SensorError::ScanInProgress));
        assert_eq!(station.scan(2, "relay"), Err(SensorError::ScanInProgress));

        assert!(station.scanning_in_progress());
        assert!(!station.able_to_scan());
        assert_eq!(station.scan_requester(), Some(1));
        assert_eq!(requests(&mut station), 0);
    }

    #[test]
    fn test_response_is_held_until_finish() {
        let mut station = SensorStation::new();
        station.scan(1, "relay").unwrap();
        station.outbox_mut().drain();

        assert_eq!(station.finish_scan(1), Err(SensorError::NoScanResponse));

        station.on_scan_response(1, Ok(waiting("e1")));
        assert!(!station.scanning_in_progress());
        assert!(!station.incoming_transmission());
        assert!(station
            .outbox_mut()
            .drain()
            .contains(&Outgoing::To {
                player: 1,
                rpc: Rpc::ScanResult {
                    response: waiting("e1")
                }
            }));

        // Still locked until the requester commits.
        assert_eq!(station.scan(2, "relay"), Err(SensorError::UnableToScan));
        assert_eq!(station.finish_scan(2), Err(SensorError::NotScanRequester(2)));

        station.finish_scan(1).unwrap();
        assert!(station.incoming_transmission());
        assert_eq!(station.incoming_transmission_event(), Some(&event("e1")));
        assert!(station.able_to_scan());
        assert!(station.current_location_scanned());
        assert_eq!(
            station.screen(),
            &SensorScreen::IncomingTransmission {
                template: TemplateKind::Incoming
            }
        );
        assert_eq!(station.finish_scan(1), Err(SensorError::NoScanResponse));
    }

    #[test]
    fn test_empty_scan_shows_no_results() {
        let mut station = SensorStation::new();
        station.scan(4, "dock").unwrap();
        station.on_scan_response(4, Ok(ScanResponse::default()));
        station.finish_scan(4).unwrap();

        assert!(!station.incoming_transmission());
        assert_eq!(station.screen(), &SensorScreen::NoResults);
    }

    #[test]
    fn test_failed_scan_unlocks_station() {
        let mut station = SensorStation::new();
        station.scan(1, "relay").unwrap();
        station.outbox_mut().drain();

        station.on_scan_response(1, Err(GameBrainError::Unavailable("timeout".into())));
        assert!(!station.scanning_in_progress());
        assert!(station.able_to_scan());
        assert_eq!(station.scan_requester(), None);
        assert_eq!(station.screen(), &SensorScreen::ReadyToScan);
        assert!(station.outbox_mut().drain().contains(&Outgoing::To {
            player: 1,
            rpc: Rpc::ScanFailed
        }));
    }

    #[test]
    fn test_view_on_enter_decision_order() {
        let mut station = SensorStation::new();
        station.set_workstation_view_on_enter();
        assert_eq!(station.screen(), &SensorScreen::ReadyToScan);

        station.scan(1, "relay").unwrap();
        station.set_workstation_view_on_enter();
        assert_eq!(station.screen(), &SensorScreen::Scanning);

        station.on_scan_response(1, Ok(ScanResponse::default()));
        station.finish_scan(1).unwrap();
        station.set_workstation_view_on_enter();
        assert_eq!(station.screen(), &SensorScreen::RefreshScan);

        station.scan(1, "relay").unwrap();
        station.on_scan_response(1, Ok(waiting("e2")));
        station.finish_scan(1).unwrap();
        station.set_workstation_view_on_enter();
        assert!(!station.able_to_scan());
        assert!(matches!(
            station.screen(),
            SensorScreen::IncomingTransmission { .. }
        ));
    }

    #[test]
    fn test_play_and_complete_transmission() {
        let mut station = SensorStation::new();
        assert_eq!(station.play_transmission(), Err(SensorError::NoTransmission));

        station.scan(1, "relay").unwrap();
        station.on_scan_response(1, Ok(waiting("e1")));
        station.finish_scan(1).unwrap();
        station.outbox_mut().drain();

        station.play_transmission().unwrap();
        assert_eq!(
            station.screen(),
            &SensorScreen::PlayingVideo {
                url: "videos/e1.mp4".into()
            }
        );
        assert!(station.outbox_mut().drain().contains(&Outgoing::Broadcast(
            Rpc::PlayVideo {
                event_id: "e1".into(),
                url: "videos/e1.mp4".into()
            }
        )));

        assert_eq!(
            station.complete_comm_event("old"),
            Err(SensorError::StaleCommEvent("old".into()))
        );
        assert!(station.incoming_transmission());

        station.complete_comm_event("e1").unwrap();
        assert!(!station.incoming_transmission());
        assert_eq!(station.incoming_transmission_event(), None);
        assert_eq!(station.screen(), &SensorScreen::TransmissionComplete);
        assert!(station.outbox_mut().drain().contains(&Outgoing::Request(
            GameBrainRequest::CompleteCommEvent {
                event_id: "e1".into()
            }
        )));
    }

    #[test]
    fn test_power_off_interrupts_video() {
        let mut station = SensorStation::new();
        station.scan(1, "relay").unwrap();
        station.on_scan_response(1, Ok(waiting("e1")));
        station.finish_scan(1).unwrap();
        station.play_transmission().unwrap();
        station.outbox_mut().drain();

        assert!(station.set_powered(false));
        assert!(!station.set_powered(false));
        assert_eq!(station.screen(), &SensorScreen::Off);
        assert_eq!(station.scan(1, "relay"), Err(SensorError::Unpowered));
        assert!(station
            .outbox_mut()
            .drain()
            .contains(&Outgoing::Broadcast(Rpc::StopVideo)));

        station.set_powered(true);
        assert!(matches!(
            station.screen(),
            SensorScreen::IncomingTransmission { .. }
        ));
    }

    #[test]
    fn test_power_loss_aborts_pending_scan() {
        let mut station = SensorStation::new();
        station.scan(3, "relay").unwrap();
        station.outbox_mut().drain();

        station.set_powered(false);
        assert_eq!(station.scan_requester(), None);
        assert!(!station.scanning_in_progress());
        assert!(station.able_to_scan());
        assert_eq!(station.screen(), &SensorScreen::Off);
        assert!(station.outbox_mut().drain().contains(&Outgoing::To {
            player: 3,
            rpc: Rpc::ScanFailed
        }));

        // The service answers after the power cut; nothing is left to hold it.
        station.on_scan_response(3, Ok(waiting("e1")));
        assert_eq!(station.finish_scan(3), Err(SensorError::NoScanResponse));
        assert!(!station.incoming_transmission());

        station.set_powered(true);
        assert_eq!(station.screen(), &SensorScreen::ReadyToScan);
        station.scan(4, "relay").unwrap();
        assert_eq!(station.scan_requester(), Some(4));
    }

    #[test]
    fn test_power_loss_drops_held_response() {
        let mut station = SensorStation::new();
        station.scan(3, "relay").unwrap();
        station.on_scan_response(3, Ok(waiting("e1")));

        station.set_powered(false);
        station.set_powered(true);
        assert!(!station.incoming_transmission());
        assert!(station.able_to_scan());

        let data = GameData {
            current_location_id: "relay".into(),
            incoming_transmission: true,
            comm_event: Some(event("e1")),
            ..Default::default()
        };
        station.on_game_data(&data);
        assert!(station.incoming_transmission());
    }

    #[test]
    fn test_requester_leaving_releases_scan() {
        let mut station = SensorStation::new();
        station.scan(9, "relay").unwrap();
        station.release_requester(3);
        assert!(station.scanning_in_progress());

        station.release_requester(9);
        assert!(!station.scanning_in_progress());
        assert!(station.able_to_scan());
        station.scan(3, "relay").unwrap();
    }

    #[test]
    fn test_feed_merge_ignores_template_only_change() {
        let mut station = SensorStation::new();
        let mut data = GameData {
            current_location_id: "relay".into(),
            incoming_transmission: true,
            current_location_scanned: true,
            comm_event: Some(event("e1")),
            ..Default::default()
        };
        station.on_game_data(&data);
        assert!(station.incoming_transmission());
        station.outbox_mut().drain();

        data.comm_event = Some(CommEvent {
            template: TemplateKind::Probe,
            ..event("e1")
        });
        station.on_game_data(&data);
        assert!(station.outbox_mut().is_empty());
        assert_eq!(
            station.incoming_transmission_event().map(|e| e.template),
            Some(TemplateKind::Incoming)
        );
    }

    #[test]
    fn test_feed_merge_waits_for_pending_scan() {
        let mut station = SensorStation::new();
        station.scan(1, "relay").unwrap();

        let data = GameData {
            current_location_id: "relay".into(),
            incoming_transmission: true,
            comm_event: Some(event("e1")),
            ..Default::default()
        };
        station.on_game_data(&data);
        assert!(!station.incoming_transmission());
    }
}
