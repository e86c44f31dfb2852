use std::collections::BTreeMap;

use tokio::sync::mpsc;

use crate::engine::BattleEngine;
use crate::types::{ActorId, Team};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Debug)]
struct Session {
    external_id: Option<String>,
    team: Team,
    tx: mpsc::Sender<OutboundMessage>,
}

/// A member as seen at one instant; handed to settlement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub session_id: ActorId,
    pub external_id: Option<String>,
    pub team: Team,
}

/// Membership of one game instance. Lives behind the same lock as the
/// engine, so admission, eviction and fan-out never race a tick.
#[derive(Debug)]
pub struct Hub {
    sessions: BTreeMap<ActorId, Session>,
    next_team: Team,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_team: Team::Bottom,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Adds a session. Unseen identities get the next side in rotation and a
    /// freshly dealt economy; identities the engine already tracks keep
    /// their side.
    pub fn admit(
        &mut self,
        engine: &mut BattleEngine,
        session_id: ActorId,
        external_id: Option<String>,
        tx: mpsc::Sender<OutboundMessage>,
    ) -> Team {
        let team = match engine.team_of(&session_id) {
            Some(team) => team,
            None => {
                let team = self.next_team;
                self.next_team = team.opponent();
                engine.register_actor(&session_id, team)
            }
        };
        tracing::info!(
            session = %session_id,
            user = external_id.as_deref().unwrap_or("-"),
            team = team.index(),
            "player joined"
        );
        self.sessions.insert(
            session_id,
            Session {
                external_id,
                team,
                tx,
            },
        );
        team
    }

    /// Removes a session and closes its queue. Absent sessions are a no-op.
    pub fn evict(&mut self, engine: &mut BattleEngine, session_id: &str) -> bool {
        let Some(session) = self.sessions.remove(session_id) else {
            return false;
        };
        engine.forget_actor(session_id);
        drop(session.tx);
        tracing::info!(session = %session_id, remaining = self.sessions.len(), "player left");
        true
    }

    pub fn members(&self) -> Vec<Participant> {
        self.sessions
            .iter()
            .map(|(session_id, session)| Participant {
                session_id: session_id.clone(),
                external_id: session.external_id.clone(),
                team: session.team,
            })
            .collect()
    }

    /// Serializes one personalized state message per member, then enqueues
    /// them without blocking. Members whose queue is full or closed are
    /// evicted. Returns how many were dropped.
    pub fn fan_out(&mut self, engine: &mut BattleEngine) -> usize {
        let frame = engine.frame();
        let mut payloads = Vec::with_capacity(self.sessions.len());
        for (session_id, session) in &self.sessions {
            let message = frame.personalize(engine.hand_view(session_id), session.team);
            match serde_json::to_string(&message) {
                Ok(text) => payloads.push((session_id.clone(), text)),
                Err(error) => {
                    tracing::error!(session = %session_id, %error, "failed to encode state");
                }
            }
        }

        let mut unresponsive = Vec::new();
        for (session_id, text) in payloads {
            let Some(session) = self.sessions.get(&session_id) else {
                continue;
            };
            if session.tx.try_send(OutboundMessage::Text(text)).is_err() {
                unresponsive.push(session_id);
            }
        }

        for session_id in &unresponsive {
            tracing::warn!(session = %session_id, "outbound queue full; dropping client");
            self.evict(engine, session_id);
        }
        unresponsive.len()
    }

    /// Asks every writer to send a close frame, e.g. on shutdown.
    pub fn close_all(&mut self, code: u16, reason: &str) {
        for session in self.sessions.values() {
            let _ = session.tx.try_send(OutboundMessage::Close {
                code,
                reason: reason.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::EngineOptions;
    use crate::units::UnitCatalog;

    fn engine() -> BattleEngine {
        BattleEngine::new(UnitCatalog::towers_only(), EngineOptions::default(), 42)
    }

    fn admit(
        hub: &mut Hub,
        engine: &mut BattleEngine,
        id: &str,
        capacity: usize,
    ) -> (Team, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let team = hub.admit(engine, id.to_string(), Some(format!("user-{id}")), tx);
        (team, rx)
    }

    fn next_state(rx: &mut mpsc::Receiver<OutboundMessage>) -> Value {
        match rx.try_recv().expect("a message is queued") {
            OutboundMessage::Text(text) => serde_json::from_str(&text).expect("valid json"),
            other => panic!("expected text message, got {other:?}"),
        }
    }

    #[test]
    fn admit_alternates_sides_and_deals_economy() {
        let mut hub = Hub::new();
        let mut engine = engine();
        let (first, _rx1) = admit(&mut hub, &mut engine, "p-1", 4);
        let (second, _rx2) = admit(&mut hub, &mut engine, "p-2", 4);
        let (third, _rx3) = admit(&mut hub, &mut engine, "p-3", 4);

        assert_eq!(first, Team::Bottom);
        assert_eq!(second, Team::Top);
        assert_eq!(third, Team::Bottom);
        assert_eq!(hub.len(), 3);
        assert!(engine.economy("p-2").is_some());
    }

    #[test]
    fn known_identity_keeps_its_side() {
        let mut hub = Hub::new();
        let mut engine = engine();
        engine.register_actor("p-9", Team::Top);
        let (team, _rx) = admit(&mut hub, &mut engine, "p-9", 4);
        assert_eq!(team, Team::Top);

        let (next, _rx2) = admit(&mut hub, &mut engine, "p-10", 4);
        assert_eq!(next, Team::Bottom);
    }

    #[test]
    fn evict_is_idempotent_and_closes_queue() {
        let mut hub = Hub::new();
        let mut engine = engine();
        let (_, mut rx) = admit(&mut hub, &mut engine, "p-1", 4);

        assert!(hub.evict(&mut engine, "p-1"));
        assert!(!hub.evict(&mut engine, "p-1"));
        assert!(hub.is_empty());
        assert!(engine.economy("p-1").is_none());
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn fan_out_personalizes_each_message() {
        let mut hub = Hub::new();
        let mut engine = engine();
        let (_, mut rx_bottom) = admit(&mut hub, &mut engine, "p-1", 4);
        let (_, mut rx_top) = admit(&mut hub, &mut engine, "p-2", 4);

        assert_eq!(hub.fan_out(&mut engine), 0);

        let bottom = next_state(&mut rx_bottom);
        let top = next_state(&mut rx_top);
        assert_eq!(bottom["myTeam"], 0);
        assert_eq!(top["myTeam"], 1);
        assert_eq!(bottom["entities"], top["entities"]);
        assert_eq!(
            bottom["me"]["hand"],
            serde_json::to_value(engine.economy("p-1").expect("p-1").hand()).expect("hand")
        );
        assert_eq!(
            top["me"]["hand"],
            serde_json::to_value(engine.economy("p-2").expect("p-2").hand()).expect("hand")
        );
    }

    #[test]
    fn full_queue_drops_the_slow_consumer_only() {
        let mut hub = Hub::new();
        let mut engine = engine();
        let (_, _slow_rx) = admit(&mut hub, &mut engine, "slow", 1);
        let (_, mut fast_rx) = admit(&mut hub, &mut engine, "fast", 8);

        assert_eq!(hub.fan_out(&mut engine), 0);
        assert_eq!(hub.fan_out(&mut engine), 1);

        assert!(!hub.contains("slow"));
        assert!(hub.contains("fast"));
        assert!(engine.economy("slow").is_none());
        next_state(&mut fast_rx);
        next_state(&mut fast_rx);
    }

    #[test]
    fn closed_receiver_counts_as_disconnect() {
        let mut hub = Hub::new();
        let mut engine = engine();
        let (_, rx) = admit(&mut hub, &mut engine, "gone", 4);
        drop(rx);
        assert_eq!(hub.fan_out(&mut engine), 1);
        assert!(hub.is_empty());
    }

    #[test]
    fn members_reports_sides_and_external_ids() {
        let mut hub = Hub::new();
        let mut engine = engine();
        let (_, _rx1) = admit(&mut hub, &mut engine, "p-1", 4);
        let (_, _rx2) = admit(&mut hub, &mut engine, "p-2", 4);
        let members = hub.members();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].external_id.as_deref(), Some("user-p-1"));
        assert_eq!(members[1].team, Team::Top);
    }

    #[test]
    fn close_all_queues_close_frames() {
        let mut hub = Hub::new();
        let mut engine = engine();
        let (_, mut rx) = admit(&mut hub, &mut engine, "p-1", 4);
        hub.close_all(1001, "server shutting down");
        assert_eq!(
            rx.try_recv().expect("close queued"),
            OutboundMessage::Close {
                code: 1001,
                reason: "server shutting down".to_string(),
            }
        );
    }
}
