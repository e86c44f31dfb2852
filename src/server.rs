use std::future::Future;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, Mutex};

use crate::constants::TICK_DT;
use crate::engine::BattleEngine;
use crate::hub::{Hub, OutboundMessage};
use crate::protocol::{parse_client_message, ClientMessage};
use crate::settlement::MatchSettlement;
use crate::types::Team;

pub type SharedState = Arc<Mutex<ServerState>>;

/// Everything a game instance mutates, guarded by one lock.
pub struct ServerState {
    pub hub: Hub,
    pub engine: BattleEngine,
    settlement_tx: mpsc::Sender<MatchSettlement>,
}

impl ServerState {
    pub fn new(engine: BattleEngine, settlement_tx: mpsc::Sender<MatchSettlement>) -> Self {
        Self {
            hub: Hub::new(),
            engine,
            settlement_tx,
        }
    }

    pub fn admit(
        &mut self,
        session_id: String,
        external_id: Option<String>,
        tx: mpsc::Sender<OutboundMessage>,
    ) -> Team {
        self.hub.admit(&mut self.engine, session_id, external_id, tx)
    }

    pub fn evict(&mut self, session_id: &str) -> bool {
        self.hub.evict(&mut self.engine, session_id)
    }

    /// One simulation step: advance, hand a finished match to settlement
    /// once, then broadcast.
    pub fn tick(&mut self) {
        self.engine.step(TICK_DT);

        if let Some(outcome) = self.engine.take_outcome() {
            let settlement = MatchSettlement {
                winner: outcome.winner,
                participants: self.hub.members(),
            };
            tracing::info!(
                winner = outcome.winner.index(),
                elapsed = outcome.elapsed_secs,
                participants = settlement.participants.len(),
                "dispatching settlement"
            );
            if let Err(error) = self.settlement_tx.try_send(settlement) {
                tracing::error!(%error, "settlement queue rejected match result");
            }
        }

        self.hub.fan_out(&mut self.engine);
    }

    /// Applies one inbound frame. Sessions that are no longer members are
    /// ignored, so an evicted reader cannot touch the match.
    pub fn handle_client_message(&mut self, session_id: &str, raw: &str) {
        if !self.hub.contains(session_id) {
            tracing::debug!(session = %session_id, "ignoring message from departed session");
            return;
        }
        let Some(message) = parse_client_message(raw) else {
            tracing::debug!(session = %session_id, "ignoring malformed message");
            return;
        };

        match message {
            ClientMessage::Spawn { key, x, y } => {
                if let Err(reason) = self.engine.spawn(session_id, &key, x, y) {
                    tracing::debug!(session = %session_id, %key, %reason, "spawn rejected");
                }
            }
            ClientMessage::Reset => {
                tracing::info!(session = %session_id, "reset requested");
                self.engine.reset();
            }
        }
    }
}

/// Runs one admitted session until either side of the connection stops.
/// Inbound frames are applied as they arrive; when the stream ends or the
/// writer finishes (write error, queue closed) the session is evicted.
pub async fn drive_session<S, W>(state: &SharedState, session_id: &str, inbound: S, writer: W)
where
    S: Stream<Item = String>,
    W: Future<Output = ()>,
{
    let reader = async {
        let mut inbound = std::pin::pin!(inbound);
        while let Some(raw) = inbound.next().await {
            state.lock().await.handle_client_message(session_id, &raw);
        }
    };

    let writer_stopped = tokio::select! {
        () = reader => false,
        () = writer => true,
    };
    if writer_stopped {
        tracing::debug!(session = %session_id, "writer stopped; closing session");
    }
    state.lock().await.evict(session_id);
}
