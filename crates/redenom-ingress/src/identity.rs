//! Binding live connections to participants.
//!
//! A participant has at most one live connection. Joining again from a new
//! connection replaces the old binding; a connection reused by another
//! participant is taken away from its previous owner. Join and ready are
//! serialised so ready counts never interleave with half-applied joins.

use std::sync::Arc;

use redenom_types::{
    ConnectionId, LoginToken, MarketError, MarketRepository, Participant, ParticipantId, Result,
};
use tokio::sync::Mutex;

pub struct Identity {
    repository: Arc<dyn MarketRepository>,
    bindings: Mutex<()>,
}

impl Identity {
    #[must_use]
    pub fn new(repository: Arc<dyn MarketRepository>) -> Self {
        Self {
            repository,
            bindings: Mutex::new(()),
        }
    }

    /// Log `participant_id` in on `connection` with the simulation token.
    pub async fn join(
        &self,
        connection: &ConnectionId,
        participant_id: ParticipantId,
        login_token: &LoginToken,
    ) -> Result<Participant> {
        let _guard = self.bindings.lock().await;
        let repo = &self.repository;

        let mut participant = repo
            .find_participant(participant_id)
            .await?
            .ok_or(MarketError::ParticipantNotFound(participant_id))?;
        let simulation = repo
            .find_simulation(participant.simulation_id())
            .await?
            .ok_or_else(|| MarketError::missing("simulation", participant.simulation_id()))?;
        if simulation.login_token != *login_token {
            tracing::warn!(participant = %participant_id, %connection, "login token mismatch");
            return Err(MarketError::InvalidLoginToken);
        }

        if let Some(mut previous) = repo.find_participant_by_connection(connection).await? {
            if previous.id() != participant_id {
                previous.clear_connection();
                repo.save_participant(previous).await?;
            }
        }

        participant.bind_connection(connection.clone());
        repo.save_participant(participant.clone()).await?;
        tracing::info!(
            participant = %participant_id,
            role = %participant.role(),
            %connection,
            "participant joined"
        );
        Ok(participant)
    }

    /// Mark the bound participant ready. Returns the simulation's ready count.
    pub async fn set_ready(&self, connection: &ConnectionId) -> Result<usize> {
        let _guard = self.bindings.lock().await;
        let mut participant = self.resolve(connection).await?;
        let simulation_id = participant.simulation_id();
        participant.set_ready(true);
        self.repository.save_participant(participant).await?;
        let ready = self.repository.count_ready(simulation_id).await?;
        tracing::debug!(simulation = %simulation_id, ready, "participant ready");
        Ok(ready)
    }

    /// Drop the binding of `connection`. Unknown connections are ignored.
    pub async fn disconnect(&self, connection: &ConnectionId) -> Result<()> {
        let _guard = self.bindings.lock().await;
        let Some(mut participant) = self
            .repository
            .find_participant_by_connection(connection)
            .await?
        else {
            return Ok(());
        };
        participant.clear_connection();
        tracing::info!(participant = %participant.id(), %connection, "participant disconnected");
        self.repository.save_participant(participant).await
    }

    pub async fn resolve(&self, connection: &ConnectionId) -> Result<Participant> {
        self.repository
            .find_participant_by_connection(connection)
            .await?
            .ok_or_else(|| MarketError::UnknownConnection(connection.clone()))
    }
}
