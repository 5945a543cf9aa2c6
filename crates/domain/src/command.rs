//! Command handling infrastructure.

use std::marker::PhantomData;

use common::{AggregateId, TenantId};
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};
use serde::Serialize;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the stream after the command.
    pub new_version: Version,
}

/// Trait for commands targeting an aggregate.
///
/// Commands represent an intention to perform an action. They may be
/// rejected if the aggregate's current state doesn't allow it.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the tenant the command runs under.
    fn tenant_id(&self) -> &TenantId;

    /// Returns the ID of the stream this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Executes commands against aggregates.
///
/// The handler owns the full write cycle:
/// 1. Load the stream and hydrate the aggregate (pure fold)
/// 2. Run the decision function to produce events
/// 3. Commit the events with the hydrated version as the optimistic
///    concurrency expectation
///
/// The decision function never touches storage, which keeps aggregate
/// logic testable against plain in-memory state.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate by folding its stream.
    ///
    /// If the stream doesn't exist, returns a default instance at
    /// version 0.
    pub async fn load(
        &self,
        tenant_id: &TenantId,
        aggregate_id: AggregateId,
    ) -> Result<A, DomainError> {
        let events = self.store.read_stream(tenant_id, aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if its stream is empty.
    pub async fn load_existing(
        &self,
        tenant_id: &TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(tenant_id, aggregate_id).await?;
        if aggregate.version() > Version::initial() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The decision function receives the hydrated aggregate and
    /// returns either events to commit or a domain error. An empty
    /// event list commits nothing and leaves the stream untouched.
    pub async fn execute<F>(
        &self,
        tenant_id: &TenantId,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A::Event: Serialize,
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(tenant_id, aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        let envelopes =
            self.build_envelopes(tenant_id, aggregate_id, current_version, &events)?;

        let new_version = self
            .store
            .append(envelopes, AppendOptions::expect_version(current_version))
            .await?;

        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        metrics::counter!("commands_executed").increment(1);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(
        &self,
        tenant_id: &TenantId,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError>
    where
        A::Event: Serialize,
    {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .tenant_id(tenant_id.clone())
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build();
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}
