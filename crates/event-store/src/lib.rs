pub mod bus;
pub mod error;
pub mod event;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod relay;
pub mod store;

pub use common::{AggregateId, TenantId};
pub use bus::{EventBus, EventBusBuilder, EventSubscriber, PublishError, SubscriberError};
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use outbox::{Delivery, InMemoryWorkQueue, QueuedMessage, WorkQueue};
pub use postgres::{PostgresEventStore, PostgresWorkQueue};
pub use relay::OutboxRelay;
pub use store::{AppendOptions, EventStore, EventStream};
