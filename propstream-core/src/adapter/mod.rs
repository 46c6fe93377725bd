//! Stream Adapter
//!
//! The adapter sits between a host UI framework and a wrapped component.
//! The host hands it property sets through lifecycle hooks; the adapter
//! hands back a flat property map to render with.
//!
//! # Data Flow
//!
//! 1. A lifecycle hook fires with the current properties.
//!
//! 2. The properties are classified and diffed against the previous
//!    snapshot, once over stream-like keys and once over plain keys.
//!
//! 3. The subscription ledger cancels and establishes subscriptions for the
//!    stream-like delta. Streams deliver into the state aggregator.
//!
//! 4. Plain additions, changes and removals are written into the state
//!    aggregator directly.
//!
//! 5. The aggregator coalesces everything written during one turn into a
//!    single published [`RenderState`].
//!
//! # Invariants
//!
//! - After any pass the ledger holds exactly one live subscription per
//!   present stream-like key and none for anything else.
//! - After detach it holds none at all, and no further state is published.

mod builder;
mod ledger;
mod lifecycle;
mod scheduler;
mod state;

pub use builder::AdapterBuilder;
pub use ledger::SubscriptionLedger;
pub use lifecycle::{Component, Members, Phase, StreamAdapter};
pub use scheduler::{Scheduler, Task, TokioScheduler, TurnQueue};
pub use state::{RenderState, StateAggregator, StateChange, StateListener, ValueMap};
