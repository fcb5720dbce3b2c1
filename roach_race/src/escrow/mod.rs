//! Escrow service: the aggregate state and the actor that serializes access
//! to it.
//!
//! [`EscrowState`] is the synchronous core; [`EscrowActor`] owns one and
//! processes [`EscrowMessage`]s from its inbox one at a time, publishing
//! committed [`RaceEvent`](crate::race::RaceEvent)s to subscribers.
//! [`EscrowHandle`] is the cloneable async front door.

pub mod actor;
pub mod clock;
pub mod config;
pub mod messages;
pub mod state;

pub use actor::{EscrowActor, EscrowHandle};
pub use clock::{Clock, SystemClock};
pub use config::EscrowConfig;
pub use messages::EscrowMessage;
pub use state::{EscrowState, Holdings, Settlement};
