//! Peer overlay: wire envelopes, the inbound filter, the in-process overlay and peer discovery.

pub mod discovery;
pub mod encoding;
pub mod filtering;
pub mod messages;
pub mod mock;
pub mod outbound;
pub mod traits;

pub use discovery::{PeerAnnouncer, PeerDirectory};
pub use filtering::{filter_stream, MessageFilter};
pub use messages::{MessageEnvelope, TransportMessage};
pub use mock::{MockHub, MockTransport};
pub use outbound::Outbound;
pub use traits::{InboundFrame, Transport, TransportFactory, TransportSubscription};
