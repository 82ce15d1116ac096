pub mod feed;
pub mod frame;
pub mod session;
pub mod transport;

mod driver;

pub use feed::RoomFeed;
pub use frame::{Command, Frame, Heartbeat};
pub use session::{
    ChatSession, ConnectOutcome, ConnectionState, RoomGuard, RoomSubscription, SessionEvent,
};
pub use transport::TransportConfig;
