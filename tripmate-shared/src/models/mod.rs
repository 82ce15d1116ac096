pub mod chat;
pub mod page;
pub mod share;
pub mod trip;

pub use chat::{ChatMessage, ChatRoom, MessageType, OutgoingMessage, ReadReceipt, TypingNotice};
pub use page::Page;
pub use share::{ShareSettings, ShareSort, TripShare};
pub use trip::{
    default_visit_time, Coordinate, DayRequest, PlaceDraft, PlaceRequest, Trip, TripDay,
    TripDraft, TripPlace, VisitOrderUpdate,
};
