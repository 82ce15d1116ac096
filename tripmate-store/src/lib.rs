pub mod app_config;
pub mod chat_repo;
pub mod client;
pub mod memory_repo;
pub mod place_repo;
pub mod search_repo;
pub mod share_repo;
pub mod trip_repo;

pub use chat_repo::HttpChatRepository;
pub use client::ApiClient;
pub use memory_repo::{InMemoryPlaceRepository, InMemoryTripRepository};
pub use place_repo::HttpPlaceRepository;
pub use search_repo::HttpPlaceSearch;
pub use share_repo::HttpShareRepository;
pub use trip_repo::HttpTripRepository;
