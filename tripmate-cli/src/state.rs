use std::sync::Arc;
use std::time::Duration;

use tripmate_chat::{ChatSession, TransportConfig};
use tripmate_core::{ChatRepository, CoreResult, PlaceSearch, ShareRepository, StaticIdentity};
use tripmate_itinerary::{ItineraryService, TripPlanner};
use tripmate_store::app_config::{ChatConfig, Config};
use tripmate_store::{
    ApiClient, HttpChatRepository, HttpPlaceRepository, HttpPlaceSearch, HttpShareRepository,
    HttpTripRepository,
};

/// Everything a command needs, wired once per process
#[derive(Clone)]
pub struct AppState {
    pub planner: Arc<TripPlanner>,
    pub itinerary: Arc<ItineraryService>,
    pub shares: Arc<dyn ShareRepository>,
    pub search: Arc<dyn PlaceSearch>,
    pub chats: Arc<dyn ChatRepository>,
    pub chat: ChatSession,
    pub identity: Arc<StaticIdentity>,
    pub history_page_size: u32,
}

impl AppState {
    pub fn from_config(config: &Config) -> CoreResult<Self> {
        let client = ApiClient::from_config(&config.api)?;
        let trips = Arc::new(HttpTripRepository::new(client.clone()));

        let mut transport = transport_config(&config.chat);
        transport.access_token = config.api.access_token.clone();

        Ok(Self {
            planner: Arc::new(TripPlanner::new(trips.clone(), trips)),
            itinerary: Arc::new(ItineraryService::new(Arc::new(HttpPlaceRepository::new(
                client.clone(),
            )))),
            shares: Arc::new(HttpShareRepository::new(client.clone())),
            search: Arc::new(HttpPlaceSearch::new(client.clone())),
            chats: Arc::new(HttpChatRepository::new(client)),
            chat: ChatSession::new(transport),
            identity: Arc::new(StaticIdentity::new(
                config.identity.member_id,
                config.identity.nickname.clone(),
            )),
            history_page_size: config.chat.history_page_size,
        })
    }
}

pub fn transport_config(chat: &ChatConfig) -> TransportConfig {
    let mut transport = TransportConfig::new(chat.ws_url.clone());
    transport.connect_timeout = Duration::from_millis(chat.connect_timeout_ms);
    transport.reconnect_delay = Duration::from_millis(chat.reconnect_delay_ms);
    transport.heartbeat_outgoing = Duration::from_millis(chat.heartbeat_outgoing_ms);
    transport.heartbeat_incoming = Duration::from_millis(chat.heartbeat_incoming_ms);
    transport
}
