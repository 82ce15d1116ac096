use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use tripmate_chat::{ChatSession, TransportConfig};
use tripmate_cli::{commands, error, AppState, Cli, Commands};
use tripmate_core::StaticIdentity;
use tripmate_itinerary::{ItineraryService, TripPlanner};
use tripmate_shared::ShareSort;
use tripmate_store::app_config::ChatConfig;
use tripmate_store::{
    ApiClient, HttpChatRepository, HttpPlaceSearch, HttpShareRepository, InMemoryPlaceRepository,
    InMemoryTripRepository,
};

/// In-memory itinerary; everything else points at a closed port.
fn offline_state(places: Arc<InMemoryPlaceRepository>) -> AppState {
    let client = ApiClient::new("http://127.0.0.1:9/api", Duration::from_millis(500), None).unwrap();
    let trips = Arc::new(InMemoryTripRepository::new());
    AppState {
        planner: Arc::new(TripPlanner::new(trips.clone(), trips)),
        itinerary: Arc::new(ItineraryService::new(places)),
        shares: Arc::new(HttpShareRepository::new(client.clone())),
        search: Arc::new(HttpPlaceSearch::new(client.clone())),
        chats: Arc::new(HttpChatRepository::new(client)),
        chat: ChatSession::new(TransportConfig::new("ws://127.0.0.1:9/ws/chat/websocket")),
        identity: Arc::new(StaticIdentity::new(1, "mina")),
        history_page_size: 50,
    }
}

fn parse(args: &[&str]) -> Commands {
    let mut argv = vec!["tripmate"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("arguments parse").command
}

#[test]
fn test_parse_place_move() {
    match parse(&["place-move", "3", "12", "1"]) {
        Commands::PlaceMove {
            day_id,
            place_id,
            to,
        } => assert_eq!((day_id, place_id, to), (3, 12, 1)),
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_parse_trip_create_with_negative_coordinates() {
    match parse(&[
        "trip-create",
        "Lima",
        "--start",
        "2025-07-01",
        "--end",
        "2025-07-04",
        "--lat",
        "-12.05",
        "--lng",
        "-77.04",
    ]) {
        Commands::TripCreate { lat, lng, start, .. } => {
            assert_eq!(lat, Some(-12.05));
            assert_eq!(lng, Some(-77.04));
            assert_eq!(start.to_string(), "2025-07-01");
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_parse_rejects_incomplete_arguments() {
    let half_coordinate = Cli::try_parse_from([
        "tripmate",
        "trip-create",
        "Jeju",
        "--start",
        "2025-05-01",
        "--end",
        "2025-05-03",
        "--lat",
        "33.4",
    ]);
    assert!(half_coordinate.is_err());

    let add_without_pick = Cli::try_parse_from([
        "tripmate", "search", "cafe", "--lat", "33.4", "--lng", "126.5", "--add-to", "4",
    ]);
    assert!(add_without_pick.is_err());

    let bad_date = Cli::try_parse_from(["tripmate", "day-add", "1", "2025-13-01"]);
    assert!(bad_date.is_err());
}

#[test]
fn test_parse_public_share_sort() {
    match parse(&["public-shares", "--sort", "popular"]) {
        Commands::PublicShares { sort, page, size } => {
            assert_eq!(sort, ShareSort::Popular);
            assert_eq!((page, size), (0, 20));
        }
        other => panic!("unexpected command {:?}", other),
    }
    assert!(Cli::try_parse_from(["tripmate", "public-shares", "--sort", "oldest"]).is_err());
}

#[test]
fn test_transport_config_from_chat_section() {
    let chat = ChatConfig {
        ws_url: "ws://localhost:8080/ws/chat/websocket".to_string(),
        connect_timeout_ms: 3_000,
        reconnect_delay_ms: 0,
        heartbeat_outgoing_ms: 10_000,
        heartbeat_incoming_ms: 0,
        history_page_size: 30,
    };
    let transport = tripmate_cli::state::transport_config(&chat);
    assert_eq!(transport.connect_timeout, Duration::from_secs(3));
    assert!(transport.reconnect_delay.is_zero());
    assert_eq!(transport.heartbeat_outgoing, Duration::from_secs(10));
    assert!(transport.heartbeat_incoming.is_zero());
}

#[tokio::test]
async fn test_place_commands_keep_day_dense() {
    let places = Arc::new(InMemoryPlaceRepository::new());
    let state = offline_state(places.clone());

    for name in ["Airport", "Market", "Beach"] {
        commands::run(
            &state,
            parse(&["place-add", "7", name, "Jeju-si", "33.5", "126.5"]),
        )
        .await
        .unwrap();
    }
    let listed = state.itinerary.list(7).await.unwrap();
    let beach = listed.iter().find(|p| p.place_name == "Beach").unwrap().id;
    let airport = listed.iter().find(|p| p.place_name == "Airport").unwrap().id;

    commands::run(&state, parse(&["place-move", "7", &beach.to_string(), "1"]))
        .await
        .unwrap();
    commands::run(&state, parse(&["place-remove", "7", &airport.to_string()]))
        .await
        .unwrap();

    let names: Vec<(String, u32)> = state
        .itinerary
        .list(7)
        .await
        .unwrap()
        .into_iter()
        .map(|p| (p.place_name, p.visit_order))
        .collect();
    assert_eq!(
        names,
        vec![("Beach".to_string(), 1), ("Market".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_failed_move_reports_notice() {
    let places = Arc::new(InMemoryPlaceRepository::new());
    let state = offline_state(places);
    commands::run(&state, parse(&["place-add", "2", "Cafe", "Main st", "33.5", "126.5"]))
        .await
        .unwrap();
    let id = state.itinerary.list(2).await.unwrap()[0].id;

    let err = commands::run(&state, parse(&["place-move", "2", &id.to_string(), "5"]))
        .await
        .unwrap_err();
    assert_eq!(
        error::notice(&err),
        format!(
            "Failed to move place {}: position 5 is not available, pick 1 to 1",
            id
        )
    );
}

#[tokio::test]
async fn test_invalid_place_is_not_created() {
    let places = Arc::new(InMemoryPlaceRepository::new());
    let state = offline_state(places.clone());

    let err = commands::run(&state, parse(&["place-add", "2", "  ", "Main st", "33.5", "126.5"]))
        .await
        .unwrap_err();
    assert!(error::notice(&err).contains("invalid input"));
    assert_eq!(places.write_count(), 0);
}

#[tokio::test]
async fn test_expired_share_rejected_before_any_request() {
    let state = offline_state(Arc::new(InMemoryPlaceRepository::new()));
    let err = commands::run(
        &state,
        parse(&["share-create", "1", "--expires", "2000-01-01T00:00:00"]),
    )
    .await
    .unwrap_err();
    assert_eq!(error::notice(&err), "invalid input, expiry date must be in the future");
}

#[tokio::test]
async fn test_malformed_share_token_rejected() {
    let state = offline_state(Arc::new(InMemoryPlaceRepository::new()));
    let err = commands::run(&state, parse(&["shared", "not-a-token"]))
        .await
        .unwrap_err();
    assert_eq!(error::notice(&err), "invalid input, share token is malformed");
}

#[tokio::test]
async fn test_chat_unreachable_backend() {
    let state = offline_state(Arc::new(InMemoryPlaceRepository::new()));
    let err = commands::run(&state, parse(&["chat", "5"])).await.unwrap_err();
    let notice = error::notice(&err);
    assert!(notice.starts_with("Failed to join the chat of trip 5: could not reach the server"), "{}", notice);
    assert!(!state.chat.is_connected());
}
