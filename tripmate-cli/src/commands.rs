//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDateTime, NaiveTime};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};
use tripmate_chat::{RoomFeed, SessionEvent};
use tripmate_core::{parse_share_token, PlaceSearchQuery, Validate};
use tripmate_shared::{
    ChatMessage, Coordinate, MessageType, PlaceDraft, ShareSettings, ShareSort, TripDraft,
    TripPlace, TripShare,
};

use crate::cli::Commands;
use crate::error;
use crate::state::AppState;

pub async fn run(state: &AppState, command: Commands) -> Result<()> {
    match command {
        Commands::Trips => list_trips(state).await,
        Commands::TripCreate {
            title,
            start,
            end,
            region,
            lat,
            lng,
        } => {
            let mut draft = TripDraft::new(title, start, end);
            draft.region = region;
            draft.latitude = lat;
            draft.longitude = lng;
            create_trip(state, draft).await
        }
        Commands::TripDelete { trip_id } => {
            state
                .planner
                .delete_trip(trip_id)
                .await
                .with_context(|| format!("Failed to delete trip {}", trip_id))?;
            println!("Trip {} deleted.", trip_id);
            Ok(())
        }
        Commands::Days { trip_id } => list_days(state, trip_id).await,
        Commands::DayAdd { trip_id, date } => {
            let trip = state.planner.trip(trip_id).await?;
            let day = state
                .planner
                .add_day(&trip, date)
                .await
                .with_context(|| format!("Failed to add {} to trip {}", date, trip_id))?;
            println!("Day {} ({}) added as #{}.", day.day, day.date, day.id);
            Ok(())
        }
        Commands::DayRemove { trip_id, day_id } => {
            state
                .planner
                .remove_day(trip_id, day_id)
                .await
                .with_context(|| format!("Failed to remove day {}", day_id))?;
            println!("Day {} removed.", day_id);
            Ok(())
        }
        Commands::Places { day_id } => {
            let places = state.itinerary.list(day_id).await?;
            print_places(day_id, &places);
            Ok(())
        }
        Commands::PlaceAdd {
            day_id,
            name,
            address,
            lat,
            lng,
            memo,
            time,
        } => {
            let mut draft = PlaceDraft::new(name, address, Coordinate::new(lat, lng));
            draft.memo = memo;
            draft.visit_time = time;
            add_place(state, day_id, draft).await
        }
        Commands::PlaceMove {
            day_id,
            place_id,
            to,
        } => {
            let places = state
                .itinerary
                .reorder(day_id, place_id, to)
                .await
                .with_context(|| format!("Failed to move place {}", place_id))?;
            print_places(day_id, &places);
            Ok(())
        }
        Commands::PlaceRemove { day_id, place_id } => {
            let places = state
                .itinerary
                .remove(day_id, place_id)
                .await
                .with_context(|| format!("Failed to remove place {}", place_id))?;
            print_places(day_id, &places);
            Ok(())
        }
        Commands::Search {
            keyword,
            lat,
            lng,
            page,
            size,
            trip_id,
            add_to,
            pick,
        } => {
            let mut query = PlaceSearchQuery::new(keyword, Coordinate::new(lat, lng));
            query.page = page;
            query.size = size;
            query.trip_id = trip_id;
            search(state, query, add_to.zip(pick)).await
        }
        Commands::ShareCreate {
            trip_id,
            private,
            expires,
        } => share_trip(state, trip_id, !private, expires).await,
        Commands::ShareDelete { trip_id } => {
            state
                .shares
                .delete_share(trip_id)
                .await
                .with_context(|| format!("Failed to stop sharing trip {}", trip_id))?;
            println!("Trip {} is no longer shared.", trip_id);
            Ok(())
        }
        Commands::ShareShow => {
            let shares = state.shares.my_shares().await?;
            if shares.is_empty() {
                println!("You have not shared any trip yet.");
            }
            for share in &shares {
                print_share(share);
            }
            Ok(())
        }
        Commands::Shared { token } => open_shared(state, &token).await,
        Commands::PublicShares { sort, page, size } => public_shares(state, sort, page, size).await,
        Commands::Chat { trip_id } => chat(state, trip_id).await,
    }
}

async fn list_trips(state: &AppState) -> Result<()> {
    let trips = state.planner.trips().await?;
    if trips.is_empty() {
        println!("No trips yet.");
    }
    for trip in &trips {
        println!(
            "#{:<5} {}  {} ~ {}  {}",
            trip.id,
            trip.title,
            trip.start_date,
            trip.end_date,
            trip.region.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn create_trip(state: &AppState, draft: TripDraft) -> Result<()> {
    let title = draft.title.clone();
    let trip = state
        .planner
        .create_trip(draft)
        .await
        .with_context(|| format!("Failed to create trip '{}'", title))?;
    println!(
        "Trip #{} '{}' created with {} day(s).",
        trip.id,
        trip.title,
        trip.span_days()
    );
    Ok(())
}

async fn list_days(state: &AppState, trip_id: i64) -> Result<()> {
    let trip = state.planner.trip(trip_id).await?;
    let days = state.planner.days(trip_id).await?;
    println!("{} ({} ~ {})", trip.title, trip.start_date, trip.end_date);
    for day in &days {
        println!("  Day {:<2} {}  #{}", day.day, day.date, day.id);
    }
    let missing = (trip.span_days() as usize).saturating_sub(days.len());
    if missing > 0 {
        println!("  {} day(s) missing, add them with day-add", missing);
    }
    Ok(())
}

async fn add_place(state: &AppState, day_id: i64, draft: PlaceDraft) -> Result<()> {
    let name = draft.place_name.clone();
    let place = state
        .itinerary
        .append(day_id, draft)
        .await
        .with_context(|| format!("Failed to add '{}'", name.trim()))?;
    println!("Added {} as stop {}.", place.place_name, place.visit_order);
    Ok(())
}

async fn search(
    state: &AppState,
    query: PlaceSearchQuery,
    append: Option<(i64, usize)>,
) -> Result<()> {
    let candidates = state
        .search
        .search(&query)
        .await
        .with_context(|| format!("Search for '{}' failed", query.keyword))?;
    if candidates.is_empty() {
        println!("Nothing found for '{}'.", query.keyword);
    }
    for (idx, candidate) in candidates.iter().enumerate() {
        println!(
            "{:>3}. {}  {}  {}",
            idx + 1,
            candidate.place_name,
            candidate.address_name,
            candidate.category_name.as_deref().unwrap_or("")
        );
    }

    let Some((day_id, pick)) = append else {
        return Ok(());
    };
    let Some(candidate) = pick.checked_sub(1).and_then(|idx| candidates.get(idx)) else {
        bail!("There is no result #{} to add", pick);
    };
    let draft = candidate.clone().into_draft()?;
    add_place(state, day_id, draft).await
}

async fn share_trip(
    state: &AppState,
    trip_id: i64,
    is_public: bool,
    expiry_date: Option<NaiveDateTime>,
) -> Result<()> {
    let settings = ShareSettings {
        is_public,
        expiry_date,
    };
    settings.validate()?;
    let share = state
        .shares
        .create_share(trip_id, &settings)
        .await
        .with_context(|| format!("Failed to share trip {}", trip_id))?;
    print_share(&share);
    Ok(())
}

async fn open_shared(state: &AppState, raw_token: &str) -> Result<()> {
    let token = parse_share_token(raw_token)?;
    let share = state.shares.shared_trip(&token).await?;
    if !share.is_viewable_at(Local::now().naive_local()) {
        bail!("This share link is private or has expired");
    }
    let Some(trip) = share.trip else {
        bail!("The shared trip is no longer available");
    };
    println!(
        "{} ({} ~ {}), viewed {} time(s)",
        trip.title, trip.start_date, trip.end_date, share.view_count
    );
    Ok(())
}

async fn public_shares(state: &AppState, sort: ShareSort, page: u32, size: u32) -> Result<()> {
    let shares = state.shares.public_shares(page, size, sort).await?;
    for share in &shares.content {
        print_share(share);
    }
    println!(
        "Page {} of {} ({} shared trips)",
        shares.number + 1,
        shares.total_pages.max(1),
        shares.total_elements
    );
    Ok(())
}

async fn chat(state: &AppState, trip_id: i64) -> Result<()> {
    let mut events = state.chat.events();
    let mut feed = RoomFeed::open(
        state.chat.clone(),
        state.chats.clone(),
        state.identity.as_ref(),
        trip_id,
        state.history_page_size,
    )
    .await
    .with_context(|| format!("Failed to join the chat of trip {}", trip_id))?;

    for message in feed.messages() {
        print_message(message);
    }
    println!(
        "-- {} | /loc <label> <lat> <lng>, /img <url> [caption], /delete <id>, /quit",
        feed.room().name.as_deref().unwrap_or("chat")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                match handle_input(&mut feed, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    // Write failures are reported, the chat stays open.
                    Err(e) => eprintln!("{}", error::notice(&e)),
                }
            }
            message = async { feed.next().await.cloned() } => match message {
                Some(message) => print_message(&message),
                None => {
                    println!("-- chat closed");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(SessionEvent::Disconnected { reason }) => println!("-- connection lost: {}", reason),
                Ok(SessionEvent::Reconnecting { attempt }) => debug!("Reconnect attempt {}", attempt),
                Ok(SessionEvent::Reconnected) => match feed.catch_up().await {
                    Ok(missed) => {
                        println!("-- reconnected, {} new message(s)", missed);
                        let start = feed.messages().len() - missed;
                        for message in &feed.messages()[start..] {
                            print_message(message);
                        }
                    }
                    Err(e) => eprintln!("{}", error::notice(&anyhow::Error::new(e).context("Failed to load missed messages"))),
                },
                Ok(SessionEvent::BrokerError { message }) => eprintln!("-- chat server error: {}", message),
                Ok(SessionEvent::Connected) => {}
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} session events", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    drop(feed);
    state.chat.disconnect();
    info!("Left the chat of trip {}", trip_id);
    Ok(())
}

/// Returns `false` when the user wants to leave.
async fn handle_input(feed: &mut RoomFeed, line: &str) -> Result<bool> {
    let mut words = line.split_whitespace();
    match words.next() {
        None => {}
        Some("/quit") => return Ok(false),
        Some("/loc") => {
            let (Some(label), Some(lat), Some(lng)) = (words.next(), words.next(), words.next())
            else {
                bail!("Usage: /loc <label> <lat> <lng>");
            };
            let latitude: f64 = lat.parse().context("Latitude is not a number")?;
            let longitude: f64 = lng.parse().context("Longitude is not a number")?;
            feed.send_location(label, latitude, longitude)
                .context("Failed to send location")?;
        }
        Some("/img") => {
            let Some(url) = words.next() else {
                bail!("Usage: /img <url> [caption]");
            };
            let caption = words.collect::<Vec<_>>().join(" ");
            feed.send_image(&caption, url).context("Failed to send image")?;
        }
        Some("/delete") => {
            let id: i64 = words
                .next()
                .context("Usage: /delete <id>")?
                .parse()
                .context("Message id is not a number")?;
            feed.delete_message(id)
                .await
                .with_context(|| format!("Failed to delete message {}", id))?;
            println!("-- message {} deleted", id);
        }
        Some(_) => {
            let _ = feed.typing();
            feed.send_text(line).context("Failed to send message")?;
        }
    }
    Ok(true)
}

fn print_places(day_id: i64, places: &[TripPlace]) {
    if places.is_empty() {
        println!("Day #{} has no places yet.", day_id);
    }
    for place in places {
        println!(
            "{:>3}. {}  {}  {}  #{}",
            place.visit_order,
            place.visit_time.unwrap_or(NaiveTime::MIN).format("%H:%M"),
            place.place_name,
            place.address,
            place.id
        );
    }
}

fn print_share(share: &TripShare) {
    let title = share.trip.as_ref().map(|t| t.title.as_str()).unwrap_or("?");
    let visibility = if share.is_public { "public" } else { "private" };
    let expiry = share
        .expiry_date
        .map(|d| format!(" until {}", d))
        .unwrap_or_default();
    println!(
        "{}  {}  {}{}  {} view(s)",
        share.share_url.as_deref().unwrap_or(&share.share_token),
        title,
        visibility,
        expiry,
        share.view_count
    );
}

fn print_message(message: &ChatMessage) {
    let sender = message.sender_nickname.as_deref().unwrap_or("system");
    let time = message.created_at.format("%H:%M");
    if message.deleted {
        println!("[{}] {}: (deleted)", time, sender);
        return;
    }
    match message.message_type {
        MessageType::System => println!("[{}] * {}", time, message.content),
        MessageType::Image => println!(
            "[{}] {}: {} <{}>",
            time,
            sender,
            message.content,
            message.image_url.as_deref().unwrap_or("")
        ),
        MessageType::Location => println!(
            "[{}] {}: {} @ {:.5},{:.5}",
            time,
            sender,
            message.content,
            message.latitude.unwrap_or_default(),
            message.longitude.unwrap_or_default()
        ),
        MessageType::Text => println!("[{}] {}: {}", time, sender, message.content),
    }
}
