use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tripmate_shared::ShareSort;

/// TripMate - plan trips day by day and chat with your travel group
#[derive(Debug, Parser)]
#[command(name = "tripmate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory holding default.toml and friends
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List your trips
    Trips,

    /// Create a trip and its days
    TripCreate {
        title: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        region: Option<String>,
        #[arg(long, requires = "lng", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lng: Option<f64>,
    },

    /// Delete a trip with everything on it
    TripDelete { trip_id: i64 },

    /// Show the days of a trip
    Days { trip_id: i64 },

    /// Add a missing day to a trip
    DayAdd {
        trip_id: i64,
        /// Date inside the trip (YYYY-MM-DD)
        date: NaiveDate,
    },

    /// Remove a day from a trip
    DayRemove { trip_id: i64, day_id: i64 },

    /// Show the places of a day in visit order
    Places { day_id: i64 },

    /// Append a place at the end of a day
    PlaceAdd {
        day_id: i64,
        name: String,
        address: String,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lng: f64,
        #[arg(long)]
        memo: Option<String>,
        /// Visit time (HH:MM:SS), noon when omitted
        #[arg(long)]
        time: Option<NaiveTime>,
    },

    /// Move a place to another position of its day
    PlaceMove {
        day_id: i64,
        place_id: i64,
        /// New 1-based position
        to: u32,
    },

    /// Delete a place from a day
    PlaceRemove { day_id: i64, place_id: i64 },

    /// Search places around a coordinate
    Search {
        keyword: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "15")]
        size: u32,
        #[arg(long)]
        trip_id: Option<i64>,
        /// Append the picked result to this day
        #[arg(long, requires = "pick")]
        add_to: Option<i64>,
        /// 1-based index of the result to append
        #[arg(long, requires = "add_to")]
        pick: Option<usize>,
    },

    /// Share a trip by link
    ShareCreate {
        trip_id: i64,
        /// Only people with the link can open it
        #[arg(long)]
        private: bool,
        /// Link stops working after this moment (YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        expires: Option<NaiveDateTime>,
    },

    /// Stop sharing a trip
    ShareDelete { trip_id: i64 },

    /// List the shares you created
    ShareShow,

    /// Open a trip shared with you
    Shared { token: String },

    /// Browse public trips
    PublicShares {
        #[arg(long, default_value = "latest")]
        sort: ShareSort,
        #[arg(long, default_value = "0")]
        page: u32,
        #[arg(long, default_value = "20")]
        size: u32,
    },

    /// Join the chat of a trip
    Chat { trip_id: i64 },
}
