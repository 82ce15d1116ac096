use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::trip::Trip;

/// Public or unlisted share link of a trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripShare {
    pub id: i64,
    pub share_token: String,
    #[serde(default)]
    pub share_url: Option<String>,
    pub is_public: bool,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub expiry_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub view_count: u32,
    #[serde(default)]
    pub trip: Option<Trip>,
    #[serde(default)]
    pub is_expired: bool,
}

impl TripShare {
    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        self.expiry_date.map_or(false, |expiry| now > expiry)
    }

    /// Whether a token holder may still open the shared trip
    pub fn is_viewable_at(&self, now: NaiveDateTime) -> bool {
        self.is_public && !self.is_expired_at(now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareSettings {
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expiry_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShareSort {
    #[default]
    Latest,
    Popular,
}

impl ShareSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareSort::Latest => "latest",
            ShareSort::Popular => "popular",
        }
    }
}

impl std::str::FromStr for ShareSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(ShareSort::Latest),
            "popular" => Ok(ShareSort::Popular),
            other => Err(format!("unknown share sort: {}", other)),
        }
    }
}
