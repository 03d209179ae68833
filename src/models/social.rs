//! Users, pings, streaks and leaderboard entries.

use serde::{Deserialize, Deserializer, Serialize};

/// Accept ids sent either as JSON strings or numbers.
fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Str(String),
        Num(i64),
    }
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Str(s) => s,
        RawId::Num(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Fields accepted by `PUT /users/me`. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.nickname.is_none()
            && self.contacts.is_none()
            && self.country.is_none()
            && self.avatar_url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Ping {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub sender_nickname: Option<String>,
    #[serde(default)]
    pub sender_contacts: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Streak {
    #[serde(default, alias = "current_streak")]
    pub current: u32,
    #[serde(default, alias = "longest_streak")]
    pub longest: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LeaderboardEntry {
    #[serde(default)]
    pub rank: Option<u32>,
    pub nickname: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, alias = "streak")]
    pub score: u32,
}
