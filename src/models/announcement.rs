use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementKind {
    Update,
    Promo,
    Alert,
    Event,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: AnnouncementKind,
    pub title: String,
    pub content: String,
    pub date: DateTime<Utc>,
}
