use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::actor::{Actor, Role};
use crate::models::announcement::{Announcement, AnnouncementKind};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewAnnouncement {
    #[serde(rename = "type")]
    pub kind: AnnouncementKind,
    pub title: String,
    pub content: String,
}

pub fn publish(state: &AppState, actor: &Actor, request: NewAnnouncement) -> Result<Announcement, AppError> {
    actor.require_role(Role::Admin, "publish announcements")?;

    let title = request.title.trim();
    let content = request.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(AppError::BadRequest("title and content are required".to_string()));
    }

    let announcement = Announcement {
        id: Uuid::new_v4(),
        kind: request.kind,
        title: title.to_string(),
        content: content.to_string(),
        date: Utc::now(),
    };
    state.announcements.insert(announcement.id, announcement.clone());

    info!(announcement_id = %announcement.id, kind = ?announcement.kind, "announcement published");
    Ok(announcement)
}

/// Newest first.
pub fn list(state: &AppState) -> Vec<Announcement> {
    let mut announcements: Vec<Announcement> = state
        .announcements
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    announcements.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
    announcements
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{list, publish, NewAnnouncement};
    use crate::config::Settings;
    use crate::engine::lifecycle::tests::{staff, state_with};
    use crate::error::AppError;
    use crate::models::actor::{Actor, Role};
    use crate::models::announcement::AnnouncementKind;

    fn promo(title: &str) -> NewAnnouncement {
        NewAnnouncement {
            kind: AnnouncementKind::Promo,
            title: title.to_string(),
            content: "Free delivery all weekend".to_string(),
        }
    }

    #[test]
    fn admins_publish_and_everyone_lists() {
        let state = state_with(Settings::default());
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        publish(&state, &admin, promo("Weekend promo")).unwrap();
        let listed = list(&state);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Weekend promo");
        assert_eq!(listed[0].kind, AnnouncementKind::Promo);
    }

    #[test]
    fn staff_cannot_publish_and_blank_titles_are_rejected() {
        let state = state_with(Settings::default());
        let admin = Actor::new(Uuid::new_v4(), Role::Admin);

        assert!(matches!(publish(&state, &staff(), promo("x")), Err(AppError::Forbidden(_))));
        assert!(matches!(publish(&state, &admin, promo("  ")), Err(AppError::BadRequest(_))));
        assert!(list(&state).is_empty());
    }
}
