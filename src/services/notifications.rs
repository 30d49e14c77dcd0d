use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Notification, User};
use crate::database::{Store, StoreError};
use crate::error::ApiError;

pub struct NotificationService {
    store: Arc<dyn Store>,
}

impl NotificationService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// Newest first
    pub async fn list(&self, caller: &User, unread_only: bool) -> Result<Vec<Notification>, ApiError> {
        Ok(self.store.notifications_for(caller.id, unread_only).await?)
    }

    /// Someone else's notification is indistinguishable from a missing one
    pub async fn mark_read(&self, caller: &User, id: Uuid) -> Result<Notification, ApiError> {
        match self.store.mark_notification_read(id, caller.id).await {
            Ok(notification) => Ok(notification),
            Err(StoreError::NotFound(_)) => Err(ApiError::not_found("Notification not found.")),
            Err(e) => Err(e.into()),
        }
    }
}
