use tracing::error;

use crate::db::models::{Profile, ProfileInsert, ProfileUpdate, Table};
use crate::db::SupabaseClient;
use crate::errors::DbError;

#[derive(Clone)]
pub struct ProfileRepository {
    client: SupabaseClient,
}

impl ProfileRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Profile, DbError> {
        self.client
            .from::<Profile>()
            .eq("id", id)
            .fetch_one()
            .await
            .inspect_err(|e| error!("Failed to find profile {id}: {e}"))
    }

    pub async fn create(&self, profile: &ProfileInsert) -> Result<Profile, DbError> {
        self.client
            .insert::<Profile>(profile)
            .await
            .inspect_err(|e| error!("Failed to create profile {}: {e}", profile.id))
    }

    /// Applies `changes` and returns the updated row. An empty update is a read.
    pub async fn update(&self, id: &str, changes: &ProfileUpdate) -> Result<Profile, DbError> {
        if changes.is_empty() {
            return self.find_by_id(id).await;
        }
        self.client
            .update::<Profile>("id", id, changes)
            .await
            .inspect_err(|e| error!("Failed to update profile {id}: {e}"))?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found(Profile::NAME, "id", id))
    }
}
