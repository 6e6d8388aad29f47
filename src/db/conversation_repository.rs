use tracing::error;

use crate::db::models::Conversation;
use crate::db::SupabaseClient;
use crate::errors::DbError;

#[derive(Clone)]
pub struct ConversationRepository {
    client: SupabaseClient,
}

impl ConversationRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Conversations owned by `user_id`, most recently active first.
    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<Conversation>, DbError> {
        self.client
            .from::<Conversation>()
            .eq("user_id", user_id)
            .order("updated_at", false)
            .fetch()
            .await
            .inspect_err(|e| error!("Failed to fetch conversations for user {user_id}: {e}"))
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Conversation>, DbError> {
        self.client
            .from::<Conversation>()
            .eq("id", id)
            .fetch_optional()
            .await
            .inspect_err(|e| error!("Failed to find conversation {id}: {e}"))
    }
}
