use tracing::error;

use crate::db::models::Message;
use crate::db::SupabaseClient;
use crate::errors::DbError;

#[derive(Clone)]
pub struct MessageRepository {
    client: SupabaseClient,
}

impl MessageRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// All turns of a conversation in the order they were written.
    pub async fn find_by_conversation_id(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, DbError> {
        self.client
            .from::<Message>()
            .eq("conversation_id", conversation_id)
            .order("created_at", true)
            .fetch()
            .await
            .inspect_err(|e| {
                error!("Failed to fetch messages for conversation {conversation_id}: {e}")
            })
    }
}
