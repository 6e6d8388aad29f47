use tracing::error;

use crate::db::models::FinancialProfile;
use crate::db::SupabaseClient;
use crate::errors::DbError;

#[derive(Clone)]
pub struct FinancialProfileRepository {
    client: SupabaseClient,
}

impl FinancialProfileRepository {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// A user has at most one financial profile; `None` when they never filled it in.
    pub async fn find_by_user(&self, user_id: &str) -> Result<Option<FinancialProfile>, DbError> {
        self.client
            .from::<FinancialProfile>()
            .eq("user_id", user_id)
            .fetch_optional()
            .await
            .inspect_err(|e| error!("Failed to fetch financial profile for user {user_id}: {e}"))
    }
}
