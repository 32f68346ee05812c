use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;
use tokio::sync::OnceCell;

use crate::api::rate_limit::RateLimitedClient;
use crate::api::slack::SlackApi;
use crate::models::slack::UserProfile;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub real_name: String,
    pub display_name: String,
}

impl User {
    pub fn from_profile(id: &str, profile: UserProfile) -> Self {
        Self {
            id: id.to_string(),
            real_name: profile.real_name,
            display_name: profile.display_name,
        }
    }

    /// Display name when set, real name otherwise.
    pub fn name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.real_name
        } else {
            &self.display_name
        }
    }
}

/// Run-wide cache of user names. Each id is looked up at most once, even
/// when several channels ask for it concurrently.
pub struct UserDirectory<'a, A> {
    client: &'a RateLimitedClient<A>,
    users: Mutex<HashMap<String, Arc<OnceCell<User>>>>,
}

impl<'a, A: SlackApi> UserDirectory<'a, A> {
    pub fn new(client: &'a RateLimitedClient<A>) -> Self {
        Self {
            client,
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a user's name. A failed lookup yields an empty name and is
    /// not repeated.
    pub async fn resolve(&self, user_id: &str) -> String {
        let cell = {
            let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
            users.entry(user_id.to_string()).or_default().clone()
        };

        let user = cell
            .get_or_init(|| async {
                match self.client.fetch_user_profile(user_id).await {
                    Ok(profile) => User::from_profile(user_id, profile),
                    Err(e) => {
                        warn!("cannot resolve user {user_id}: {e}");
                        User {
                            id: user_id.to_string(),
                            ..User::default()
                        }
                    }
                }
            })
            .await;

        user.name().to_string()
    }

    pub fn len(&self) -> usize {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
