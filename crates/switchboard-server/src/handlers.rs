//! Local handlers for the agent's own capabilities.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use switchboard_capabilities::{Capability, LocalHandler};
use switchboard_types::FunctionResult;

const JOKE_UNAVAILABLE: &str = "Sorry, my joke book is unavailable right now.";
const JOKE_EMPTY: &str = "I couldn't find a joke this time. Try again!";
const JOKE_FAILED: &str = "My joke service is taking a break. Try again in a moment!";

#[derive(Debug, Deserialize)]
struct Joke {
    joke: String,
}

/// Client for the dad-joke API.
#[derive(Clone)]
pub struct JokeService {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for JokeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JokeService")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl JokeService {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }

    /// Fetches one joke. Every failure is turned into something the agent
    /// can say, so this never errors.
    pub async fn tell_joke(&self) -> FunctionResult {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("API_NINJAS_KEY is not set; jokes are unavailable");
            return FunctionResult::new(JOKE_UNAVAILABLE);
        };

        match self.fetch(api_key).await {
            Ok(jokes) => match jokes.into_iter().next() {
                Some(joke) => FunctionResult::new(format!("Here's a dad joke: {}", joke.joke)),
                None => FunctionResult::new(JOKE_EMPTY),
            },
            Err(e) => {
                tracing::warn!(error = %e, "joke request failed");
                FunctionResult::new(JOKE_FAILED)
            }
        }
    }

    async fn fetch(&self, api_key: &str) -> Result<Vec<Joke>, reqwest::Error> {
        self.client
            .get(&self.endpoint)
            .header("X-Api-Key", api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// The `tell_joke` capability backed by this service.
    pub fn capability(self) -> Capability {
        let service = Arc::new(self);
        Capability::local(
            "tell_joke",
            "Tell the caller a funny dad joke. Use this whenever someone asks for a joke, \
             humor, or to be entertained.",
            vec![],
            LocalHandler::new(move |_, _| {
                let service = Arc::clone(&service);
                async move { Ok(service.tell_joke().await) }
            }),
        )
    }
}
