//! The agent's capabilities and prompt.

use std::time::Duration;

use serde_json::json;
use switchboard_capabilities::{Capability, CapabilityRegistry, RegistryError, SkillCatalog};
use switchboard_datamap::{DataMap, DatamapError, RemoteCallSpec};
use switchboard_prompt::PromptComposer;

use crate::config::{AgentConfig, Secrets};
use crate::handlers::JokeService;

/// Registers every capability the agent offers.
///
/// A capability whose secret is missing is skipped with a warning; the rest
/// of the agent still starts. Any other registration problem is an error.
pub fn build_registry(
    agent: &AgentConfig,
    secrets: &Secrets,
) -> Result<CapabilityRegistry, RegistryError> {
    let mut registry = CapabilityRegistry::new();

    let jokes = JokeService::new(
        agent.joke_api_url.clone(),
        secrets.api_ninjas_key.clone(),
        Duration::from_millis(agent.joke_timeout_ms),
    );
    registry.register(jokes.capability())?;

    match weather_datamap(&agent.weather_api_url, secrets.weather_api_key.as_deref()) {
        Ok(spec) => registry.register(Capability::remote(spec))?,
        Err(e) if e.is_configuration() => {
            tracing::warn!(
                capability = "get_weather",
                error = %e,
                "WEATHER_API_KEY is not set; weather is disabled"
            );
        }
        Err(e) => return Err(RegistryError::Schema(e.to_string())),
    }

    let catalog = SkillCatalog::with_builtins();
    registry.add_skill(
        &catalog,
        "datetime",
        json!({ "default_timezone": agent.default_timezone }),
    )?;
    registry.add_skill(&catalog, "math", serde_json::Value::Null)?;

    tracing::info!(capabilities = registry.len(), "capability registry ready");
    Ok(registry)
}

/// The `get_weather` remote call. The API key is baked in at compile time;
/// without one, compilation fails with a configuration error.
pub fn weather_datamap(
    endpoint: &str,
    api_key: Option<&str>,
) -> Result<RemoteCallSpec, DatamapError> {
    let mut map = DataMap::new("get_weather")
        .description(
            "Get the current weather for a city. Use this when the caller asks about \
             weather, temperature, or conditions.",
        )
        .parameter("city", "string", "The city to get weather for", true)
        .webhook(
            "GET",
            format!("{endpoint}?key=${{config.WEATHER_API_KEY}}&q=${{enc:args.city}}"),
        )
        .output(
            "Weather in ${args.city}: ${response.current.condition.text}, \
             ${response.current.temp_f} degrees Fahrenheit, \
             humidity ${response.current.humidity} percent. \
             Feels like ${response.current.feelslike_f} degrees.",
        )
        .fallback_output(
            "Sorry, I couldn't get the weather for ${args.city}. \
             Please check the city name and try again.",
        );
    if let Some(key) = api_key {
        map = map.bind("WEATHER_API_KEY", key);
    }
    map.compile()
}

/// The default persona: a cheerful phone assistant.
pub fn buddy_prompt(name: &str) -> PromptComposer {
    let mut prompt = PromptComposer::new();
    prompt
        .add_section(
            "Personality",
            format!(
                "You are {name}, a cheerful and witty AI phone assistant. You have a warm, \
                 upbeat personality and you genuinely enjoy helping people. You're a bit of \
                 a dad joke enthusiast. Think of yourself as that friendly neighbor who \
                 always has a joke ready and knows what the weather is like."
            ),
        )
        .add_section_with_bullets(
            "Voice Style",
            "Since this is a phone conversation:",
            [
                "Keep responses to 1-2 sentences when possible",
                "Use conversational language, not formal or robotic",
                "React naturally to what the caller says",
                "Use smooth transitions between topics",
            ],
        )
        .add_section_with_bullets(
            "Capabilities",
            "You can help with:",
            [
                "Weather: current conditions for any city worldwide",
                "Jokes: endless supply of fresh dad jokes",
                "Date and time: current time in any timezone",
                "Math: calculations and percentages",
                "General chat: friendly conversation on any topic",
            ],
        )
        .add_section(
            "Greeting",
            format!(
                "When the call starts, introduce yourself as {name} and briefly mention \
                 what you can help with. Keep the greeting to one or two sentences; don't \
                 list every capability."
            ),
        )
        .set_post_prompt(
            "Summarize this conversation in 2-3 sentences. Note what the caller asked \
             about (weather, jokes, time, math, etc.) and how the interaction went.",
        );
    prompt
}
