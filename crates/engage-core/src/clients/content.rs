//! ============================================================================
//! ContentClient - AI Content Generation
//! ============================================================================
//! Wraps the service's generation endpoints. The generation model itself is
//! opaque; this client only shapes requests and validates obvious limits
//! before spending a round trip.
//! ============================================================================

use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::api::ApiClient;
use crate::types::{
    GeneratedContent, GeneratedThread, ToneAnalysis, TonePreset, ToneSettings, UserSettings,
};

/// Maximum characters per generated post
pub const MAX_POST_LENGTH: u32 = 280;

/// Client for AI-powered content generation
pub struct ContentClient {
    api: Arc<ApiClient>,
}

impl ContentClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Generate reply candidates for an existing post
    pub async fn generate_reply(
        &self,
        source_text: &str,
        context: Option<&str>,
        tone: &ToneSettings,
        max_length: u32,
    ) -> Result<GeneratedContent> {
        info!(tone = tone.tone_name, "generating reply");

        let request = GenerateReplyRequest {
            source_text,
            context,
            tone,
            max_length,
        };
        let generated = self.api.post("/content/generate-reply", &request).await?;
        Ok(generated)
    }

    /// Generate post candidates from a description
    pub async fn generate_post(
        &self,
        description: &str,
        tone: &ToneSettings,
        max_length: u32,
    ) -> Result<GeneratedContent> {
        info!(tone = tone.tone_name, "generating post");

        let request = GeneratePostRequest {
            description,
            tone,
            max_length,
        };
        let generated = self.api.post("/content/generate-post", &request).await?;
        Ok(generated)
    }

    /// Generate a thread on a topic
    pub async fn generate_thread(
        &self,
        main_topic: &str,
        num_posts: u32,
        tone: &ToneSettings,
        keywords: Option<&[String]>,
    ) -> Result<GeneratedThread> {
        if !(2..=10).contains(&num_posts) {
            bail!("Thread length must be between 2 and 10 posts");
        }
        info!(num_posts, tone = tone.tone_name, "generating thread");

        let request = GenerateThreadRequest {
            main_topic,
            num_posts,
            tone,
            keywords,
            max_length_per_post: MAX_POST_LENGTH,
        };
        let generated = self.api.post("/content/generate-thread", &request).await?;
        Ok(generated)
    }

    /// Analyze the tone of an arbitrary text
    pub async fn analyze_tone(&self, text: &str) -> Result<ToneAnalysis> {
        let request = AnalyzeToneRequest { text };
        let analysis = self.api.post("/content/analyze-tone", &request).await?;
        Ok(analysis)
    }

    /// List the tone presets offered in the settings screen: the built-in
    /// set first, then the user-created ones
    pub async fn tone_presets(&self) -> Result<Vec<TonePreset>> {
        let settings: UserSettings = self.api.get("/user/settings").await?;
        Ok(all_presets(settings))
    }

    /// Save a user-created tone preset; the service echoes the stored preset
    pub async fn create_tone_preset(&self, preset: &TonePreset) -> Result<TonePreset> {
        info!(name = preset.name, "creating tone preset");
        let saved = self.api.post("/user/tone-presets", preset).await?;
        Ok(saved)
    }

    /// Delete a user-created tone preset by name
    pub async fn delete_tone_preset(&self, name: &str) -> Result<()> {
        let _: serde_json::Value = self
            .api
            .delete(&format!("/user/tone-presets/{}", name))
            .await?;
        info!(name, "tone preset deleted");
        Ok(())
    }
}

fn all_presets(settings: UserSettings) -> Vec<TonePreset> {
    let mut presets = settings.tone_presets;
    presets.extend(settings.custom_tone_presets);
    presets
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Serialize)]
struct GenerateReplyRequest<'a> {
    #[serde(rename = "tweet_text")]
    source_text: &'a str,
    #[serde(rename = "tweet_context", skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    tone: &'a ToneSettings,
    max_length: u32,
}

#[derive(Serialize)]
struct GeneratePostRequest<'a> {
    description: &'a str,
    tone: &'a ToneSettings,
    max_length: u32,
}

#[derive(Serialize)]
struct GenerateThreadRequest<'a> {
    main_topic: &'a str,
    #[serde(rename = "num_tweets")]
    num_posts: u32,
    tone: &'a ToneSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    keywords: Option<&'a [String]>,
    #[serde(rename = "max_length_per_tweet")]
    max_length_per_post: u32,
}

#[derive(Serialize)]
struct AnalyzeToneRequest<'a> {
    text: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngageConfig;

    fn client() -> ContentClient {
        let api = Arc::new(ApiClient::new(
            &EngageConfig::with_base_url("http://localhost:0/api"),
            None,
        ));
        ContentClient::new(api)
    }

    #[tokio::test]
    async fn thread_length_is_validated_before_any_request() {
        let content = client();
        let tone = ToneSettings::named("witty");

        let err = content
            .generate_thread("rust", 1, &tone, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("between 2 and 10"));

        let err = content
            .generate_thread("rust", 11, &tone, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("between 2 and 10"));
    }

    #[test]
    fn preset_listing_keeps_builtins_ahead_of_custom_presets() {
        let settings: UserSettings = serde_json::from_str(
            r#"{
                "default_tone": "professional",
                "tone_presets": [
                    {"name": "professional", "description": "Polished", "is_default": true}
                ],
                "custom_tone_presets": [
                    {"name": "hype", "description": "All caps energy", "emoji": "🔥"}
                ]
            }"#,
        )
        .unwrap();

        let presets = all_presets(settings);
        assert_eq!(presets.len(), 2);
        assert_eq!(presets[0].name, "professional");
        assert!(presets[0].is_default);
        assert_eq!(presets[1].name, "hype");
        assert_eq!(presets[1].emoji.as_deref(), Some("🔥"));
    }

    #[test]
    fn reply_request_uses_the_service_field_names() {
        let tone = ToneSettings::named("professional");
        let request = GenerateReplyRequest {
            source_text: "hello",
            context: None,
            tone: &tone,
            max_length: 280,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tweet_text"], "hello");
        assert!(json.get("tweet_context").is_none());
        assert_eq!(json["tone"]["tone_name"], "professional");
    }
}
