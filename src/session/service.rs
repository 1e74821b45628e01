//! Generation service boundary
//!
//! The story, image and speech generators live outside this crate. The
//! session only needs their results, so the boundary is a trait plus the
//! JSON shape of a story turn.

use crate::ambiance::{AmbianceTag, WeatherTag};
use serde::{Deserialize, Serialize};

/// Failures reported by a [`StoryService`]
#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    /// The story generator failed or refused
    #[error("Story generation failed: {0}")]
    Story(String),

    /// No image could be produced
    #[error("Image generation failed: {0}")]
    Image(String),

    /// No speech could be produced
    #[error("Speech generation failed: {0}")]
    Speech(String),

    /// The generator answered with JSON that does not match [`StoryResponse`]
    #[error("Malformed story response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One story turn as produced by the generator
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryResponse {
    /// Next passage of the story
    pub story: String,
    /// Prompt for the scene illustration
    pub image_prompt: String,
    /// Options offered to the player
    pub choices: Vec<String>,
    /// Inventory after this passage
    pub updated_inventory: Vec<String>,
    /// Quest after this passage
    pub updated_quest: String,
    /// Soundscape environment; absent keeps the current one
    #[serde(default)]
    pub ambiance: Option<AmbianceTag>,
    /// Weather overlay; absent keeps the current one
    #[serde(default)]
    pub weather: Option<WeatherTag>,
}

impl StoryResponse {
    /// Parse the generator's JSON answer
    pub fn from_json(text: &str) -> Result<Self, GenerationError> {
        Ok(serde_json::from_str(text.trim())?)
    }
}

/// Text, image and speech generators used by an [`Adventure`](super::Adventure)
pub trait StoryService {
    /// Continue the story from `prompt`
    fn generate_story(
        &mut self,
        prompt: &str,
        inventory: &[String],
        quest: &str,
        weather: WeatherTag,
    ) -> Result<StoryResponse, GenerationError>;

    /// Illustrate a scene; returns a displayable image URL
    fn generate_image(&mut self, image_prompt: &str) -> Result<String, GenerationError>;

    /// Narrate a passage; returns base64 encoded 16-bit PCM
    fn generate_speech(&mut self, story: &str) -> Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generator_answer() {
        let json = r#"
            {
              "story": "Rain hammers the courtyard.",
              "imagePrompt": "a wet courtyard",
              "choices": ["Run", "Hide"],
              "updatedInventory": ["A rusty key"],
              "updatedQuest": "Escape",
              "ambiance": "TOWN",
              "weather": "STORM"
            }
        "#;
        let response = StoryResponse::from_json(json).unwrap();
        assert_eq!(response.choices.len(), 2);
        assert_eq!(response.ambiance, Some(AmbianceTag::Town));
        assert_eq!(response.weather, Some(WeatherTag::Storm));
    }

    #[test]
    fn test_missing_tags_and_bad_json() {
        let json = r#"{"story":"s","imagePrompt":"p","choices":[],"updatedInventory":[],"updatedQuest":"q"}"#;
        let response = StoryResponse::from_json(json).unwrap();
        assert_eq!(response.ambiance, None);
        assert_eq!(response.weather, None);

        let err = StoryResponse::from_json("{\"story\": 3}").unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }
}
