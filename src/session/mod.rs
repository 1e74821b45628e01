//! Adventure Session
//!
//! Orchestrates one playthrough: asks the generation service for the next
//! story turn, keeps the game state, drives the ambiance engine and the
//! narration transport, and saves/restores the game.
//!
//! Generation failures never escape as errors. They are reflected in
//! [`GameState`] the way the player should see them:
//! - story failure aborts the turn with [`GameStatus::Error`]
//! - image or speech failure keeps the turn and only records a message

pub mod service;
pub mod store;

pub use service::{GenerationError, StoryResponse, StoryService};
pub use store::{FileStore, MemoryStore, SaveStore, SAVE_KEY};

use crate::ambiance::{AmbianceEngine, AmbianceTag, SfxKind, WeatherTag};
use crate::config::AudioConfig;
use crate::narration::{decode_speech, NarrationTransport};
use crate::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Prompt that opens a new adventure
pub const OPENING_PROMPT: &str = "You awaken in a cold, damp cell in the Whispering Dungeons. \
A rusty key and some stale bread are in your pocket. Your quest is to escape. \
Describe the scene and your immediate options.";

/// Prompt used to retry after a failed turn
pub const RETRY_PROMPT: &str =
    "Let's try that again. Take me back to where I was, just before the error happened.";

/// Shown when the story could not be generated
pub const STORY_ERROR_MESSAGE: &str = "A mysterious force has blocked your path. Please try again.";

/// Shown when the illustration could not be generated
pub const IMAGE_ERROR_MESSAGE: &str = "Failed to generate image.";

/// Shown when the narration could not be generated or decoded
pub const AUDIO_ERROR_MESSAGE: &str = "Failed to generate audio narration.";

/// Phase of the game loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Nothing generated yet
    #[default]
    Init,
    /// Waiting for the story generator
    Loading,
    /// A turn is on screen
    Playing,
    /// The last turn failed
    Error,
}

/// Everything a save game holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameState {
    /// Phase of the game loop
    pub status: GameStatus,
    /// Current passage
    pub story: String,
    /// Illustration of the current passage
    pub image_url: String,
    /// Prompt the illustration was generated from
    pub image_prompt: String,
    /// Options offered to the player
    pub choices: Vec<String>,
    /// Items carried
    pub inventory: Vec<String>,
    /// Current quest
    pub quest: String,
    /// Soundscape environment
    pub ambiance: Option<AmbianceTag>,
    /// Weather overlay
    pub weather: Option<WeatherTag>,
    /// Message for the player, if the last turn went wrong
    pub error: Option<String>,
}

impl Default for GameState {
    fn default() -> Self {
        GameState {
            status: GameStatus::Init,
            story: String::new(),
            image_url: String::new(),
            image_prompt: String::new(),
            choices: Vec::new(),
            inventory: vec!["A rusty key".into(), "A piece of stale bread".into()],
            quest: "Find your way out of the Whispering Dungeons.".into(),
            ambiance: None,
            weather: None,
            error: None,
        }
    }
}

impl GameState {
    /// Prompt continuing the story after the player picked `choice`
    pub fn continuation_prompt(&self, choice: &str) -> String {
        format!(
            "My last action was: \"{}\". The story so far is: \"{}\". My current inventory is [{}] and my quest is \"{}\". Continue the story based on my choice.",
            choice,
            self.story,
            self.inventory.join(", "),
            self.quest
        )
    }
}

/// One playthrough wired to a story service and both audio subsystems
pub struct Adventure<S: StoryService> {
    state: GameState,
    service: S,
    ambiance: AmbianceEngine,
    narration: NarrationTransport,
    store: Box<dyn SaveStore>,
}

impl<S: StoryService> Adventure<S> {
    /// Assemble a session from its collaborators
    pub fn new(
        service: S,
        ambiance: AmbianceEngine,
        narration: NarrationTransport,
        store: impl SaveStore + 'static,
    ) -> Self {
        Adventure {
            state: GameState::default(),
            service,
            ambiance,
            narration,
            store: Box::new(store),
        }
    }

    /// Headless session on offline runtimes with an in-memory save store
    pub fn offline(service: S, config: &AudioConfig) -> Self {
        Self::new(
            service,
            AmbianceEngine::offline(config.ambiance),
            NarrationTransport::offline(config.narration),
            MemoryStore::new(),
        )
    }

    /// Open the adventure
    pub fn start(&mut self) {
        self.take_turn(OPENING_PROMPT);
    }

    /// Continue the story with the option the player picked
    pub fn choose(&mut self, choice: &str) {
        self.select_cue();
        let prompt = self.state.continuation_prompt(choice);
        self.take_turn(&prompt);
    }

    /// Ask the generator to pick up again after a failed turn
    pub fn retry(&mut self) {
        self.take_turn(RETRY_PROMPT);
    }

    /// Run one story turn from `prompt`
    pub fn take_turn(&mut self, prompt: &str) {
        self.narration.stop();
        self.state.status = GameStatus::Loading;
        self.state.story.clear();
        self.state.image_url.clear();
        self.state.choices.clear();
        self.state.error = None;

        let weather = self.state.weather.unwrap_or_default();
        let response = match self.service.generate_story(
            prompt,
            &self.state.inventory,
            &self.state.quest,
            weather,
        ) {
            Ok(response) => response,
            Err(err) => {
                warn!("story turn failed: {}", err);
                self.state.status = GameStatus::Error;
                self.state.error = Some(STORY_ERROR_MESSAGE.to_string());
                return;
            }
        };

        let ambiance = response.ambiance.or(self.state.ambiance).unwrap_or_default();
        let weather = response.weather.unwrap_or(weather);
        self.state.status = GameStatus::Playing;
        self.state.story = response.story;
        self.state.choices = response.choices;
        self.state.inventory = response.updated_inventory;
        self.state.quest = response.updated_quest;
        self.state.image_prompt = response.image_prompt;
        self.state.ambiance = Some(ambiance);
        self.state.weather = Some(weather);
        self.ambiance.set_ambiance(ambiance, weather);
        info!("turn ready: {} choices, {}/{}", self.state.choices.len(), ambiance, weather);

        match self.service.generate_image(&self.state.image_prompt) {
            Ok(url) => self.state.image_url = url,
            Err(err) => {
                warn!("illustration failed: {}", err);
                self.state.error = Some(IMAGE_ERROR_MESSAGE.to_string());
            }
        }

        if let Err(message) = self.narrate() {
            warn!("narration failed: {}", message);
            self.state.error = Some(AUDIO_ERROR_MESSAGE.to_string());
        }
    }

    /// Play the choice-selection cue
    pub fn select_cue(&mut self) {
        self.ambiance.play_sfx(SfxKind::Select);
    }

    /// Store the full game state as JSON under [`SAVE_KEY`]
    pub fn save(&mut self) -> Result<()> {
        let json = serde_json::to_string(&self.state)?;
        self.store.write(SAVE_KEY, &json)?;
        info!("game saved");
        Ok(())
    }

    /// True when a save exists
    pub fn has_save(&self) -> Result<bool> {
        self.store.contains(SAVE_KEY)
    }

    /// Restore the saved game; false when there is none
    ///
    /// Saves without soundscape tags restore as dungeon in clear weather.
    pub fn load(&mut self) -> Result<bool> {
        let Some(json) = self.store.read(SAVE_KEY)? else {
            return Ok(false);
        };
        let mut state: GameState = serde_json::from_str(&json)?;
        self.narration.stop();
        let ambiance = *state.ambiance.get_or_insert(AmbianceTag::Dungeon);
        let weather = *state.weather.get_or_insert(WeatherTag::Clear);
        self.state = state;
        self.ambiance.set_ambiance(ambiance, weather);
        info!("game loaded: {}/{}", ambiance, weather);
        Ok(true)
    }

    /// Run ambiance housekeeping and narration end-of-playback handling
    pub fn process(&mut self) {
        self.ambiance.process();
        self.narration.poll();
    }

    /// Current game state
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Ambiance engine
    pub fn ambiance(&self) -> &AmbianceEngine {
        &self.ambiance
    }

    /// Mutable ambiance engine, for rendering
    pub fn ambiance_mut(&mut self) -> &mut AmbianceEngine {
        &mut self.ambiance
    }

    /// Narration transport
    pub fn narration(&self) -> &NarrationTransport {
        &self.narration
    }

    /// Mutable narration transport, for rendering and playback controls
    pub fn narration_mut(&mut self) -> &mut NarrationTransport {
        &mut self.narration
    }

    /// Story service
    pub fn service(&self) -> &S {
        &self.service
    }

    fn narrate(&mut self) -> std::result::Result<(), String> {
        let payload = self
            .service
            .generate_speech(&self.state.story)
            .map_err(|e| e.to_string())?;
        let buffer = decode_speech(&payload, self.narration.config()).map_err(|e| e.to_string())?;
        self.narration.load(Arc::new(buffer));
        self.narration.play();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, NarrationConfig};
    use crate::narration::TransportState;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedService {
        stories: VecDeque<StoryResponse>,
        fail_image: bool,
        fail_speech: bool,
        prompts: Vec<String>,
        weathers: Vec<WeatherTag>,
    }

    impl StoryService for ScriptedService {
        fn generate_story(
            &mut self,
            prompt: &str,
            _inventory: &[String],
            _quest: &str,
            weather: WeatherTag,
        ) -> std::result::Result<StoryResponse, GenerationError> {
            self.prompts.push(prompt.to_string());
            self.weathers.push(weather);
            self.stories
                .pop_front()
                .ok_or_else(|| GenerationError::Story("script exhausted".into()))
        }

        fn generate_image(&mut self, image_prompt: &str) -> std::result::Result<String, GenerationError> {
            if self.fail_image {
                return Err(GenerationError::Image("blank canvas".into()));
            }
            Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(image_prompt)))
        }

        fn generate_speech(&mut self, _story: &str) -> std::result::Result<String, GenerationError> {
            if self.fail_speech {
                return Err(GenerationError::Speech("silence".into()));
            }
            // 0.1 s of a quiet square wave at 8 kHz
            let bytes: Vec<u8> = (0..800)
                .flat_map(|i| (if i % 20 < 10 { 4096i16 } else { -4096 }).to_le_bytes())
                .collect();
            Ok(STANDARD.encode(bytes))
        }
    }

    fn turn(story: &str, ambiance: Option<AmbianceTag>, weather: Option<WeatherTag>) -> StoryResponse {
        StoryResponse {
            story: story.into(),
            image_prompt: format!("{story} scene"),
            choices: vec!["Open the door".into(), "Wait".into()],
            updated_inventory: vec!["A rusty key".into()],
            updated_quest: "Escape the dungeon".into(),
            ambiance,
            weather,
        }
    }

    fn adventure(service: ScriptedService) -> Adventure<ScriptedService> {
        let config = AudioConfig {
            ambiance: EngineConfig {
                sample_rate: 8_000,
                ..EngineConfig::default()
            },
            narration: NarrationConfig {
                sample_rate: 8_000,
                channels: 1,
            },
        };
        Adventure::offline(service, &config)
    }

    #[test]
    fn test_initial_state() {
        let state = GameState::default();
        assert_eq!(state.status, GameStatus::Init);
        assert_eq!(state.inventory, vec!["A rusty key", "A piece of stale bread"]);
        assert_eq!(state.quest, "Find your way out of the Whispering Dungeons.");
    }

    #[test]
    fn test_successful_turn() {
        let mut service = ScriptedService::default();
        service
            .stories
            .push_back(turn("A cell.", Some(AmbianceTag::Dungeon), Some(WeatherTag::Rain)));
        let mut adventure = adventure(service);
        adventure.start();

        let state = adventure.state();
        assert_eq!(state.status, GameStatus::Playing);
        assert_eq!(state.story, "A cell.");
        assert_eq!(state.choices.len(), 2);
        assert_eq!(state.inventory, vec!["A rusty key"]);
        assert!(state.image_url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(state.error, None);
        assert_eq!(adventure.service().prompts[0], OPENING_PROMPT);
        assert_eq!(
            adventure.ambiance().current_tags(),
            Some((AmbianceTag::Dungeon, WeatherTag::Rain))
        );
        assert_eq!(adventure.narration().state(), TransportState::Playing);
        let buffer = adventure.narration().buffer().unwrap();
        assert_eq!(buffer.length(), 800);
        assert_eq!(buffer.sample_rate(), 8_000);
    }

    #[test]
    fn test_story_failure_aborts_turn() {
        let mut adventure = adventure(ScriptedService::default());
        adventure.start();
        let state = adventure.state();
        assert_eq!(state.status, GameStatus::Error);
        assert_eq!(state.error.as_deref(), Some(STORY_ERROR_MESSAGE));
        assert!(state.story.is_empty());
        assert!(adventure.ambiance().current_tags().is_none());
        assert_eq!(adventure.narration().state(), TransportState::Idle);
    }

    #[test]
    fn test_image_and_speech_failures_degrade() {
        let mut service = ScriptedService {
            fail_image: true,
            ..ScriptedService::default()
        };
        service.stories.push_back(turn("A forest.", Some(AmbianceTag::Nature), None));
        let mut adventure = adventure(service);
        adventure.start();
        assert_eq!(adventure.state().status, GameStatus::Playing);
        assert_eq!(adventure.state().error.as_deref(), Some(IMAGE_ERROR_MESSAGE));
        assert!(adventure.state().image_url.is_empty());
        assert_eq!(adventure.narration().state(), TransportState::Playing);

        let mut service = ScriptedService {
            fail_speech: true,
            ..ScriptedService::default()
        };
        service.stories.push_back(turn("A town.", Some(AmbianceTag::Town), None));
        let mut adventure = self::adventure(service);
        adventure.start();
        assert_eq!(adventure.state().status, GameStatus::Playing);
        assert_eq!(adventure.state().error.as_deref(), Some(AUDIO_ERROR_MESSAGE));
        assert_eq!(adventure.narration().state(), TransportState::Idle);
        assert!(!adventure.state().image_url.is_empty());
    }

    #[test]
    fn test_missing_tags_keep_current_ones() {
        let mut service = ScriptedService::default();
        service
            .stories
            .push_back(turn("One.", Some(AmbianceTag::Battle), Some(WeatherTag::Storm)));
        service.stories.push_back(turn("Two.", None, Some(WeatherTag::Fog)));
        service.stories.push_back(turn("Three.", None, None));
        let mut adventure = adventure(service);

        adventure.start();
        adventure.choose("Open the door");
        assert_eq!(
            adventure.ambiance().current_tags(),
            Some((AmbianceTag::Battle, WeatherTag::Fog))
        );
        adventure.choose("Wait");
        assert_eq!(adventure.state().ambiance, Some(AmbianceTag::Battle));
        assert_eq!(adventure.state().weather, Some(WeatherTag::Fog));
        assert_eq!(adventure.ambiance().soundscape_builds(), 2);
        // Current weather is handed to the generator
        assert_eq!(
            adventure.service().weathers,
            vec![WeatherTag::Clear, WeatherTag::Storm, WeatherTag::Fog]
        );
    }

    #[test]
    fn test_choice_prompt_and_cue() {
        let mut service = ScriptedService::default();
        service.stories.push_back(turn("A cell.", None, None));
        service.stories.push_back(turn("A corridor.", None, None));
        let mut adventure = adventure(service);
        adventure.start();
        adventure.choose("Open the door");

        assert_eq!(
            adventure.service().prompts[1],
            "My last action was: \"Open the door\". The story so far is: \"A cell.\". \
             My current inventory is [A rusty key] and my quest is \"Escape the dungeon\". \
             Continue the story based on my choice."
        );
        assert_eq!(adventure.ambiance().one_shot_count(), 1);
    }

    #[test]
    fn test_new_turn_stops_narration() {
        let mut service = ScriptedService::default();
        service.stories.push_back(turn("A cell.", None, None));
        let mut adventure = adventure(service);
        adventure.start();
        let first = adventure.narration().current_source();
        assert!(first.is_some());

        // Script exhausted: the turn fails, but narration still stops first
        adventure.retry();
        assert_eq!(adventure.narration().state(), TransportState::Idle);
        assert_eq!(adventure.service().prompts[1], RETRY_PROMPT);
    }

    #[test]
    fn test_save_and_load() {
        let mut service = ScriptedService::default();
        service
            .stories
            .push_back(turn("A glade.", Some(AmbianceTag::Mystical), Some(WeatherTag::Windy)));
        let mut adventure = adventure(service);
        assert!(!adventure.load().unwrap());
        adventure.start();
        adventure.save().unwrap();
        assert!(adventure.has_save().unwrap());
        let saved = adventure.state().clone();

        adventure.ambiance_mut().stop_all();
        assert!(adventure.load().unwrap());
        assert_eq!(adventure.state(), &saved);
        assert_eq!(adventure.narration().state(), TransportState::Idle);
        assert_eq!(
            adventure.ambiance().current_tags(),
            Some((AmbianceTag::Mystical, WeatherTag::Windy))
        );
    }

    #[test]
    fn test_load_without_tags_defaults() {
        let mut store = MemoryStore::new();
        store
            .write(
                SAVE_KEY,
                r#"{"status":"PLAYING","story":"Old save","imageUrl":"","imagePrompt":"",
                   "choices":["Go"],"inventory":[],"quest":"Leave","error":null}"#,
            )
            .unwrap();
        let mut adventure = Adventure::new(
            ScriptedService::default(),
            AmbianceEngine::offline(EngineConfig {
                sample_rate: 8_000,
                ..EngineConfig::default()
            }),
            NarrationTransport::offline(NarrationConfig::default()),
            store,
        );
        assert!(adventure.load().unwrap());
        assert_eq!(adventure.state().story, "Old save");
        assert_eq!(adventure.state().ambiance, Some(AmbianceTag::Dungeon));
        assert_eq!(adventure.state().weather, Some(WeatherTag::Clear));
        assert_eq!(
            adventure.ambiance().current_tags(),
            Some((AmbianceTag::Dungeon, WeatherTag::Clear))
        );
    }

    #[test]
    fn test_corrupt_save_keeps_state() {
        let mut store = MemoryStore::new();
        store.write(SAVE_KEY, "{not json").unwrap();
        let mut adventure = Adventure::new(
            ScriptedService::default(),
            AmbianceEngine::offline(EngineConfig::default()),
            NarrationTransport::offline(NarrationConfig::default()),
            store,
        );
        assert!(adventure.load().is_err());
        assert_eq!(adventure.state(), &GameState::default());
    }
}
