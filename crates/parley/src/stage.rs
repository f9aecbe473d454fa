use std::time::Duration;

use parley_core::catalog::PersonaCatalog;
use parley_core::conversation::{ConversationConfig, ConversationId};
use parley_core::{DialogueHub, DialogueHubBuilder, Error};
use parley_model::GenerationProvider;
use parley_ollama_model::{OllamaConfig, OllamaProvider};

/// A stage builder.
///
/// See [`Stage`].
pub struct StageBuilder {
    hub_builder: DialogueHubBuilder,
}

impl StageBuilder {
    /// Creates a stage builder with a specified generation provider.
    pub fn with_generation_provider<P: GenerationProvider + 'static>(
        provider: P,
    ) -> Self {
        let hub_builder =
            DialogueHubBuilder::with_generation_provider(provider);
        Self { hub_builder }
    }

    /// Creates a stage builder backed by an Ollama server, configured
    /// from the `OLLAMA_HOST` environment variable.
    pub fn from_env() -> Self {
        let provider = OllamaProvider::new(OllamaConfig::from_env());
        Self::with_generation_provider(provider)
    }

    /// Replaces the builtin persona catalog.
    #[inline]
    pub fn with_catalog(mut self, catalog: PersonaCatalog) -> Self {
        self.hub_builder = self.hub_builder.with_catalog(catalog);
        self
    }

    /// Overrides the pause between consecutive turns of a round.
    #[inline]
    pub fn with_turn_pause(mut self, pause: Duration) -> Self {
        self.hub_builder = self.hub_builder.with_turn_pause(pause);
        self
    }

    /// Builds a new stage.
    pub fn build(self) -> Stage {
        Stage {
            hub: self.hub_builder.build(),
        }
    }
}

/// A dialogue stage, which hosts conversations and the viewers watching
/// them.
///
/// The stage holds a fully configured hub that you can use directly,
/// and it is basically a wrapper around [`DialogueHub`].
pub struct Stage {
    hub: DialogueHub,
}

impl Stage {
    /// Creates a conversation and immediately begins its opening round.
    pub async fn open(
        &self,
        config: ConversationConfig,
    ) -> Result<ConversationId, Error> {
        let id = self.hub.create(config)?;
        self.hub.start(id).await?;
        Ok(id)
    }

    /// The underlying hub.
    #[inline]
    pub fn hub(&self) -> &DialogueHub {
        &self.hub
    }
}
