//! Prompts and studio configuration.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Instruction sent with every uploaded or seeded image.
pub const SCULPTURE_PROMPT: &str = "\
You are an expert sculptor. Your task is to transform the provided image into a photorealistic, classical-style marble sculpture.

**Instructions:**
1.  **Analyze the subject:** Identify the main subject(s) of the image.
2.  **Convert to Marble:** Re-render the entire image as if it were carved from a single block of pristine white Carrara marble.
3.  **Texture and Detail:** The texture should be smooth but with subtle, realistic marble grain. Capture the fine details of the original image in the sculpture's form.
4.  **Lighting:** The sculpture should be lit with dramatic, soft studio lighting (chiaroscuro) to emphasize its form and contours. The background should be a simple, dark, out-of-focus studio setting.
5.  **Realism:** The final output must be a photorealistic image of the marble sculpture, not a digital-looking render. It should look like a real photograph of a physical object.
6.  **Output:** Provide only the final image. Do not include any text, descriptions, or commentary.
";

/// Placeholder replaced by the user's refinement text.
pub const REFINEMENT_PLACEHOLDER: &str = "{refinement}";

/// Template for refinement requests.
pub const REFINE_PROMPT_TEMPLATE: &str = "\
Based on the sculpture you've already created, please apply the following refinement: \"{refinement}\".

Maintain the existing style, lighting, and composition. Only modify the sculpture according to the request. The output should be a new, photorealistic image of the refined sculpture. Do not add any text.";

/// Placeholder replaced by a random item in [`RANDOM_IMAGE_PROMPT_TEMPLATE`].
pub const ITEM_PLACEHOLDER: &str = "{item}";

/// Template for text-to-image seed generation.
pub const RANDOM_IMAGE_PROMPT_TEMPLATE: &str = "\
Photorealistic, studio-lit portrait of {item}.
The subject should be the central focus, sharply detailed.
The background should be a clean, simple, dark, out-of-focus studio setting.
The lighting should be dramatic and soft, creating depth and highlighting textures.
High resolution, 8K, professional photography.";

/// Subjects for generated seed images.
pub const RANDOM_ITEM_PROMPTS: [&str; 12] = [
    "a vintage film camera",
    "a steaming cup of artisanal coffee",
    "a collection of antique skeleton keys",
    "a perfectly ripe avocado, sliced in half",
    "a stack of old, leather-bound books",
    "a complex mechanical watch movement",
    "a blooming sakura blossom branch",
    "a detailed, colorful macaw feather",
    "a melting ice cream cone",
    "a retro-futuristic ray gun",
    "a crystal ball reflecting a galaxy",
    "a single, perfect seashell on wet sand",
];

/// Captions rotated while a request is in flight.
pub const LOADING_MESSAGES: [&str; 5] = [
    "Chiseling the fine details...",
    "Polishing the marble...",
    "Setting up studio lighting...",
    "Consulting the muses...",
    "Carving with digital precision...",
];

/// One-click refinement suggestions.
pub const QUICK_EDITS: [&str; 4] = [
    "Make it more shiny",
    "Give it a rougher texture",
    "Add subtle gold veins",
    "Add dramatic lighting",
];

/// Portrait endpoint used by [`SeedSource::Remote`] when none is given.
pub const DEFAULT_SEED_URL: &str = "https://source.unsplash.com/512x512/?portrait,face";

/// Where a random seed image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeedSource {
    /// Text-to-image over a randomly chosen item prompt.
    #[default]
    Generated,
    /// Download a portrait from a URL.
    Remote {
        /// Image URL; fetched once per request.
        url: String,
    },
}

/// What happens to a random seed once it has been converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// The seed becomes `original`, exactly like an upload.
    #[default]
    Tracked,
    /// The seed is dropped; the converted sculpture is the refinement base.
    OneShot,
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Instruction for the initial conversion.
    pub style_prompt: String,
    /// Refinement template containing [`REFINEMENT_PLACEHOLDER`].
    pub refine_template: String,
    /// Seed prompt template containing [`ITEM_PLACEHOLDER`].
    pub seed_template: String,
    /// Subjects picked from for generated seeds.
    pub seed_items: Vec<String>,
    /// Where random seeds come from.
    pub seed_source: SeedSource,
    /// Whether a random seed is kept as `original`.
    pub seed_policy: SeedPolicy,
    /// Progress captions; empty disables the rotation.
    pub captions: Vec<String>,
    /// Milliseconds between caption changes; zero disables the rotation.
    pub caption_interval_ms: u64,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            style_prompt: SCULPTURE_PROMPT.to_string(),
            refine_template: REFINE_PROMPT_TEMPLATE.to_string(),
            seed_template: RANDOM_IMAGE_PROMPT_TEMPLATE.to_string(),
            seed_items: RANDOM_ITEM_PROMPTS.iter().map(|s| s.to_string()).collect(),
            seed_source: SeedSource::default(),
            seed_policy: SeedPolicy::default(),
            captions: LOADING_MESSAGES.iter().map(|s| s.to_string()).collect(),
            caption_interval_ms: 3000,
        }
    }
}

impl StudioConfig {
    /// Sets the seed source.
    pub fn with_seed_source(mut self, source: SeedSource) -> Self {
        self.seed_source = source;
        self
    }

    /// Sets the seed policy.
    pub fn with_seed_policy(mut self, policy: SeedPolicy) -> Self {
        self.seed_policy = policy;
        self
    }

    /// Sets the progress captions and their interval.
    pub fn with_captions(mut self, captions: Vec<String>, interval: Duration) -> Self {
        self.captions = captions;
        self.caption_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Caption rotation interval.
    pub fn caption_interval(&self) -> Duration {
        Duration::from_millis(self.caption_interval_ms)
    }

    /// Full instruction for a refinement over the original image.
    ///
    /// Refinements always start from `original`, so the style instruction
    /// is repeated ahead of the refinement text.
    pub fn refine_prompt(&self, refinement: &str) -> String {
        format!(
            "{}\n{}",
            self.style_prompt.trim_end(),
            self.refine_template.replace(REFINEMENT_PLACEHOLDER, refinement)
        )
    }

    /// Seed prompt for `item`.
    pub fn seed_prompt_for(&self, item: &str) -> String {
        self.seed_template.replace(ITEM_PLACEHOLDER, item)
    }

    /// Seed prompt for a randomly chosen item.
    pub fn random_seed_prompt(&self) -> String {
        let item = self
            .seed_items
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or("a classical bust");
        self.seed_prompt_for(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_product_prompts() {
        let config = StudioConfig::default();
        assert!(config.style_prompt.contains("Carrara marble"));
        assert_eq!(config.captions.len(), 5);
        assert_eq!(config.seed_items.len(), 12);
        assert_eq!(config.caption_interval(), Duration::from_secs(3));
        assert_eq!(config.seed_source, SeedSource::Generated);
        assert_eq!(config.seed_policy, SeedPolicy::Tracked);
    }

    #[test]
    fn test_refine_prompt_embeds_text_after_style() {
        let prompt = StudioConfig::default().refine_prompt("make it golden");
        assert!(prompt.contains("\"make it golden\""));
        assert!(prompt.find("Carrara").unwrap() < prompt.find("make it golden").unwrap());
        assert!(!prompt.contains(REFINEMENT_PLACEHOLDER));
    }

    #[test]
    fn test_random_seed_prompt_uses_known_item() {
        let config = StudioConfig::default();
        let prompt = config.random_seed_prompt();
        assert!(prompt.starts_with("Photorealistic, studio-lit portrait of "));
        assert!(RANDOM_ITEM_PROMPTS.iter().any(|item| prompt.contains(item)));
    }

    #[test]
    fn test_empty_items_fall_back() {
        let config = StudioConfig {
            seed_items: Vec::new(),
            ..StudioConfig::default()
        };
        assert!(config.random_seed_prompt().contains("a classical bust"));
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: StudioConfig = serde_json::from_str(
            r#"{"seed_source": {"kind": "remote", "url": "http://x/y.jpg"}, "seed_policy": "one_shot"}"#,
        )
        .unwrap();
        assert_eq!(
            config.seed_source,
            SeedSource::Remote {
                url: "http://x/y.jpg".into()
            }
        );
        assert_eq!(config.seed_policy, SeedPolicy::OneShot);
        assert_eq!(config.style_prompt, SCULPTURE_PROMPT);
    }
}
