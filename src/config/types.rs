use serde::{Deserialize, Serialize};
use shortforge_av::{EncodeSettings, ToolsConfig};
use shortforge_core::{Capability, TargetSpec};
use shortforge_pipeline::{MetadataTemplate, RetryPolicy, ValidationLimits, Visibility};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            target: TargetConfig::default(),
            limits: LimitsConfig::default(),
            publish: PublishConfig::default(),
            tools: ToolsConfig::default(),
            providers: default_providers(),
        }
    }
}

impl Config {
    /// Providers serving `capability`, lowest priority first.
    pub fn chain(&self, capability: Capability) -> Vec<&ProviderConfig> {
        let mut chain: Vec<&ProviderConfig> = self
            .providers
            .iter()
            .filter(|p| p.capability == capability)
            .collect();
        chain.sort_by_key(|p| p.priority);
        chain
    }
}

// ---------------------------------------------------------------------------
// [run]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Once,
    Interval,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    #[serde(default)]
    pub mode: RunMode,

    /// Seconds between interval runs
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Stop after this many interval runs (unbounded when unset)
    #[serde(default)]
    pub max_runs: Option<u32>,

    /// Parent directory for run workspaces (system temp dir when unset)
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Keep each run's workspace instead of deleting it
    #[serde(default)]
    pub keep_artifacts: bool,
}

fn default_interval() -> u64 {
    300
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Once,
            interval_secs: default_interval(),
            max_runs: None,
            work_dir: None,
            keep_artifacts: false,
        }
    }
}

// ---------------------------------------------------------------------------
// [target]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    #[serde(default = "default_duration")]
    pub duration_secs: u64,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_duration() -> u64 {
    15
}
fn default_width() -> u32 {
    1080
}
fn default_height() -> u32 {
    1920
}
fn default_fps() -> u32 {
    30
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_duration(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

impl TargetConfig {
    pub fn spec(&self) -> TargetSpec {
        TargetSpec::new(
            Duration::from_secs(self.duration_secs),
            self.width,
            self.height,
            self.fps,
        )
    }
}

// ---------------------------------------------------------------------------
// [limits]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Per-call timeout for providers without their own `timeout_secs`
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    #[serde(default = "default_prompt_max_chars")]
    pub prompt_max_chars: usize,

    /// Minimum share of a visual's area kept when cropping to the target aspect
    #[serde(default = "default_min_crop_keep")]
    pub min_crop_keep: f64,

    /// Default timeout of publish providers, covering every retry
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
}

fn default_provider_timeout() -> u64 {
    60
}
fn default_prompt_max_chars() -> usize {
    200
}
fn default_min_crop_keep() -> f64 {
    0.25
}
fn default_publish_timeout() -> u64 {
    900
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout(),
            prompt_max_chars: default_prompt_max_chars(),
            min_crop_keep: default_min_crop_keep(),
            publish_timeout_secs: default_publish_timeout(),
        }
    }
}

impl LimitsConfig {
    pub fn validation(&self) -> ValidationLimits {
        ValidationLimits {
            prompt_max_chars: self.prompt_max_chars,
            min_crop_keep: self.min_crop_keep,
        }
    }
}

// ---------------------------------------------------------------------------
// [publish]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishConfig {
    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default = "default_tags")]
    pub tags: Vec<String>,

    #[serde(default = "default_category")]
    pub category_id: String,

    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    #[serde(default)]
    pub made_for_kids: bool,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_tags() -> Vec<String> {
    vec!["AI".to_string(), "shorts".to_string()]
}
fn default_category() -> String {
    "22".to_string()
}
fn default_title_max_chars() -> usize {
    55
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            visibility: Visibility::default(),
            tags: default_tags(),
            category_id: default_category(),
            title_max_chars: default_title_max_chars(),
            made_for_kids: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl PublishConfig {
    pub fn template(&self) -> MetadataTemplate {
        MetadataTemplate {
            visibility: self.visibility,
            tags: self.tags.clone(),
            category_id: self.category_id.clone(),
            title_max_chars: self.title_max_chars,
            made_for_kids: self.made_for_kids,
        }
    }
}

// ---------------------------------------------------------------------------
// [[providers]]
// ---------------------------------------------------------------------------

/// One provider entry. Immutable once loaded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub name: String,

    pub capability: Capability,

    /// Lower values are tried first
    #[serde(default)]
    pub priority: u32,

    /// Overrides `limits.provider_timeout_secs`
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(flatten)]
    pub settings: ProviderSettings,
}

impl ProviderConfig {
    pub fn new(name: &str, capability: Capability, priority: u32, settings: ProviderSettings) -> Self {
        Self {
            name: name.to_string(),
            capability,
            priority,
            timeout_secs: None,
            settings,
        }
    }

    /// Per-call timeout: explicit `timeout_secs`, else the tool timeout for
    /// tool-backed types, the publish timeout for publishers and
    /// `limits.provider_timeout_secs` for the rest.
    pub fn timeout(&self, config: &Config) -> Duration {
        let default = match self.settings {
            ProviderSettings::Ffmpeg { .. } | ProviderSettings::YtDlp { .. } => {
                config.tools.timeout_secs
            }
            ProviderSettings::Youtube { .. } | ProviderSettings::Archive { .. } => {
                config.limits.publish_timeout_secs
            }
            _ => config.limits.provider_timeout_secs,
        };
        Duration::from_secs(self.timeout_secs.unwrap_or(default))
    }
}

/// Provider type and its type-specific settings, tagged by `type`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderSettings {
    GeminiText {
        #[serde(default)]
        api_key: String,
        #[serde(default = "default_gemini_text_model")]
        model: String,
        #[serde(default = "default_gemini_base_url")]
        base_url: String,
        #[serde(default = "default_instruction")]
        instruction: String,
    },
    HuggingfaceText {
        #[serde(default)]
        api_token: String,
        #[serde(default = "default_hf_text_model")]
        model: String,
        #[serde(default = "default_hf_base_url")]
        base_url: String,
        #[serde(default = "default_instruction")]
        instruction: String,
    },
    StaticPrompts {
        #[serde(default = "default_prompts")]
        prompts: Vec<String>,
    },
    GeminiImage {
        #[serde(default)]
        api_key: String,
        #[serde(default = "default_gemini_image_model")]
        model: String,
        #[serde(default = "default_gemini_base_url")]
        base_url: String,
    },
    HuggingfaceImage {
        #[serde(default)]
        api_token: String,
        #[serde(default = "default_hf_image_model")]
        model: String,
        #[serde(default = "default_hf_base_url")]
        base_url: String,
    },
    Pexels {
        #[serde(default)]
        api_key: String,
        #[serde(default = "default_pexels_base_url")]
        base_url: String,
    },
    LocalImages {
        #[serde(default = "default_images_dir")]
        dir: PathBuf,
    },
    SolidColor {
        #[serde(default = "default_color")]
        color: String,
    },
    LocalMusic {
        #[serde(default = "default_music_dir")]
        dir: PathBuf,
    },
    YtDlp {
        #[serde(default = "default_tracks")]
        tracks: Vec<String>,
    },
    Silence,
    Ffmpeg {
        #[serde(default = "default_preset")]
        preset: String,
        #[serde(default = "default_crf")]
        crf: u8,
        #[serde(default = "default_audio_bitrate")]
        audio_bitrate: String,
    },
    Youtube {
        #[serde(default = "default_token_path")]
        token_path: PathBuf,
        #[serde(default = "default_youtube_upload_url")]
        upload_url: String,
        #[serde(default = "default_oauth_token_url")]
        token_url: String,
    },
    Archive {
        #[serde(default = "default_archive_dir")]
        dir: PathBuf,
    },
}

impl ProviderSettings {
    /// Config `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::GeminiText { .. } => "gemini_text",
            Self::HuggingfaceText { .. } => "huggingface_text",
            Self::StaticPrompts { .. } => "static_prompts",
            Self::GeminiImage { .. } => "gemini_image",
            Self::HuggingfaceImage { .. } => "huggingface_image",
            Self::Pexels { .. } => "pexels",
            Self::LocalImages { .. } => "local_images",
            Self::SolidColor { .. } => "solid_color",
            Self::LocalMusic { .. } => "local_music",
            Self::YtDlp { .. } => "yt_dlp",
            Self::Silence => "silence",
            Self::Ffmpeg { .. } => "ffmpeg",
            Self::Youtube { .. } => "youtube",
            Self::Archive { .. } => "archive",
        }
    }

    /// The only capability this provider type can serve.
    pub fn capability(&self) -> Capability {
        match self {
            Self::GeminiText { .. } | Self::HuggingfaceText { .. } | Self::StaticPrompts { .. } => {
                Capability::Prompt
            }
            Self::GeminiImage { .. }
            | Self::HuggingfaceImage { .. }
            | Self::Pexels { .. }
            | Self::LocalImages { .. }
            | Self::SolidColor { .. } => Capability::Visual,
            Self::LocalMusic { .. } | Self::YtDlp { .. } | Self::Silence => Capability::Audio,
            Self::Ffmpeg { .. } => Capability::Composition,
            Self::Youtube { .. } | Self::Archive { .. } => Capability::Publish,
        }
    }

    /// Always succeeds; must be last in its chain.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::StaticPrompts { .. } | Self::SolidColor { .. } | Self::Silence
        )
    }

    pub fn encode_settings(&self) -> Option<EncodeSettings> {
        match self {
            Self::Ffmpeg {
                preset,
                crf,
                audio_bitrate,
            } => Some(EncodeSettings {
                preset: preset.clone(),
                crf: *crf,
                audio_bitrate: audio_bitrate.clone(),
            }),
            _ => None,
        }
    }
}

pub const DEFAULT_INSTRUCTION: &str = "Give a short catchy idea for a YouTube Short (<=12 words).";

pub const FALLBACK_PROMPTS: [&str; 4] = [
    "Never give up!",
    "Quick life-hack to stay focused",
    "Amazing tiny fact about space",
    "One motivational tip in 15 seconds",
];

fn default_instruction() -> String {
    DEFAULT_INSTRUCTION.to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_gemini_text_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_gemini_image_model() -> String {
    "gemini-2.0-flash-preview-image-generation".to_string()
}
fn default_hf_base_url() -> String {
    "https://api-inference.huggingface.co/models".to_string()
}
fn default_hf_text_model() -> String {
    "gpt2".to_string()
}
fn default_hf_image_model() -> String {
    "stabilityai/stable-diffusion-2".to_string()
}
fn default_prompts() -> Vec<String> {
    FALLBACK_PROMPTS.iter().map(|p| p.to_string()).collect()
}
fn default_pexels_base_url() -> String {
    "https://api.pexels.com".to_string()
}
fn default_images_dir() -> PathBuf {
    PathBuf::from("images")
}
fn default_color() -> String {
    "#1e1e2e".to_string()
}
fn default_music_dir() -> PathBuf {
    PathBuf::from("music")
}
fn default_tracks() -> Vec<String> {
    vec![
        "https://www.youtube.com/watch?v=DWcJFNfaw9c".to_string(),
        "https://www.youtube.com/watch?v=5qap5aO4i9A".to_string(),
        "https://www.youtube.com/watch?v=2x2qYzYVj7o".to_string(),
    ]
}
fn default_preset() -> String {
    EncodeSettings::default().preset
}
fn default_crf() -> u8 {
    EncodeSettings::default().crf
}
fn default_audio_bitrate() -> String {
    EncodeSettings::default().audio_bitrate
}
fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}
fn default_youtube_upload_url() -> String {
    "https://www.googleapis.com/upload/youtube/v3/videos".to_string()
}
fn default_oauth_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}
fn default_archive_dir() -> PathBuf {
    PathBuf::from("outputs")
}

/// Providers used when no `[[providers]]` are configured: local assets with
/// terminal fallbacks and a local archive instead of an upload.
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new(
            "static-prompts",
            Capability::Prompt,
            100,
            ProviderSettings::StaticPrompts {
                prompts: default_prompts(),
            },
        ),
        ProviderConfig::new(
            "local-images",
            Capability::Visual,
            10,
            ProviderSettings::LocalImages {
                dir: default_images_dir(),
            },
        ),
        ProviderConfig::new(
            "solid-color",
            Capability::Visual,
            100,
            ProviderSettings::SolidColor {
                color: default_color(),
            },
        ),
        ProviderConfig::new(
            "local-music",
            Capability::Audio,
            10,
            ProviderSettings::LocalMusic {
                dir: default_music_dir(),
            },
        ),
        ProviderConfig::new("silence", Capability::Audio, 100, ProviderSettings::Silence),
        ProviderConfig::new(
            "ffmpeg",
            Capability::Composition,
            0,
            ProviderSettings::Ffmpeg {
                preset: default_preset(),
                crf: default_crf(),
                audio_bitrate: default_audio_bitrate(),
            },
        ),
        ProviderConfig::new(
            "archive",
            Capability::Publish,
            0,
            ProviderSettings::Archive {
                dir: default_archive_dir(),
            },
        ),
    ]
}
