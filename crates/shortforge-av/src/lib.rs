//! # shortforge-av
//!
//! Media handling for the shortforge pipeline.
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg,
//!   ffprobe and yt-dlp.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for running external processes.
//! - **Run workspace** ([`RunWorkspace`]) -- per-run temporary directory,
//!   deleted on drop.
//! - **Probing** ([`probe`]) -- in-process image/WAV probing with an ffprobe
//!   fallback.
//! - **Composition** ([`FfmpegCompositor`]) -- crop, loop, trim and encode the
//!   final vertical short.

pub mod audio;
pub mod command;
pub mod compose;
pub mod frame;
pub mod probe;
pub mod tools;
pub mod workspace;

pub use command::{ToolCommand, ToolOutput};
pub use compose::{CompositionRequest, Compositor, EncodeSettings, FfmpegCompositor};
pub use probe::{probe_media_file, CompositeProber, FfprobeProber, MediaProbe, Prober, RustProber};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, ToolsConfig};
pub use workspace::RunWorkspace;
