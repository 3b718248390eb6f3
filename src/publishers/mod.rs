//! [`Publisher`](shortforge_pipeline::Publisher) implementations.

pub mod archive;
pub mod youtube;

pub use archive::ArchivePublisher;
pub use youtube::{TokenFile, YoutubePublisher};
