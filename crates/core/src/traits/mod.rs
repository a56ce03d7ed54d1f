//! Collaborator traits
//!
//! The pipeline talks to everything heavyweight or external through these
//! seams: neural model execution, artifact storage, acoustic embedding,
//! contextual text features, language identification and memory probing.

mod artifacts;
mod executor;
mod resources;
mod text;

pub use artifacts::{ArtifactDownloader, ArtifactStore};
pub use executor::{ExecutorInput, ModelExecutor, ModelLoader};
pub use resources::MemoryProbe;
pub use text::{FeatureExtractor, LanguageIdentifier, SslEmbedder};
