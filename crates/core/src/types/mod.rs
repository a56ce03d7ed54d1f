//! Data types flowing through the pipeline

mod audio;
mod model;
mod request;
mod text;

pub use audio::{peak, silence_len, AudioSegment, OutputAudio, ReferenceConditioning};
pub use model::{GenerationParams, MemoryUsage, ModelArtifacts, ModelWeights, Preset};
pub use request::{InferenceRequest, InferenceRequestBuilder, ReferenceSource, SynthesisPayload};
pub use text::{ChunkInput, LanguageSpan, ProcessedSpan, TextChunk};
