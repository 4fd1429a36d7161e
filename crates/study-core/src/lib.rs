pub mod ai;
pub mod config;
pub mod materials;
pub mod ordering;
pub mod prompt;
pub mod state;

// Re-export main types for convenience
pub use ai::{GatewayError, OllamaClient};
pub use config::{Config, GatewayConfig};
pub use materials::{MaterialError, StudyMaterial, StudyMaterials};
pub use ordering::{ReplySequencer, RequestId};
pub use prompt::{PromptTemplate, Slot, TemplateError};
pub use state::{ChatMessage, ChatRole, ModelRequest, ModelResponse};
