pub mod backends;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod queue;
pub mod render;
pub mod server;
pub mod settings;
pub mod translate;

pub use backends::{BackendImpl, Ollama, OpenAi, TranslationBackend, build_backend};
pub use ocr::TextDirection;
pub use pipeline::{PageEvent, Pipeline};
pub use queue::{QueueEvent, TranslateQueue};
pub use settings::{Preset, PresetKind, Settings, load_settings};
pub use translate::Translator;
pub use translate::context::ContextStore;
