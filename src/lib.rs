//! Основной файл библиотеки tiflo-timeline
//!
//! Движок таймлайна для тифлокомментирования: вставка синтезированных
//! описаний в исходную дорожку, замена их текста, удаление и склейка
//! итогового аудио. Внешние сервисы (синтез речи, описание кадров, ffmpeg,
//! хранилище) подключаются через узкие интерфейсы.

pub mod caption;
pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod logger;
pub mod media;
pub mod segment;
pub mod store;
pub mod time;
pub mod tts;

pub use config::{DeletePolicy, EngineConfig};
pub use editor::ProjectEditor;
pub use engine::{
    Collaborators, DeleteOutcome, NarrationSource, ReplaceOutcome, SplitOutcome, TimelineEngine,
};
pub use error::{Result, TimelineError};
pub use segment::{PartId, ProjectId, Segment, SegmentKind, Tick};
pub use store::{JsonFileStore, MemoryStore, SegmentBatch, SegmentStore};
pub use time::{format_time, parse_time, Timecode};
