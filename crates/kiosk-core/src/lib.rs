pub mod db;
pub mod error;
pub mod models;
pub mod player;
pub mod playlist;
pub mod schema;
pub mod settings;

// Re-exports for convenience
pub use db::{Library, LibraryStats};
pub use error::{LibraryError, PlayerError};
pub use models::{MediaEntry, MediaKind, MediaPatch, NewMediaEntry, IMAGE_DISPLAY_SECS};
pub use player::{Control, MediaEvent, Outcome, PlaybackState, Session};
pub use playlist::Playlist;
pub use settings::{CoreSettings, KindFilter};
