use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
  #[error("could not determine config directory")]
  ConfigDir,

  #[error("failed to open database: {0}")]
  Connection(#[from] diesel::result::ConnectionError),

  #[error("failed to run database migrations: {0}")]
  Migration(String),

  #[error("database error: {0}")]
  Query(#[from] diesel::result::Error),

  #[error("no media entry with id {0}")]
  MissingEntry(i32),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
  #[error("no media to play")]
  EmptyPlaylist,

  #[error("every entry in the playlist failed to load")]
  AllEntriesFailed,
}
