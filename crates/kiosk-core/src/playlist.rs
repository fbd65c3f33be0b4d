use crate::error::PlayerError;
use crate::models::MediaEntry;

/// Ordered cursor over the entries of one playback session. The entry list
/// is fixed at construction; library edits made while the session runs are
/// not observed.
pub struct Playlist {
  entries: Vec<MediaEntry>,
  index: usize,
}

impl Playlist {
  pub fn new(entries: Vec<MediaEntry>) -> Result<Self, PlayerError> {
    if entries.is_empty() {
      return Err(PlayerError::EmptyPlaylist);
    }
    Ok(Playlist { entries, index: 0 })
  }

  pub fn current(&self) -> &MediaEntry {
    &self.entries[self.index]
  }

  /// Move to the next entry, wrapping past the end back to the first.
  pub fn advance(&mut self) -> &MediaEntry {
    self.index = if self.index + 1 < self.entries.len() {
      self.index + 1
    } else {
      0
    };
    self.current()
  }

  /// Move to the previous entry, wrapping before the first to the last.
  pub fn retreat(&mut self) -> &MediaEntry {
    self.index = if self.index > 0 {
      self.index - 1
    } else {
      self.entries.len() - 1
    };
    self.current()
  }

  pub fn position(&self) -> usize {
    self.index
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::MediaKind;

  fn entry(id: i32) -> MediaEntry {
    MediaEntry {
      id,
      title: format!("entry {id}"),
      locator: format!("/media/{id}"),
      kind: MediaKind::Video,
      thumbnail: None,
      duration_seconds: None,
      created_at: chrono::DateTime::from_timestamp(0, 0).unwrap().naive_utc(),
      order_index: None,
    }
  }

  fn playlist(n: i32) -> Playlist {
    Playlist::new((1..=n).map(entry).collect()).unwrap()
  }

  #[test]
  fn empty_playlist_is_rejected() {
    assert_eq!(Playlist::new(Vec::new()).err(), Some(PlayerError::EmptyPlaylist));
  }

  #[test]
  fn advance_is_cyclic() {
    for n in 1..=5 {
      let mut p = playlist(n);
      assert_eq!(p.position(), 0);
      for _ in 0..n {
        p.advance();
      }
      assert_eq!(p.position(), 0);
    }
  }

  #[test]
  fn retreat_from_start_wraps_to_last() {
    for n in 1..=5 {
      let mut p = playlist(n);
      p.retreat();
      assert_eq!(p.position(), n as usize - 1);
    }
  }

  #[test]
  fn single_entry_self_loops() {
    let mut p = playlist(1);
    assert_eq!(p.advance().id, 1);
    assert_eq!(p.retreat().id, 1);
    assert_eq!(p.position(), 0);
  }
}
