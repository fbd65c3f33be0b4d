use crate::error::LibraryError;
use crate::models::{MediaEntry, MediaKind, MediaPatch, NewMediaEntry, IMAGE_DISPLAY_SECS};
use crate::schema::media;
use crate::settings::project_dirs;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::cell::RefCell;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../../migrations");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LibraryStats {
  pub videos: i64,
  pub images: i64,
}

impl LibraryStats {
  pub fn total(&self) -> i64 {
    self.videos + self.images
  }
}

/// Storage client for the media table. Constructed once and passed by
/// reference into whatever needs it; holds its own connection.
pub struct Library {
  conn: RefCell<SqliteConnection>,
}

fn database_url() -> Result<String, LibraryError> {
  let proj_dirs = project_dirs().ok_or(LibraryError::ConfigDir)?;
  let config_dir = proj_dirs.config_dir();
  std::fs::create_dir_all(config_dir)?;
  let path = config_dir.join("library.db");
  let path_str = path.to_str().ok_or(LibraryError::ConfigDir)?;
  Ok(format!("sqlite://{}", path_str))
}

impl Library {
  /// Open the on-disk library under the platform config directory and run
  /// any pending migrations.
  pub fn open() -> Result<Self, LibraryError> {
    Self::establish(&database_url()?)
  }

  /// In-memory library, used by tests.
  pub fn open_in_memory() -> Result<Self, LibraryError> {
    Self::establish(":memory:")
  }

  fn establish(url: &str) -> Result<Self, LibraryError> {
    let mut conn = SqliteConnection::establish(url)?;
    conn
      .run_pending_migrations(MIGRATIONS)
      .map_err(|e| LibraryError::Migration(e.to_string()))?;
    Ok(Library {
      conn: RefCell::new(conn),
    })
  }

  /// All entries, newest first. Id breaks ties so the order is stable for
  /// entries created within the same second.
  pub fn entries(&self) -> Result<Vec<MediaEntry>, LibraryError> {
    let conn = &mut *self.conn.borrow_mut();
    media::table
      .select(MediaEntry::as_select())
      .order(media::created_at.desc())
      .then_order_by(media::id.desc())
      .load(conn)
      .map_err(Into::into)
  }

  /// All entries by explicit order index.
  pub fn entries_ordered(&self) -> Result<Vec<MediaEntry>, LibraryError> {
    let conn = &mut *self.conn.borrow_mut();
    media::table
      .select(MediaEntry::as_select())
      .order(media::order_index.asc())
      .then_order_by(media::id.asc())
      .load(conn)
      .map_err(Into::into)
  }

  /// The listing a playback session starts from. The explicit order is used
  /// only when every entry carries one; a session never mixes orderings.
  pub fn playback_entries(&self) -> Result<Vec<MediaEntry>, LibraryError> {
    let entries = self.entries()?;
    if !entries.is_empty() && entries.iter().all(|e| e.order_index.is_some()) {
      self.entries_ordered()
    } else {
      Ok(entries)
    }
  }

  pub fn entry(&self, entry_id: i32) -> Result<Option<MediaEntry>, LibraryError> {
    let conn = &mut *self.conn.borrow_mut();
    media::table
      .filter(media::id.eq(entry_id))
      .select(MediaEntry::as_select())
      .first(conn)
      .optional()
      .map_err(Into::into)
  }

  /// Insert a new entry and return its id. Image entries always get the
  /// fixed display duration, whatever the caller passed.
  pub fn create(&self, mut entry: NewMediaEntry) -> Result<i32, LibraryError> {
    if entry.kind == MediaKind::Image {
      entry.duration_seconds = Some(IMAGE_DISPLAY_SECS);
    }
    let conn = &mut *self.conn.borrow_mut();
    diesel::insert_into(media::table)
      .values(&entry)
      .execute(conn)?;
    media::table
      .order(media::id.desc())
      .select(media::id)
      .first::<i32>(conn)
      .map_err(Into::into)
  }

  /// Apply a patch to an entry. Returns whether the entry existed.
  pub fn update(&self, entry_id: i32, patch: &MediaPatch) -> Result<bool, LibraryError> {
    if patch.is_empty() {
      return Ok(self.entry(entry_id)?.is_some());
    }
    let conn = &mut *self.conn.borrow_mut();
    let n = diesel::update(media::table.filter(media::id.eq(entry_id)))
      .set(patch)
      .execute(conn)?;
    Ok(n > 0)
  }

  pub fn delete(&self, entry_id: i32) -> Result<bool, LibraryError> {
    let conn = &mut *self.conn.borrow_mut();
    let n = diesel::delete(media::table.filter(media::id.eq(entry_id))).execute(conn)?;
    Ok(n > 0)
  }

  /// Reassign order indexes to the dense positions of `ids`, inside one
  /// transaction. An unknown id rolls the whole reorder back.
  pub fn reorder(&self, ids: &[i32]) -> Result<(), LibraryError> {
    let conn = &mut *self.conn.borrow_mut();
    conn.transaction::<_, LibraryError, _>(|conn| {
      for (position, entry_id) in ids.iter().enumerate() {
        let n = diesel::update(media::table.filter(media::id.eq(entry_id)))
          .set(media::order_index.eq(position as i32))
          .execute(conn)?;
        if n == 0 {
          return Err(LibraryError::MissingEntry(*entry_id));
        }
      }
      Ok(())
    })
  }

  pub fn stats(&self) -> Result<LibraryStats, LibraryError> {
    let conn = &mut *self.conn.borrow_mut();
    let videos = media::table
      .filter(media::kind.eq(MediaKind::Video))
      .count()
      .get_result::<i64>(conn)?;
    let images = media::table
      .filter(media::kind.eq(MediaKind::Image))
      .count()
      .get_result::<i64>(conn)?;
    Ok(LibraryStats { videos, images })
  }

  /// Newest `limit` entries, for the dashboard.
  pub fn recent(&self, limit: usize) -> Result<Vec<MediaEntry>, LibraryError> {
    let mut entries = self.entries()?;
    entries.truncate(limit);
    Ok(entries)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn library() -> Library {
    Library::open_in_memory().expect("in-memory library")
  }

  fn add(lib: &Library, kind: MediaKind, title: &str) -> i32 {
    let locator = format!("/media/{}", title);
    lib
      .create(NewMediaEntry::new(kind, title, &locator))
      .expect("create entry")
  }

  #[test]
  fn create_assigns_increasing_ids() {
    let lib = library();
    let a = add(&lib, MediaKind::Video, "a");
    let b = add(&lib, MediaKind::Video, "b");
    assert!(b > a);
    assert_eq!(lib.entries().unwrap().len(), 2);
  }

  #[test]
  fn image_entries_are_created_with_fixed_duration() {
    let lib = library();
    let id = add(&lib, MediaKind::Image, "pic");
    let entry = lib.entry(id).unwrap().unwrap();
    assert_eq!(entry.duration_seconds, Some(IMAGE_DISPLAY_SECS));
    assert_eq!(entry.duration_secs(), Some(IMAGE_DISPLAY_SECS));
  }

  #[test]
  fn entries_are_newest_first() {
    let lib = library();
    let a = add(&lib, MediaKind::Video, "a");
    let b = add(&lib, MediaKind::Image, "b");
    let listed: Vec<i32> = lib.entries().unwrap().iter().map(|e| e.id).collect();
    assert_eq!(listed, vec![b, a]);
  }

  #[test]
  fn patch_touches_only_present_fields() {
    let lib = library();
    let id = add(&lib, MediaKind::Video, "original");
    let patch = MediaPatch {
      title: Some("renamed".to_string()),
      ..Default::default()
    };
    assert!(lib.update(id, &patch).unwrap());
    let entry = lib.entry(id).unwrap().unwrap();
    assert_eq!(entry.title, "renamed");
    assert_eq!(entry.locator, "/media/original");
    assert_eq!(entry.kind, MediaKind::Video);
  }

  #[test]
  fn patch_can_clear_thumbnail() {
    let lib = library();
    let mut new = NewMediaEntry::new(MediaKind::Video, "clip", "/media/clip");
    new.thumbnail = Some("/media/clip.jpg");
    let id = lib.create(new).unwrap();
    let patch = MediaPatch {
      thumbnail: Some(None),
      ..Default::default()
    };
    assert!(lib.update(id, &patch).unwrap());
    assert_eq!(lib.entry(id).unwrap().unwrap().thumbnail, None);
  }

  #[test]
  fn update_missing_entry_reports_false() {
    let lib = library();
    let patch = MediaPatch {
      title: Some("ghost".to_string()),
      ..Default::default()
    };
    assert!(!lib.update(999, &patch).unwrap());
  }

  #[test]
  fn empty_patch_reports_existence() {
    let lib = library();
    let id = add(&lib, MediaKind::Video, "a");
    assert!(lib.update(id, &MediaPatch::default()).unwrap());
    assert!(!lib.update(id + 1, &MediaPatch::default()).unwrap());
  }

  #[test]
  fn delete_removes_entry() {
    let lib = library();
    let id = add(&lib, MediaKind::Image, "pic");
    assert!(lib.delete(id).unwrap());
    assert!(!lib.delete(id).unwrap());
    assert!(lib.entry(id).unwrap().is_none());
  }

  #[test]
  fn reorder_assigns_dense_indexes() {
    let lib = library();
    let a = add(&lib, MediaKind::Video, "a");
    let b = add(&lib, MediaKind::Video, "b");
    let c = add(&lib, MediaKind::Image, "c");
    lib.reorder(&[c, a, b]).unwrap();
    let ordered: Vec<(i32, Option<i32>)> = lib
      .entries_ordered()
      .unwrap()
      .iter()
      .map(|e| (e.id, e.order_index))
      .collect();
    assert_eq!(ordered, vec![(c, Some(0)), (a, Some(1)), (b, Some(2))]);
  }

  #[test]
  fn reorder_with_unknown_id_changes_nothing() {
    let lib = library();
    let a = add(&lib, MediaKind::Video, "a");
    let b = add(&lib, MediaKind::Video, "b");
    lib.reorder(&[a, b]).unwrap();

    let result = lib.reorder(&[b, 999, a]);
    assert!(matches!(result, Err(LibraryError::MissingEntry(999))));

    // The partial update to b rolled back.
    let ordered: Vec<(i32, Option<i32>)> = lib
      .entries_ordered()
      .unwrap()
      .iter()
      .map(|e| (e.id, e.order_index))
      .collect();
    assert_eq!(ordered, vec![(a, Some(0)), (b, Some(1))]);
  }

  #[test]
  fn playback_entries_fall_back_to_creation_order() {
    let lib = library();
    let a = add(&lib, MediaKind::Video, "a");
    let b = add(&lib, MediaKind::Video, "b");
    // No order indexes yet: newest first.
    let ids: Vec<i32> = lib.playback_entries().unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![b, a]);

    // A third entry without an index keeps the fallback even though the
    // first two are ordered.
    lib.reorder(&[a, b]).unwrap();
    let c = add(&lib, MediaKind::Image, "c");
    let ids: Vec<i32> = lib.playback_entries().unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![c, b, a]);

    // Once every entry has an index, the explicit order wins.
    lib.reorder(&[c, a, b]).unwrap();
    let ids: Vec<i32> = lib.playback_entries().unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![c, a, b]);
  }

  #[test]
  fn deleting_a_non_active_entry_leaves_the_session_alone() {
    use crate::player::Session;

    let lib = library();
    let a = add(&lib, MediaKind::Image, "a");
    let b = add(&lib, MediaKind::Video, "b");

    let mut session = Session::new(lib.playback_entries().unwrap()).unwrap();
    let active = session.current().id;
    let other = if active == a { b } else { a };
    assert!(lib.delete(other).unwrap());

    // The session snapshot is fixed for its lifetime.
    assert_eq!(session.len(), 2);
    assert_eq!(session.current().id, active);
    assert_eq!(session.skip_next().id, other);
  }

  #[test]
  fn stats_count_by_kind() {
    let lib = library();
    add(&lib, MediaKind::Video, "a");
    add(&lib, MediaKind::Video, "b");
    add(&lib, MediaKind::Image, "c");
    let stats = lib.stats().unwrap();
    assert_eq!(stats.videos, 2);
    assert_eq!(stats.images, 1);
    assert_eq!(stats.total(), 3);
  }

  #[test]
  fn recent_returns_newest_entries() {
    let lib = library();
    add(&lib, MediaKind::Video, "a");
    let b = add(&lib, MediaKind::Video, "b");
    let c = add(&lib, MediaKind::Image, "c");
    let ids: Vec<i32> = lib.recent(2).unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![c, b]);
  }
}
