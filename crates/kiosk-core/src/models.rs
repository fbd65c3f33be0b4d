use crate::schema::media;
use chrono::NaiveDateTime;
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;

/// How long an image entry is shown, in seconds. Images have no native
/// duration; this constant stands in for one everywhere.
pub const IMAGE_DISPLAY_SECS: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum MediaKind {
  Video,
  Image,
}

impl MediaKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      MediaKind::Video => "video",
      MediaKind::Image => "image",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      MediaKind::Video => "Video",
      MediaKind::Image => "Image",
    }
  }
}

impl FromSql<Text, Sqlite> for MediaKind {
  fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
    match <String as FromSql<Text, Sqlite>>::from_sql(bytes)?.as_str() {
      "video" => Ok(MediaKind::Video),
      "image" => Ok(MediaKind::Image),
      other => Err(format!("unrecognized media kind: {other}").into()),
    }
  }
}

impl ToSql<Text, Sqlite> for MediaKind {
  fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
    out.set_value(self.as_str());
    Ok(IsNull::No)
  }
}

#[derive(Queryable, Selectable, Clone, Debug, PartialEq)]
#[diesel(table_name = crate::schema::media)]
pub struct MediaEntry {
  pub id: i32,
  pub title: String,
  pub locator: String,
  pub kind: MediaKind,
  pub thumbnail: Option<String>,
  pub duration_seconds: Option<f64>,
  pub created_at: NaiveDateTime,
  pub order_index: Option<i32>,
}

impl MediaEntry {
  pub fn is_image(&self) -> bool {
    self.kind == MediaKind::Image
  }

  /// Duration in seconds. Images always report the fixed display duration,
  /// whatever the stored value says; videos report the stored value, which
  /// stays unknown until the playback primitive has seen the file once.
  pub fn duration_secs(&self) -> Option<f64> {
    match self.kind {
      MediaKind::Image => Some(IMAGE_DISPLAY_SECS),
      MediaKind::Video => self.duration_seconds,
    }
  }

  pub fn duration_str(&self) -> String {
    match self.duration_secs() {
      Some(s) => {
        let s = s as i64;
        format!("{}:{:02}", s / 60, s % 60)
      }
      None => "?:??".to_string(),
    }
  }

  pub fn created_str(&self) -> String {
    self.created_at.format("%Y-%m-%d").to_string()
  }
}

#[derive(Insertable)]
#[diesel(table_name = media)]
pub struct NewMediaEntry<'a> {
  pub title: &'a str,
  pub locator: &'a str,
  pub kind: MediaKind,
  pub thumbnail: Option<&'a str>,
  pub duration_seconds: Option<f64>,
  pub order_index: Option<i32>,
}

impl<'a> NewMediaEntry<'a> {
  pub fn new(kind: MediaKind, title: &'a str, locator: &'a str) -> Self {
    NewMediaEntry {
      title,
      locator,
      kind,
      thumbnail: None,
      duration_seconds: None,
      order_index: None,
    }
  }
}

/// Partial update for a media entry. `None` fields are left untouched;
/// `thumbnail: Some(None)` clears the thumbnail. `kind` is absent on
/// purpose: changing kind is a delete plus recreate, never an update.
#[derive(AsChangeset, Default, Debug, Clone)]
#[diesel(table_name = media)]
pub struct MediaPatch {
  pub title: Option<String>,
  pub locator: Option<String>,
  pub thumbnail: Option<Option<String>>,
  pub duration_seconds: Option<f64>,
}

impl MediaPatch {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.locator.is_none()
      && self.thumbnail.is_none()
      && self.duration_seconds.is_none()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(kind: MediaKind, duration_seconds: Option<f64>) -> MediaEntry {
    MediaEntry {
      id: 1,
      title: "a title".to_string(),
      locator: "/media/a".to_string(),
      kind,
      thumbnail: None,
      duration_seconds,
      created_at: chrono::DateTime::from_timestamp(0, 0).unwrap().naive_utc(),
      order_index: None,
    }
  }

  #[test]
  fn image_duration_is_fixed() {
    // Even a bogus stored value does not leak out for images.
    assert_eq!(entry(MediaKind::Image, Some(42.0)).duration_secs(), Some(8.0));
    assert_eq!(entry(MediaKind::Image, None).duration_secs(), Some(8.0));
  }

  #[test]
  fn video_duration_is_stored_value() {
    assert_eq!(entry(MediaKind::Video, Some(95.0)).duration_secs(), Some(95.0));
    assert_eq!(entry(MediaKind::Video, None).duration_secs(), None);
  }

  #[test]
  fn duration_str_formats_minutes_and_seconds() {
    assert_eq!(entry(MediaKind::Video, Some(95.0)).duration_str(), "1:35");
    assert_eq!(entry(MediaKind::Video, None).duration_str(), "?:??");
    assert_eq!(entry(MediaKind::Image, None).duration_str(), "0:08");
  }

  #[test]
  fn empty_patch_is_empty() {
    assert!(MediaPatch::default().is_empty());
    let patch = MediaPatch {
      title: Some("renamed".to_string()),
      ..Default::default()
    };
    assert!(!patch.is_empty());
  }
}
