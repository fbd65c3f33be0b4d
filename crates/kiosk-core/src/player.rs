use crate::error::PlayerError;
use crate::models::{MediaEntry, MediaKind, IMAGE_DISPLAY_SECS};
use crate::playlist::Playlist;
use std::time::{Duration, Instant};
use tracing::debug;

/// Per-entry playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
  Loading,
  Playing,
  Paused,
  Finished,
}

/// What the playback primitive reported about the active video entry.
/// Image entries never produce these.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaEvent {
  Ready,
  TimeUpdate { position: f64, duration: Option<f64> },
  EndOfStream,
  LoadError,
}

/// Directive handed back to the frontend after a control operation, telling
/// it what to forward to the playback primitive. Image entries are timed
/// locally, so they never produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
  None,
  PausePrimitive,
  ResumePrimitive,
}

/// What a tick or event did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  None,
  /// The cursor moved; the frontend must activate the new current entry.
  Advanced,
  /// Every entry failed to load within one pass; playback stopped.
  Halted,
}

/// Pausable countdown. Elapsed time is the sum of completed run segments
/// plus the currently running one, clamped to the total.
struct Countdown {
  total: Duration,
  accumulated: Duration,
  started_at: Option<Instant>,
}

impl Countdown {
  fn start_at(total: Duration, now: Instant) -> Self {
    Countdown {
      total,
      accumulated: Duration::ZERO,
      started_at: Some(now),
    }
  }

  fn pause_at(&mut self, now: Instant) {
    if let Some(started) = self.started_at.take() {
      self.accumulated += now.saturating_duration_since(started);
    }
  }

  fn resume_at(&mut self, now: Instant) {
    if self.started_at.is_none() {
      self.started_at = Some(now);
    }
  }

  fn elapsed_at(&self, now: Instant) -> Duration {
    let running = self
      .started_at
      .map(|started| now.saturating_duration_since(started))
      .unwrap_or(Duration::ZERO);
    (self.accumulated + running).min(self.total)
  }

  fn finished_at(&self, now: Instant) -> bool {
    self.elapsed_at(now) >= self.total
  }
}

struct ImageDriver {
  state: PlaybackState,
  countdown: Countdown,
}

impl ImageDriver {
  /// Images have nothing to load; they start playing immediately.
  fn new_at(now: Instant) -> Self {
    ImageDriver {
      state: PlaybackState::Playing,
      countdown: Countdown::start_at(Duration::from_secs_f64(IMAGE_DISPLAY_SECS), now),
    }
  }

  fn toggle_at(&mut self, now: Instant) {
    match self.state {
      PlaybackState::Playing => {
        self.countdown.pause_at(now);
        self.state = PlaybackState::Paused;
      }
      PlaybackState::Paused => {
        self.countdown.resume_at(now);
        self.state = PlaybackState::Playing;
      }
      _ => {}
    }
  }

  fn tick_at(&mut self, now: Instant) {
    if self.state == PlaybackState::Playing && self.countdown.finished_at(now) {
      self.state = PlaybackState::Finished;
    }
  }
}

struct VideoDriver {
  state: PlaybackState,
  position: f64,
  reported_duration: Option<f64>,
  fallback_duration: Option<f64>,
}

impl VideoDriver {
  fn new(entry: &MediaEntry) -> Self {
    VideoDriver {
      state: PlaybackState::Loading,
      position: 0.0,
      reported_duration: None,
      fallback_duration: entry.duration_secs(),
    }
  }

  /// Apply a primitive event. Elapsed and total time are whatever the
  /// primitive last said; nothing is computed locally.
  fn apply(&mut self, event: MediaEvent) {
    match event {
      MediaEvent::Ready => {
        if self.state == PlaybackState::Loading {
          self.state = PlaybackState::Playing;
        }
      }
      MediaEvent::TimeUpdate { position, duration } => {
        self.position = position;
        if duration.is_some() {
          self.reported_duration = duration;
        }
      }
      MediaEvent::EndOfStream => {
        if self.state != PlaybackState::Finished {
          self.state = PlaybackState::Finished;
        }
      }
      // Load failures are the session's concern.
      MediaEvent::LoadError => {}
    }
  }

  fn toggle(&mut self) -> Control {
    match self.state {
      PlaybackState::Playing => {
        self.state = PlaybackState::Paused;
        Control::PausePrimitive
      }
      PlaybackState::Paused => {
        self.state = PlaybackState::Playing;
        Control::ResumePrimitive
      }
      _ => Control::None,
    }
  }

  fn duration(&self) -> Option<f64> {
    self.reported_duration.or(self.fallback_duration)
  }
}

/// State machine for the active entry. The image variant reimplements the
/// minimal play/pause/progress/finish surface so both kinds present the
/// same controls.
enum Driver {
  Image(ImageDriver),
  Video(VideoDriver),
}

impl Driver {
  fn for_entry_at(entry: &MediaEntry, now: Instant) -> Self {
    match entry.kind {
      MediaKind::Image => Driver::Image(ImageDriver::new_at(now)),
      MediaKind::Video => Driver::Video(VideoDriver::new(entry)),
    }
  }

  fn state(&self) -> PlaybackState {
    match self {
      Driver::Image(d) => d.state,
      Driver::Video(d) => d.state,
    }
  }
}

/// One playback session: cursor plus active driver. Translates user intents
/// and primitive events into cursor moves, and owns the guard against a
/// playlist whose every entry fails to load.
pub struct Session {
  playlist: Playlist,
  driver: Driver,
  consecutive_failures: usize,
  halted: bool,
}

impl Session {
  pub fn new(entries: Vec<MediaEntry>) -> Result<Self, PlayerError> {
    Self::new_at(entries, Instant::now())
  }

  pub fn new_at(entries: Vec<MediaEntry>, now: Instant) -> Result<Self, PlayerError> {
    let playlist = Playlist::new(entries)?;
    let driver = Driver::for_entry_at(playlist.current(), now);
    Ok(Session {
      playlist,
      driver,
      consecutive_failures: 0,
      halted: false,
    })
  }

  /// Replacing the driver is what retires the previous entry: its countdown
  /// state goes with it, so nothing stale can fire against the new one.
  fn activate_at(&mut self, now: Instant) {
    self.driver = Driver::for_entry_at(self.playlist.current(), now);
    if self.playlist.current().kind == MediaKind::Image {
      // Images cannot fail to load; reaching one ends a failing pass.
      self.consecutive_failures = 0;
    }
  }

  pub fn current(&self) -> &MediaEntry {
    self.playlist.current()
  }

  pub fn position(&self) -> usize {
    self.playlist.position()
  }

  pub fn len(&self) -> usize {
    self.playlist.len()
  }

  pub fn state(&self) -> PlaybackState {
    self.driver.state()
  }

  pub fn halted(&self) -> bool {
    self.halted
  }

  pub fn error(&self) -> Option<PlayerError> {
    self.halted.then_some(PlayerError::AllEntriesFailed)
  }

  pub fn toggle(&mut self) -> Control {
    self.toggle_at(Instant::now())
  }

  pub fn toggle_at(&mut self, now: Instant) -> Control {
    if self.halted {
      return Control::None;
    }
    match &mut self.driver {
      Driver::Image(d) => {
        d.toggle_at(now);
        Control::None
      }
      Driver::Video(d) => d.toggle(),
    }
  }

  pub fn skip_next(&mut self) -> &MediaEntry {
    self.skip_next_at(Instant::now())
  }

  pub fn skip_next_at(&mut self, now: Instant) -> &MediaEntry {
    if !self.halted {
      self.playlist.advance();
      self.activate_at(now);
    }
    self.playlist.current()
  }

  pub fn skip_prev(&mut self) -> &MediaEntry {
    self.skip_prev_at(Instant::now())
  }

  pub fn skip_prev_at(&mut self, now: Instant) -> &MediaEntry {
    if !self.halted {
      self.playlist.retreat();
      self.activate_at(now);
    }
    self.playlist.current()
  }

  pub fn tick(&mut self) -> Outcome {
    self.tick_at(Instant::now())
  }

  /// Drive the image countdown. An expired countdown advances exactly like
  /// a user skip, just unprompted.
  pub fn tick_at(&mut self, now: Instant) -> Outcome {
    if self.halted {
      return Outcome::None;
    }
    if let Driver::Image(d) = &mut self.driver {
      d.tick_at(now);
      if d.state == PlaybackState::Finished {
        self.playlist.advance();
        self.activate_at(now);
        return Outcome::Advanced;
      }
    }
    Outcome::None
  }

  pub fn handle_event(&mut self, entry_id: i32, event: MediaEvent) -> Outcome {
    self.handle_event_at(entry_id, event, Instant::now())
  }

  /// Apply a primitive event. Events carry the id of the entry they were
  /// produced for; anything reported against a retired entry is dropped.
  pub fn handle_event_at(&mut self, entry_id: i32, event: MediaEvent, now: Instant) -> Outcome {
    if self.halted || entry_id != self.playlist.current().id {
      debug!(entry_id, "dropping stale playback event");
      return Outcome::None;
    }
    match event {
      MediaEvent::LoadError => {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.playlist.len() {
          self.halted = true;
          return Outcome::Halted;
        }
        self.playlist.advance();
        self.activate_at(now);
        Outcome::Advanced
      }
      other => {
        if let Driver::Video(d) = &mut self.driver {
          if other == MediaEvent::Ready {
            self.consecutive_failures = 0;
          }
          d.apply(other);
          if d.state == PlaybackState::Finished {
            self.playlist.advance();
            self.activate_at(now);
            return Outcome::Advanced;
          }
        }
        Outcome::None
      }
    }
  }

  pub fn elapsed_secs(&self) -> f64 {
    self.elapsed_secs_at(Instant::now())
  }

  pub fn elapsed_secs_at(&self, now: Instant) -> f64 {
    match &self.driver {
      Driver::Image(d) => d.countdown.elapsed_at(now).as_secs_f64(),
      Driver::Video(d) => d.position,
    }
  }

  pub fn duration_secs(&self) -> Option<f64> {
    match &self.driver {
      Driver::Image(_) => Some(IMAGE_DISPLAY_SECS),
      Driver::Video(d) => d.duration(),
    }
  }

  /// Duration the primitive itself reported, if any. Used to backfill the
  /// stored duration of a video entry the first time it plays.
  pub fn reported_duration(&self) -> Option<f64> {
    match &self.driver {
      Driver::Image(_) => None,
      Driver::Video(d) => d.reported_duration,
    }
  }

  pub fn progress(&self) -> f64 {
    self.progress_at(Instant::now())
  }

  pub fn progress_at(&self, now: Instant) -> f64 {
    match &self.driver {
      Driver::Image(d) => {
        d.countdown.elapsed_at(now).as_secs_f64() / IMAGE_DISPLAY_SECS
      }
      Driver::Video(d) => match d.duration() {
        Some(total) if total > 0.0 => (d.position / total).clamp(0.0, 1.0),
        _ => 0.0,
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(id: i32, kind: MediaKind) -> MediaEntry {
    MediaEntry {
      id,
      title: format!("entry {id}"),
      locator: format!("/media/{id}"),
      kind,
      thumbnail: None,
      duration_seconds: None,
      created_at: chrono::DateTime::from_timestamp(0, 0).unwrap().naive_utc(),
      order_index: None,
    }
  }

  fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
  }

  #[test]
  fn image_progress_is_monotone_and_clamped() {
    let t0 = Instant::now();
    let session = Session::new_at(vec![entry(1, MediaKind::Image)], t0).unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(session.progress_at(t0), 0.0);
    assert_eq!(session.progress_at(t0 + secs(2)), 0.25);
    assert_eq!(session.progress_at(t0 + secs(6)), 0.75);
    assert_eq!(session.progress_at(t0 + secs(8)), 1.0);
    // Never past 1.0, even if the tick is late.
    assert_eq!(session.progress_at(t0 + secs(20)), 1.0);
    assert_eq!(session.duration_secs(), Some(8.0));
  }

  #[test]
  fn image_pause_freezes_and_resume_continues_from_elapsed() {
    let t0 = Instant::now();
    let mut session = Session::new_at(vec![entry(1, MediaKind::Image)], t0).unwrap();

    assert_eq!(session.toggle_at(t0 + secs(3)), Control::None);
    assert_eq!(session.state(), PlaybackState::Paused);
    // Frozen while paused, no matter how long.
    assert_eq!(session.elapsed_secs_at(t0 + secs(60)), 3.0);
    assert_eq!(session.tick_at(t0 + secs(60)), Outcome::None);

    session.toggle_at(t0 + secs(60));
    assert_eq!(session.state(), PlaybackState::Playing);
    // 3s accumulated + 4s running.
    assert_eq!(session.elapsed_secs_at(t0 + secs(64)), 7.0);
    assert_eq!(session.tick_at(t0 + secs(64)), Outcome::None);
    // Finishes 8s of display time after the original start.
    assert_eq!(session.tick_at(t0 + secs(65)), Outcome::Advanced);
  }

  #[test]
  fn image_countdown_expiry_advances_and_self_loops() {
    let t0 = Instant::now();
    let mut session = Session::new_at(vec![entry(1, MediaKind::Image)], t0).unwrap();
    assert_eq!(session.tick_at(t0 + secs(8)), Outcome::Advanced);
    // Single-entry playlist: same entry again, fresh countdown.
    assert_eq!(session.current().id, 1);
    assert_eq!(session.progress_at(t0 + secs(8)), 0.0);
    assert_eq!(session.state(), PlaybackState::Playing);
  }

  #[test]
  fn video_end_of_stream_advances_to_image_with_fixed_duration() {
    let t0 = Instant::now();
    let mut session = Session::new_at(
      vec![entry(1, MediaKind::Video), entry(2, MediaKind::Image)],
      t0,
    )
    .unwrap();
    assert_eq!(session.state(), PlaybackState::Loading);
    assert_eq!(session.duration_secs(), None);

    session.handle_event_at(1, MediaEvent::Ready, t0);
    assert_eq!(session.state(), PlaybackState::Playing);
    session.handle_event_at(
      1,
      MediaEvent::TimeUpdate {
        position: 11.5,
        duration: Some(23.0),
      },
      t0 + secs(11),
    );
    assert_eq!(session.elapsed_secs_at(t0 + secs(11)), 11.5);
    assert_eq!(session.progress_at(t0 + secs(11)), 0.5);

    let t_end = t0 + secs(23);
    assert_eq!(
      session.handle_event_at(1, MediaEvent::EndOfStream, t_end),
      Outcome::Advanced
    );
    assert_eq!(session.current().id, 2);
    assert_eq!(session.duration_secs(), Some(8.0));
    assert_eq!(session.progress_at(t_end), 0.0);
    assert_eq!(session.state(), PlaybackState::Playing);
  }

  #[test]
  fn video_time_comes_only_from_the_primitive() {
    let t0 = Instant::now();
    let mut session = Session::new_at(vec![entry(1, MediaKind::Video)], t0).unwrap();
    session.handle_event_at(1, MediaEvent::Ready, t0);
    // No time update yet: elapsed stays 0 no matter how much wall time passed.
    assert_eq!(session.elapsed_secs_at(t0 + secs(100)), 0.0);
    assert_eq!(session.progress_at(t0 + secs(100)), 0.0);
  }

  #[test]
  fn video_toggle_directs_the_primitive() {
    let t0 = Instant::now();
    let mut session = Session::new_at(vec![entry(1, MediaKind::Video)], t0).unwrap();
    // Nothing to pause while loading.
    assert_eq!(session.toggle_at(t0), Control::None);
    session.handle_event_at(1, MediaEvent::Ready, t0);
    assert_eq!(session.toggle_at(t0), Control::PausePrimitive);
    assert_eq!(session.state(), PlaybackState::Paused);
    assert_eq!(session.toggle_at(t0), Control::ResumePrimitive);
    assert_eq!(session.state(), PlaybackState::Playing);
  }

  #[test]
  fn skip_discards_the_active_countdown() {
    let t0 = Instant::now();
    let mut session = Session::new_at(
      vec![entry(1, MediaKind::Image), entry(2, MediaKind::Image)],
      t0,
    )
    .unwrap();
    session.skip_next_at(t0 + secs(5));
    assert_eq!(session.current().id, 2);
    // The old countdown is gone: ticking at what would have been entry 1's
    // expiry does not advance entry 2.
    assert_eq!(session.tick_at(t0 + secs(8)), Outcome::None);
    assert_eq!(session.elapsed_secs_at(t0 + secs(8)), 3.0);
    session.skip_prev_at(t0 + secs(9));
    assert_eq!(session.current().id, 1);
    assert_eq!(session.progress_at(t0 + secs(9)), 0.0);
  }

  #[test]
  fn stale_events_for_a_retired_entry_are_dropped() {
    let t0 = Instant::now();
    let mut session = Session::new_at(
      vec![entry(1, MediaKind::Video), entry(2, MediaKind::Image)],
      t0,
    )
    .unwrap();
    session.skip_next_at(t0);
    assert_eq!(session.current().id, 2);
    // A late end-of-stream from the replaced video changes nothing.
    assert_eq!(session.handle_event_at(1, MediaEvent::EndOfStream, t0), Outcome::None);
    assert_eq!(session.current().id, 2);
    assert_eq!(session.state(), PlaybackState::Playing);
  }

  #[test]
  fn load_errors_skip_until_a_full_pass_fails() {
    let t0 = Instant::now();
    let mut session = Session::new_at(
      vec![entry(1, MediaKind::Video), entry(2, MediaKind::Video)],
      t0,
    )
    .unwrap();
    assert_eq!(session.handle_event_at(1, MediaEvent::LoadError, t0), Outcome::Advanced);
    assert_eq!(session.current().id, 2);
    assert!(!session.halted());

    assert_eq!(session.handle_event_at(2, MediaEvent::LoadError, t0), Outcome::Halted);
    assert!(session.halted());
    assert_eq!(session.error(), Some(PlayerError::AllEntriesFailed));
    // A halted session ignores everything.
    assert_eq!(session.handle_event_at(2, MediaEvent::Ready, t0), Outcome::None);
    assert_eq!(session.toggle_at(t0), Control::None);
  }

  #[test]
  fn a_successful_load_resets_the_failure_count() {
    let t0 = Instant::now();
    let mut session = Session::new_at(
      vec![entry(1, MediaKind::Video), entry(2, MediaKind::Video)],
      t0,
    )
    .unwrap();
    session.handle_event_at(1, MediaEvent::LoadError, t0);
    session.handle_event_at(2, MediaEvent::Ready, t0);
    session.handle_event_at(2, MediaEvent::EndOfStream, t0);
    assert_eq!(session.current().id, 1);
    // One fresh failure is not a full failing pass.
    assert_eq!(session.handle_event_at(1, MediaEvent::LoadError, t0), Outcome::Advanced);
    assert!(!session.halted());
  }

  #[test]
  fn reaching_an_image_ends_a_failing_pass() {
    let t0 = Instant::now();
    let mut session = Session::new_at(
      vec![entry(1, MediaKind::Video), entry(2, MediaKind::Image)],
      t0,
    )
    .unwrap();
    assert_eq!(session.handle_event_at(1, MediaEvent::LoadError, t0), Outcome::Advanced);
    assert_eq!(session.current().id, 2);
    // The image played, so the next video failure starts a new count.
    assert_eq!(session.tick_at(t0 + secs(8)), Outcome::Advanced);
    assert_eq!(session.current().id, 1);
    assert_eq!(session.handle_event_at(1, MediaEvent::LoadError, t0 + secs(8)), Outcome::Advanced);
    assert!(!session.halted());
  }
}
