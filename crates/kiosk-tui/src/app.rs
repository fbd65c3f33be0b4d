use crate::mpv::MpvPlayer;
use crate::picker;
use kiosk_core::settings::write_settings;
use kiosk_core::{
    Control, CoreSettings, KindFilter, Library, LibraryStats, MediaEntry, MediaEvent, MediaKind,
    MediaPatch, NewMediaEntry, Outcome, Session,
};
use ratatui::widgets::TableState;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How long the player overlay stays up after the last keypress.
pub const OVERLAY_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Manager,
    Player,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Normal,
    KindSelect,
    TitleInput,
    LocatorInput,
    ThumbnailInput,
    ConfirmDelete,
    Help,
}

/// Add/edit form, filled in field by field. `editing` carries the id when
/// this is an edit; kind is then fixed (changing kind is delete + re-add).
pub struct MediaForm {
    pub editing: Option<i32>,
    pub kind: MediaKind,
    pub title: String,
    pub locator: String,
    pub thumbnail: String,
    pub error: Option<String>,
}

pub struct PlayerPane {
    pub session: Session,
    pub mpv: Option<MpvPlayer>,
    pub overlay_visible: bool,
    pub overlay_deadline: Instant,
    duration_saved: bool,
}

pub struct App {
    pub library: Library,
    pub settings: CoreSettings,
    pub screen: Screen,
    pub ui_mode: UiMode,
    pub entries: Vec<MediaEntry>,
    pub stats: LibraryStats,
    pub recent_titles: Vec<String>,
    pub list_state: TableState,
    pub form: Option<MediaForm>,
    pub pending_delete: Option<(i32, String)>,
    pub status_message: Option<String>,
    pub player: Option<PlayerPane>,
    pub should_quit: bool,
}

enum FormStep {
    Stay,
    Thumbnail,
    Save,
}

impl App {
    pub fn new(library: Library, settings: CoreSettings) -> Self {
        let mut app = App {
            library,
            settings,
            screen: Screen::Manager,
            ui_mode: UiMode::Normal,
            entries: Vec::new(),
            stats: LibraryStats::default(),
            recent_titles: Vec::new(),
            list_state: TableState::default(),
            form: None,
            pending_delete: None,
            status_message: None,
            player: None,
            should_quit: false,
        };
        app.refresh_entries();
        app
    }

    /// Reload the manager listing (playback order, current kind filter) and
    /// the dashboard stats. A storage failure becomes a dismissable alert;
    /// the user retries manually with `r`.
    pub fn refresh_entries(&mut self) {
        match self.library.playback_entries() {
            Ok(entries) => {
                let filter = self.settings.kind_filter;
                self.entries = entries
                    .into_iter()
                    .filter(|e| filter.matches(e.kind))
                    .collect();
            }
            Err(e) => {
                self.status_message = Some(format!("Failed to load library: {e}"));
                self.entries.clear();
            }
        }
        if let Ok(stats) = self.library.stats() {
            self.stats = stats;
        }
        if let Ok(recent) = self.library.recent(3) {
            self.recent_titles = recent.into_iter().map(|e| e.title).collect();
        }
        if self.entries.is_empty() {
            self.list_state.select(None);
        } else {
            let i = self
                .list_state
                .selected()
                .unwrap_or(0)
                .min(self.entries.len() - 1);
            self.list_state.select(Some(i));
        }
    }

    pub fn selected_entry(&self) -> Option<&MediaEntry> {
        self.list_state.selected().and_then(|i| self.entries.get(i))
    }

    pub fn select_up(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = self.list_state.selected().unwrap_or(0);
        if i > 0 {
            self.list_state.select(Some(i - 1));
        }
    }

    pub fn select_down(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let i = self.list_state.selected().unwrap_or(0);
        if i + 1 < self.entries.len() {
            self.list_state.select(Some(i + 1));
        }
    }

    pub fn cycle_filter(&mut self) {
        self.settings.kind_filter = self.settings.kind_filter.next();
        if let Err(e) = write_settings(&self.settings) {
            warn!("failed to persist settings: {e}");
        }
        self.refresh_entries();
        self.status_message = Some(format!("Filter: {}", self.settings.kind_filter.label()));
    }

    // ---- add/edit form ----

    pub fn open_add_form(&mut self) {
        self.form = Some(MediaForm {
            editing: None,
            kind: MediaKind::Video,
            title: String::new(),
            locator: String::new(),
            thumbnail: String::new(),
            error: None,
        });
        self.ui_mode = UiMode::KindSelect;
    }

    pub fn open_edit_form(&mut self) {
        let Some(entry) = self.selected_entry().cloned() else {
            return;
        };
        self.form = Some(MediaForm {
            editing: Some(entry.id),
            kind: entry.kind,
            title: entry.title,
            locator: entry.locator,
            thumbnail: entry.thumbnail.unwrap_or_default(),
            error: None,
        });
        self.ui_mode = UiMode::TitleInput;
    }

    /// Backing out of the form at any step is a cancellation, not an error.
    pub fn cancel_form(&mut self) {
        self.form = None;
        self.ui_mode = UiMode::Normal;
    }

    pub fn form_set_kind(&mut self, kind: MediaKind) {
        if let Some(form) = self.form.as_mut() {
            form.kind = kind;
        }
        self.ui_mode = UiMode::TitleInput;
    }

    pub fn form_input(&mut self, c: char) {
        let mode = self.ui_mode;
        if let Some(form) = self.form.as_mut() {
            form.error = None;
            match mode {
                UiMode::TitleInput => form.title.push(c),
                UiMode::LocatorInput => form.locator.push(c),
                UiMode::ThumbnailInput => form.thumbnail.push(c),
                _ => {}
            }
        }
    }

    pub fn form_backspace(&mut self) {
        let mode = self.ui_mode;
        if let Some(form) = self.form.as_mut() {
            form.error = None;
            match mode {
                UiMode::TitleInput => {
                    form.title.pop();
                }
                UiMode::LocatorInput => {
                    form.locator.pop();
                }
                UiMode::ThumbnailInput => {
                    form.thumbnail.pop();
                }
                _ => {}
            }
        }
    }

    pub fn form_confirm(&mut self) {
        match self.ui_mode {
            UiMode::TitleInput => self.ui_mode = UiMode::LocatorInput,
            UiMode::LocatorInput => self.confirm_locator(),
            UiMode::ThumbnailInput => self.confirm_thumbnail(),
            _ => {}
        }
    }

    fn confirm_locator(&mut self) {
        let step = {
            let Some(form) = self.form.as_mut() else {
                return;
            };
            if form.locator.trim().is_empty() {
                form.error = Some(match form.kind {
                    MediaKind::Video => "Please pick a video file".to_string(),
                    MediaKind::Image => "Please pick an image".to_string(),
                });
                FormStep::Stay
            } else {
                match picker::pick(&form.locator, form.kind) {
                    Ok(locator) => {
                        form.locator = locator;
                        form.error = None;
                        if form.title.trim().is_empty() {
                            form.title = picker::filename_stem(&form.locator);
                        }
                        if form.kind == MediaKind::Image {
                            // The picked image doubles as its own thumbnail.
                            if form.thumbnail.is_empty() {
                                form.thumbnail = form.locator.clone();
                            }
                            FormStep::Save
                        } else {
                            FormStep::Thumbnail
                        }
                    }
                    Err(e) => {
                        form.error = Some(e.to_string());
                        FormStep::Stay
                    }
                }
            }
        };
        match step {
            FormStep::Save => self.save_form(),
            FormStep::Thumbnail => self.ui_mode = UiMode::ThumbnailInput,
            FormStep::Stay => {}
        }
    }

    fn confirm_thumbnail(&mut self) {
        let step = {
            let Some(form) = self.form.as_mut() else {
                return;
            };
            let text = form.thumbnail.trim().to_string();
            if text.is_empty() {
                // Thumbnails are optional for videos.
                form.thumbnail.clear();
                FormStep::Save
            } else {
                match picker::pick(&text, MediaKind::Image) {
                    Ok(path) => {
                        form.thumbnail = path;
                        form.error = None;
                        FormStep::Save
                    }
                    Err(e) => {
                        form.error = Some(e.to_string());
                        FormStep::Stay
                    }
                }
            }
        };
        match step {
            FormStep::Save => self.save_form(),
            FormStep::Stay => {}
            FormStep::Thumbnail => {}
        }
    }

    fn save_form(&mut self) {
        let Some(form) = self.form.take() else {
            return;
        };
        let title = {
            let trimmed = form.title.trim();
            if trimmed.is_empty() {
                picker::filename_stem(&form.locator)
            } else {
                trimmed.to_string()
            }
        };
        let thumbnail = {
            let trimmed = form.thumbnail.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        };

        let result = if let Some(id) = form.editing {
            let patch = MediaPatch {
                title: Some(title.clone()),
                locator: Some(form.locator.clone()),
                thumbnail: Some(thumbnail.clone()),
                duration_seconds: None,
            };
            self.library.update(id, &patch).map(|_| "Media updated")
        } else {
            let mut new = NewMediaEntry::new(form.kind, &title, &form.locator);
            new.thumbnail = thumbnail.as_deref();
            self.library.create(new).map(|_| "Media added")
        };

        match result {
            Ok(msg) => {
                info!("{msg}: \"{title}\"");
                self.status_message = Some(format!("{msg}: \"{title}\""));
            }
            Err(e) => {
                warn!("failed to save media: {e}");
                self.status_message = Some(format!("Failed to save media: {e}"));
            }
        }
        self.ui_mode = UiMode::Normal;
        self.refresh_entries();
    }

    // ---- delete ----

    pub fn request_delete(&mut self) {
        if let Some(entry) = self.selected_entry() {
            self.pending_delete = Some((entry.id, entry.title.clone()));
            self.ui_mode = UiMode::ConfirmDelete;
        }
    }

    pub fn confirm_delete(&mut self) {
        if let Some((id, title)) = self.pending_delete.take() {
            match self.library.delete(id) {
                Ok(true) => self.status_message = Some(format!("Deleted \"{title}\"")),
                Ok(false) => self.status_message = Some("Media was already gone".to_string()),
                Err(e) => self.status_message = Some(format!("Failed to delete media: {e}")),
            }
        }
        self.ui_mode = UiMode::Normal;
        self.refresh_entries();
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
        self.ui_mode = UiMode::Normal;
    }

    // ---- reorder ----

    pub fn move_selected_up(&mut self) {
        self.move_selected(-1);
    }

    pub fn move_selected_down(&mut self) {
        self.move_selected(1);
    }

    /// Swap the selected entry with its neighbour and persist the whole
    /// listing as the new dense order. Only meaningful on the unfiltered
    /// listing; a filtered view would scramble the hidden entries.
    fn move_selected(&mut self, delta: i32) {
        if self.settings.kind_filter != KindFilter::All {
            self.status_message = Some("Reordering needs the All filter".to_string());
            return;
        }
        let Some(i) = self.list_state.selected() else {
            return;
        };
        let j = i as i32 + delta;
        if j < 0 || j as usize >= self.entries.len() {
            return;
        }
        let j = j as usize;
        self.entries.swap(i, j);
        let ids: Vec<i32> = self.entries.iter().map(|e| e.id).collect();
        match self.library.reorder(&ids) {
            Ok(()) => self.list_state.select(Some(j)),
            Err(e) => self.status_message = Some(format!("Failed to reorder: {e}")),
        }
        self.refresh_entries();
    }

    // ---- player ----

    pub fn enter_player(&mut self) {
        let entries = match self.library.playback_entries() {
            Ok(entries) => entries,
            Err(e) => {
                self.status_message = Some(format!("Failed to load media: {e}"));
                return;
            }
        };
        match Session::new(entries) {
            Ok(session) => {
                self.player = Some(PlayerPane {
                    session,
                    mpv: None,
                    overlay_visible: true,
                    overlay_deadline: Instant::now() + OVERLAY_TIMEOUT,
                    duration_saved: false,
                });
                self.screen = Screen::Player;
                self.activate_current();
            }
            Err(e) => {
                // Refused before any playback state exists.
                self.status_message = Some(format!("{e}. Add some media first."));
            }
        }
    }

    pub fn leave_player(&mut self) {
        if let Some(mut pane) = self.player.take() {
            if let Some(mut mpv) = pane.mpv.take() {
                mpv.shutdown();
            }
        }
        self.screen = Screen::Manager;
        self.refresh_entries();
    }

    /// Point the playback primitive at the session's current entry. The old
    /// mpv process dies before the new entry starts; images need no process.
    /// Entries whose player fails to start are skipped on the spot, until
    /// the session halts.
    fn activate_current(&mut self) {
        let mut halted_message = None;
        loop {
            let Some(pane) = self.player.as_mut() else {
                return;
            };
            if let Some(mut mpv) = pane.mpv.take() {
                mpv.shutdown();
            }
            pane.duration_saved = false;
            let entry = pane.session.current().clone();
            if entry.kind != MediaKind::Video {
                break;
            }
            match MpvPlayer::spawn(&self.settings.mpv_bin, &entry.locator, entry.id) {
                Ok(mpv) => {
                    pane.mpv = Some(mpv);
                    break;
                }
                Err(e) => {
                    warn!("playback failed for \"{}\": {e}", entry.title);
                    match pane.session.handle_event(entry.id, MediaEvent::LoadError) {
                        Outcome::Advanced => continue,
                        Outcome::Halted => {
                            halted_message = pane.session.error().map(|err| err.to_string());
                            break;
                        }
                        Outcome::None => break,
                    }
                }
            }
        }
        if let Some(msg) = halted_message {
            self.status_message = Some(msg);
        }
    }

    pub fn poke_overlay(&mut self) {
        if let Some(pane) = self.player.as_mut() {
            pane.overlay_visible = true;
            pane.overlay_deadline = Instant::now() + OVERLAY_TIMEOUT;
        }
    }

    pub fn toggle_playback(&mut self) {
        let Some(pane) = self.player.as_mut() else {
            return;
        };
        match pane.session.toggle() {
            Control::PausePrimitive => {
                if let Some(mpv) = pane.mpv.as_mut() {
                    mpv.set_paused(true);
                }
            }
            Control::ResumePrimitive => {
                if let Some(mpv) = pane.mpv.as_mut() {
                    mpv.set_paused(false);
                }
            }
            Control::None => {}
        }
    }

    pub fn skip_next(&mut self) {
        if let Some(pane) = self.player.as_mut() {
            pane.session.skip_next();
            self.activate_current();
        }
    }

    pub fn skip_prev(&mut self) {
        if let Some(pane) = self.player.as_mut() {
            pane.session.skip_prev();
            self.activate_current();
        }
    }

    pub fn on_tick(&mut self) {
        if self.screen == Screen::Player {
            self.player_tick(Instant::now());
        }
    }

    fn player_tick(&mut self, now: Instant) {
        self.backfill_duration();

        let mut advanced = false;
        let mut halted = false;
        {
            let Some(pane) = self.player.as_mut() else {
                return;
            };
            let events: Vec<(i32, MediaEvent)> = match pane.mpv.as_mut() {
                Some(mpv) => {
                    let id = mpv.entry_id();
                    mpv.poll().into_iter().map(|event| (id, event)).collect()
                }
                None => Vec::new(),
            };
            for (id, event) in events {
                match pane.session.handle_event_at(id, event, now) {
                    Outcome::Advanced => {
                        advanced = true;
                        break;
                    }
                    Outcome::Halted => {
                        halted = true;
                        break;
                    }
                    Outcome::None => {}
                }
            }
            if !advanced && !halted {
                match pane.session.tick_at(now) {
                    Outcome::Advanced => advanced = true,
                    Outcome::Halted => halted = true,
                    Outcome::None => {}
                }
            }
            if pane.overlay_visible && now >= pane.overlay_deadline {
                pane.overlay_visible = false;
            }
        }
        if advanced {
            self.activate_current();
        }
        if halted {
            if let Some(pane) = self.player.as_mut() {
                if let Some(mut mpv) = pane.mpv.take() {
                    mpv.shutdown();
                }
                if let Some(err) = pane.session.error() {
                    self.status_message = Some(err.to_string());
                }
            }
        }
    }

    /// Store the duration the primitive reported the first time a video
    /// entry without one plays.
    fn backfill_duration(&mut self) {
        let Some(pane) = self.player.as_mut() else {
            return;
        };
        if pane.duration_saved {
            return;
        }
        let Some(duration) = pane.session.reported_duration() else {
            return;
        };
        let entry = pane.session.current();
        if entry.duration_seconds.is_some() {
            pane.duration_saved = true;
            return;
        }
        let id = entry.id;
        let patch = MediaPatch {
            duration_seconds: Some(duration),
            ..Default::default()
        };
        match self.library.update(id, &patch) {
            Ok(_) => info!("stored duration {duration:.1}s for entry {id}"),
            Err(e) => warn!("failed to store duration for entry {id}: {e}"),
        }
        pane.duration_saved = true;
    }
}
