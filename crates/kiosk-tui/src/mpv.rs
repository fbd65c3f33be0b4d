use kiosk_core::MediaEvent;
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::{debug, warn};

/// One mpv subprocess playing one video entry, controlled over its JSON IPC
/// socket. This is the playback primitive: it reports ready, time updates,
/// end of stream and load failures; the core session decides what they mean.
pub struct MpvPlayer {
    entry_id: i32,
    child: Child,
    socket_path: PathBuf,
    stream: Option<UnixStream>,
    pending: String,
    last_duration: Option<f64>,
    ready: bool,
    finished: bool,
    observed: bool,
}

impl MpvPlayer {
    pub fn spawn(bin: &str, locator: &str, entry_id: i32) -> Result<Self, String> {
        let socket_path = PathBuf::from(format!(
            "/tmp/kiosk-mpv-{}-{}.sock",
            std::process::id(),
            entry_id
        ));

        let child = Command::new(bin)
            .arg("--really-quiet")
            .arg("--no-terminal")
            .arg("--fullscreen")
            .arg("--keep-open=no")
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .arg(locator)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("Failed to start {bin}: {e}. Is mpv installed?"))?;

        Ok(MpvPlayer {
            entry_id,
            child,
            socket_path,
            stream: None,
            pending: String::new(),
            last_duration: None,
            ready: false,
            finished: false,
            observed: false,
        })
    }

    pub fn entry_id(&self) -> i32 {
        self.entry_id
    }

    /// The socket only appears once mpv has started up; keep trying until
    /// it does.
    fn connect(&mut self) {
        if self.stream.is_some() {
            return;
        }
        if let Ok(stream) = UnixStream::connect(&self.socket_path) {
            if stream.set_nonblocking(true).is_ok() {
                self.stream = Some(stream);
            }
        }
    }

    fn send(&mut self, command: &Value) -> bool {
        if let Some(stream) = self.stream.as_mut() {
            let line = format!("{}\n", command);
            if stream.write_all(line.as_bytes()).is_ok() {
                return true;
            }
            self.stream = None;
        }
        false
    }

    fn observe(&mut self) {
        if self.observed || self.stream.is_none() {
            return;
        }
        let time_pos = json!({ "command": ["observe_property", 1, "time-pos"] });
        let duration = json!({ "command": ["observe_property", 2, "duration"] });
        if self.send(&time_pos) && self.send(&duration) {
            self.observed = true;
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        let command = json!({ "command": ["set_property", "pause", paused] });
        if !self.send(&command) {
            warn!("could not reach mpv to change pause state");
        }
    }

    /// Drain everything mpv reported since the last poll.
    pub fn poll(&mut self) -> Vec<MediaEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }
        self.connect();
        self.observe();
        self.read_messages(&mut events);
        if self.finished {
            return events;
        }

        // Process exit without an end-file message still ends the entry: a
        // clean end of stream if the file ever loaded, a load failure if not.
        match self.child.try_wait() {
            Ok(Some(_)) => {
                self.finished = true;
                events.push(if self.ready {
                    MediaEvent::EndOfStream
                } else {
                    MediaEvent::LoadError
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!("failed to poll mpv: {e}");
                self.finished = true;
                events.push(MediaEvent::LoadError);
            }
        }
        events
    }

    fn read_messages(&mut self, events: &mut Vec<MediaEvent>) {
        let mut incoming = String::new();
        {
            let Some(stream) = self.stream.as_mut() else {
                return;
            };
            let mut buf = [0u8; 4096];
            loop {
                match stream.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => incoming.push_str(&String::from_utf8_lossy(&buf[..n])),
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        debug!("mpv socket read failed: {e}");
                        break;
                    }
                }
            }
        }
        self.pending.push_str(&incoming);
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            self.parse_message(line.trim(), events);
        }
    }

    fn parse_message(&mut self, line: &str, events: &mut Vec<MediaEvent>) {
        if line.is_empty() {
            return;
        }
        let Ok(msg) = serde_json::from_str::<Value>(line) else {
            debug!("unparseable mpv message: {line}");
            return;
        };
        match msg.get("event").and_then(Value::as_str) {
            Some("file-loaded") => {
                self.ready = true;
                events.push(MediaEvent::Ready);
            }
            Some("property-change") => match msg.get("name").and_then(Value::as_str) {
                Some("time-pos") => {
                    if let Some(position) = msg.get("data").and_then(Value::as_f64) {
                        events.push(MediaEvent::TimeUpdate {
                            position,
                            duration: self.last_duration,
                        });
                    }
                }
                Some("duration") => {
                    if let Some(duration) = msg.get("data").and_then(Value::as_f64) {
                        self.last_duration = Some(duration);
                    }
                }
                _ => {}
            },
            Some("end-file") => {
                let reason = msg.get("reason").and_then(Value::as_str).unwrap_or("");
                self.finished = true;
                events.push(if reason == "error" || !self.ready {
                    MediaEvent::LoadError
                } else {
                    MediaEvent::EndOfStream
                });
            }
            _ => {}
        }
    }

    pub fn shutdown(&mut self) {
        let quit = json!({ "command": ["quit"] });
        self.send(&quit);
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_file(&self.socket_path);
        self.stream = None;
        self.finished = true;
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
