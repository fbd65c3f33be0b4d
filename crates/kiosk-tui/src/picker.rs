use kiosk_core::MediaKind;
use std::path::Path;
use thiserror::Error;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "avi", "mov", "m4v", "mpg", "mpeg", "ts", "wmv",
];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PickerError {
    #[error("no such file: {0}")]
    NotFound(String),

    #[error("not a {1} file: {0}")]
    WrongKind(String, &'static str),
}

/// Validate a path typed into the form and return it as the entry locator.
/// Cancellation never reaches this function; the form handles Esc itself.
pub fn pick(input: &str, kind: MediaKind) -> Result<String, PickerError> {
    let input = input.trim();
    let path = Path::new(input);
    if !path.is_file() {
        return Err(PickerError::NotFound(input.to_string()));
    }
    let allowed = match kind {
        MediaKind::Video => VIDEO_EXTENSIONS,
        MediaKind::Image => IMAGE_EXTENSIONS,
    };
    if !has_extension(path, allowed) {
        return Err(PickerError::WrongKind(input.to_string(), kind.as_str()));
    }
    Ok(input.to_string())
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| allowed.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Default title for an entry whose form was submitted without one.
pub fn filename_stem(locator: &str) -> String {
    Path::new(locator)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn pick_accepts_a_matching_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.MP4");
        File::create(&path).unwrap();
        let input = path.to_str().unwrap();
        assert_eq!(pick(input, MediaKind::Video), Ok(input.to_string()));
    }

    #[test]
    fn pick_rejects_a_missing_file() {
        assert!(matches!(
            pick("/nonexistent/clip.mp4", MediaKind::Video),
            Err(PickerError::NotFound(_))
        ));
    }

    #[test]
    fn pick_rejects_the_wrong_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        File::create(&path).unwrap();
        let input = path.to_str().unwrap();
        assert!(matches!(
            pick(input, MediaKind::Video),
            Err(PickerError::WrongKind(_, "video"))
        ));
        assert!(pick(input, MediaKind::Image).is_ok());
    }

    #[test]
    fn filename_stem_drops_directory_and_extension() {
        assert_eq!(filename_stem("/media/My Holiday.mp4"), "My Holiday");
        assert_eq!(filename_stem("photo.png"), "photo");
        assert_eq!(filename_stem(""), "Untitled");
    }
}
