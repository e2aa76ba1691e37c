//! Native file dialog behind the core's media picker contract.

use std::path::Path;

use async_trait::async_trait;
use client_core::{MediaPicker, MediaType, PickOptions, PickOutcome};
use tracing::debug;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv"];

/// Picks from the local file system. Size limits in [`PickOptions`] are not
/// enforced; the chosen file is referenced in place.
pub struct RfdMediaPicker;

#[async_trait]
impl MediaPicker for RfdMediaPicker {
    async fn pick(&self, options: PickOptions) -> PickOutcome {
        debug!(?options, "opening media picker");
        let mut dialog = rfd::AsyncFileDialog::new().set_title("Choose a profile photo");
        dialog = match options.media_type {
            MediaType::Photo => dialog.add_filter("Images", IMAGE_EXTENSIONS),
            MediaType::Video => dialog.add_filter("Videos", VIDEO_EXTENSIONS),
            MediaType::Mixed => dialog
                .add_filter("Images", IMAGE_EXTENSIONS)
                .add_filter("Videos", VIDEO_EXTENSIONS),
        };

        match dialog.pick_file().await {
            Some(handle) => outcome_for_path(handle.path(), options.media_type),
            None => PickOutcome::Cancelled,
        }
    }
}

pub fn outcome_for_path(path: &Path, media_type: MediaType) -> PickOutcome {
    let Some(mime) = mime_guess::from_path(path).first() else {
        return PickOutcome::Error(format!("unrecognized file type: {}", path.display()));
    };
    let accepted = match media_type {
        MediaType::Photo => mime.type_() == mime_guess::mime::IMAGE,
        MediaType::Video => mime.type_() == mime_guess::mime::VIDEO,
        MediaType::Mixed => {
            mime.type_() == mime_guess::mime::IMAGE || mime.type_() == mime_guess::mime::VIDEO
        }
    };
    if !accepted {
        return PickOutcome::Error(format!("{} is not a supported media file ({mime})", path.display()));
    }
    PickOutcome::Asset {
        uri: file_uri(path),
    }
}

fn file_uri(path: &Path) -> String {
    let path = path.display().to_string().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{path}")
    } else {
        format!("file:///{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_becomes_file_uri() {
        let outcome = outcome_for_path(Path::new("/home/ada/me.png"), MediaType::Photo);
        assert_eq!(
            outcome,
            PickOutcome::Asset {
                uri: "file:///home/ada/me.png".to_string()
            }
        );
    }

    #[test]
    fn windows_paths_are_normalized() {
        let outcome = outcome_for_path(Path::new("C:\\Users\\ada\\me.jpg"), MediaType::Photo);
        assert_eq!(
            outcome,
            PickOutcome::Asset {
                uri: "file:///C:/Users/ada/me.jpg".to_string()
            }
        );
    }

    #[test]
    fn non_image_is_rejected_for_photos() {
        let outcome = outcome_for_path(Path::new("/tmp/notes.txt"), MediaType::Photo);
        assert!(matches!(outcome, PickOutcome::Error(reason) if reason.contains("notes.txt")));
    }

    #[test]
    fn video_is_accepted_for_mixed() {
        let outcome = outcome_for_path(Path::new("/tmp/ride.mp4"), MediaType::Mixed);
        assert!(matches!(outcome, PickOutcome::Asset { .. }));
    }
}
