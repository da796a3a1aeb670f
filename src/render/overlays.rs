//! Speaker image overlays.

use std::path::PathBuf;

use super::RenderError;
use crate::config::{SpeakerConfig, SpeakerSide};
use crate::speech::SpeakerTiming;

/// Overlay height as a share of the video height.
pub const OVERLAY_HEIGHT_RATIO: f64 = 0.4;

/// One speaker's image and the windows it is visible in.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySpec {
    pub speaker: String,
    pub image: PathBuf,
    pub side: SpeakerSide,
    pub windows: Vec<(f64, f64)>,
}

/// Match speaker timings to configured speaker images.
///
/// Speakers without an image, and timings for unknown speakers, are
/// skipped. A configured image that does not exist is an error.
pub fn plan_overlays(
    timings: &[SpeakerTiming],
    speakers: &[SpeakerConfig],
) -> Result<Vec<OverlaySpec>, RenderError> {
    let mut specs = Vec::new();
    for speaker in speakers {
        let Some(image) = &speaker.image else {
            continue;
        };
        let windows: Vec<(f64, f64)> = timings
            .iter()
            .filter(|t| t.speaker.eq_ignore_ascii_case(&speaker.name))
            .map(|t| (t.start, t.end))
            .collect();
        if windows.is_empty() {
            continue;
        }
        if !image.is_file() {
            return Err(RenderError::MissingImage {
                speaker: speaker.name.clone(),
                path: image.clone(),
            });
        }
        specs.push(OverlaySpec {
            speaker: speaker.name.clone(),
            image: image.clone(),
            side: speaker.side,
            windows,
        });
    }
    Ok(specs)
}

/// ffmpeg `enable` expression that is true inside any window.
pub fn enable_expr(windows: &[(f64, f64)]) -> String {
    windows
        .iter()
        .map(|(start, end)| format!("between(t,{:.3},{:.3})", start, end))
        .collect::<Vec<_>>()
        .join("+")
}

/// Filter chain that scales input `image_input` and lays it over `base`,
/// producing `out`.
pub fn overlay_filter(
    spec: &OverlaySpec,
    image_input: usize,
    video_height: u32,
    base: &str,
    out: &str,
) -> String {
    let height = (video_height as f64 * OVERLAY_HEIGHT_RATIO).round() as u32;
    let x = match spec.side {
        SpeakerSide::Left => "0",
        SpeakerSide::Right => "main_w-overlay_w",
    };
    format!(
        "[{input}:v]scale=-1:{height},format=rgba[img{input}];\
[{base}][img{input}]overlay=x={x}:y=main_h-overlay_h:enable='{enable}'[{out}]",
        input = image_input,
        height = height,
        base = base,
        x = x,
        enable = enable_expr(&spec.windows),
        out = out,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speaker(name: &str, image: Option<PathBuf>, side: SpeakerSide) -> SpeakerConfig {
        SpeakerConfig {
            name: name.to_string(),
            voice_id: "v".to_string(),
            model_id: "m".to_string(),
            speed: 1.0,
            image,
            side,
        }
    }

    fn timing(s: &str, start: f64, end: f64) -> SpeakerTiming {
        SpeakerTiming {
            speaker: s.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_plan_overlays_groups_windows() {
        let dir = tempfile::tempdir().unwrap();
        let peter = dir.path().join("peter.png");
        std::fs::write(&peter, b"png").unwrap();

        let speakers = vec![
            speaker("Peter", Some(peter.clone()), SpeakerSide::Left),
            speaker("Stewie", None, SpeakerSide::Right),
        ];
        let timings = vec![
            timing("Peter", 0.0, 1.0),
            timing("Stewie", 1.2, 2.0),
            timing("Lois", 2.2, 3.0),
            timing("Peter", 3.2, 4.0),
        ];
        let specs = plan_overlays(&timings, &speakers).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].image, peter);
        assert_eq!(specs[0].windows, vec![(0.0, 1.0), (3.2, 4.0)]);
    }

    #[test]
    fn test_plan_overlays_missing_image() {
        let speakers = vec![speaker(
            "Peter",
            Some(PathBuf::from("/nonexistent/peter.png")),
            SpeakerSide::Left,
        )];
        let result = plan_overlays(&[timing("Peter", 0.0, 1.0)], &speakers);
        assert!(matches!(result, Err(RenderError::MissingImage { .. })));
    }

    #[test]
    fn test_plan_overlays_silent_speaker_needs_no_image() {
        let speakers = vec![speaker(
            "Peter",
            Some(PathBuf::from("/nonexistent/peter.png")),
            SpeakerSide::Left,
        )];
        assert!(plan_overlays(&[], &speakers).unwrap().is_empty());
    }

    #[test]
    fn test_overlay_filter_positions() {
        let spec = OverlaySpec {
            speaker: "Stewie".to_string(),
            image: PathBuf::from("s.png"),
            side: SpeakerSide::Right,
            windows: vec![(1.2, 2.0), (4.0, 5.5)],
        };
        let filter = overlay_filter(&spec, 3, 1920, "v1", "v2");
        assert_eq!(
            filter,
            "[3:v]scale=-1:768,format=rgba[img3];[v1][img3]overlay=x=main_w-overlay_w:y=main_h-overlay_h:\
enable='between(t,1.200,2.000)+between(t,4.000,5.500)'[v2]"
        );
    }
}
