//! Background footage selection and vertical framing.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

use super::RenderError;

/// Extra footage requested beyond the reel length.
pub const BACKGROUND_PAD: f64 = 0.5;

/// All `.mp4` files directly inside `dir`, sorted by name.
pub fn list_backgrounds(dir: &Path) -> Result<Vec<PathBuf>, RenderError> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_mp4 = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("mp4"))
            .unwrap_or(false);
        if is_mp4 && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Pick a random background clip from `dir`.
///
/// # Errors
///
/// Returns `RenderError::NoBackgrounds` when the folder has no MP4 files.
pub fn pick_background<R: Rng + ?Sized>(dir: &Path, rng: &mut R) -> Result<PathBuf, RenderError> {
    let choices = list_backgrounds(dir)?;
    choices
        .choose(rng)
        .cloned()
        .ok_or_else(|| RenderError::NoBackgrounds(dir.to_path_buf()))
}

/// Random start point that leaves `needed + BACKGROUND_PAD` seconds of
/// footage, or 0 when the clip is too short (it is looped instead).
pub fn random_start<R: Rng + ?Sized>(clip_len: f64, needed: f64, rng: &mut R) -> f64 {
    let latest = (clip_len - (needed + BACKGROUND_PAD)).max(0.0);
    if latest > 0.0 {
        rng.gen_range(0.0..latest)
    } else {
        0.0
    }
}

/// Scale to cover `width`x`height` without letterboxing, then center-crop.
pub fn vertical_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1",
        w = width,
        h = height
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pick_background_only_mp4() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("b.MP4"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("c.mp4")).unwrap();

        let listed = list_backgrounds(dir.path()).unwrap();
        assert_eq!(listed.len(), 2);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let pick = pick_background(dir.path(), &mut rng).unwrap();
            assert!(listed.contains(&pick));
        }
    }

    #[test]
    fn test_pick_background_empty_folder() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            pick_background(dir.path(), &mut rng),
            Err(RenderError::NoBackgrounds(_))
        ));
    }

    #[test]
    fn test_random_start_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let start = random_start(60.0, 20.0, &mut rng);
            assert!((0.0..=39.5).contains(&start));
        }
        assert_eq!(random_start(10.0, 20.0, &mut rng), 0.0);
        assert_eq!(random_start(20.5, 20.0, &mut rng), 0.0);
    }

    #[test]
    fn test_vertical_filter() {
        assert_eq!(
            vertical_filter(1080, 1920),
            "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,setsar=1"
        );
    }
}
