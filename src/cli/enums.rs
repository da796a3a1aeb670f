//! CLI enum types.

use clap::ValueEnum;

use crate::visuals::VisualKind;

/// What the generation service is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ClipKind {
    #[default]
    Video,
    Image,
}

impl From<ClipKind> for VisualKind {
    fn from(k: ClipKind) -> Self {
        match k {
            ClipKind::Video => VisualKind::Video,
            ClipKind::Image => VisualKind::Image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_kind_conversion() {
        assert_eq!(VisualKind::from(ClipKind::Video), VisualKind::Video);
        assert_eq!(VisualKind::from(ClipKind::Image), VisualKind::Image);
    }

    #[test]
    fn test_clip_kind_value_names() {
        assert_eq!(
            ClipKind::from_str("image", false).unwrap(),
            ClipKind::Image
        );
        assert!(ClipKind::from_str("gif", false).is_err());
    }
}
