//! Cover-fit texture coordinates for the ingestion pass.

/// Texture-space window to sample from the video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexRange {
    pub u0: f32,
    pub u1: f32,
    pub v0: f32,
    pub v1: f32,
}

impl TexRange {
    pub const FULL: TexRange = TexRange {
        u0: 0.0,
        u1: 1.0,
        v0: 0.0,
        v1: 1.0,
    };
}

/// Computes the sample window that fills the canvas with the video without
/// stretching, cropping whichever axis is comparatively too long.
///
/// Degenerate sizes fall back to the full texture.
pub fn cover_tex_range(video: (u32, u32), canvas: (u32, u32)) -> TexRange {
    let (vw, vh) = video;
    let (cw, ch) = canvas;
    if vw == 0 || vh == 0 || cw == 0 || ch == 0 {
        return TexRange::FULL;
    }

    let video_aspect = vw as f32 / vh as f32;
    let canvas_aspect = cw as f32 / ch as f32;

    if video_aspect < canvas_aspect {
        let crop = (1.0 - video_aspect / canvas_aspect) / 2.0;
        TexRange {
            v0: crop,
            v1: 1.0 - crop,
            ..TexRange::FULL
        }
    } else {
        let crop = (1.0 - canvas_aspect / video_aspect) / 2.0;
        TexRange {
            u0: crop,
            u1: 1.0 - crop,
            ..TexRange::FULL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_video_on_square_canvas_crops_horizontally() {
        let range = cover_tex_range((1920, 1080), (800, 800));
        let expected = (1.0 - 1.0 / (1920.0 / 1080.0)) / 2.0;
        assert!((range.u0 - expected).abs() < 1e-6);
        // 0.21875 is exact for 16:9. Rounding the aspect to 1.78 first would
        // give about 0.2191, which this tolerance rejects.
        assert!((range.u0 - 0.21875).abs() < 1e-4);
        assert!((range.u1 - (1.0 - expected)).abs() < 1e-6);
        assert_eq!((range.v0, range.v1), (0.0, 1.0));
    }

    #[test]
    fn tall_video_on_wide_canvas_crops_vertically() {
        let range = cover_tex_range((720, 1280), (1280, 720));
        assert_eq!((range.u0, range.u1), (0.0, 1.0));
        assert!(range.v0 > 0.0);
        assert!((range.v0 + range.v1 - 1.0).abs() < 1e-6);
        let visible = range.v1 - range.v0;
        let video_aspect = 720.0 / 1280.0;
        let canvas_aspect = 1280.0 / 720.0;
        assert!((visible - video_aspect / canvas_aspect).abs() < 1e-5);
    }

    #[test]
    fn matching_aspect_samples_everything() {
        assert_eq!(cover_tex_range((1280, 720), (640, 360)), TexRange::FULL);
    }

    #[test]
    fn zero_sized_inputs_fall_back_to_full_range() {
        assert_eq!(cover_tex_range((0, 0), (800, 600)), TexRange::FULL);
        assert_eq!(cover_tex_range((640, 480), (0, 600)), TexRange::FULL);
    }
}
