//! Resolution descriptors
//!
//! Field dimensions are derived from a target resolution and the surface
//! aspect ratio: the target drives the shorter axis and the longer physical
//! axis gets scaled up so field texels stay square on screen.

/// Derived width/height for a simulation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Compute the descriptor for a target resolution on a surface of the
    /// given pixel size.
    pub fn derive(target: u32, surface_width: u32, surface_height: u32) -> Self {
        let mut aspect = surface_width.max(1) as f32 / surface_height.max(1) as f32;
        if aspect < 1.0 {
            aspect = 1.0 / aspect;
        }

        let min = target;
        let max = (target as f32 * aspect).round() as u32;

        if surface_width > surface_height {
            Resolution {
                width: max,
                height: min,
            }
        } else {
            Resolution {
                width: min,
                height: max,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_surface_keeps_target_on_both_axes() {
        let res = Resolution::derive(128, 256, 256);
        assert_eq!(res, Resolution { width: 128, height: 128 });
    }

    #[test]
    fn landscape_surface_widens_width() {
        let res = Resolution::derive(128, 1920, 1080);
        assert_eq!(res.height, 128);
        assert_eq!(res.width, (128.0_f32 * (1920.0 / 1080.0)).round() as u32);
        assert!(res.width > res.height);
    }

    #[test]
    fn portrait_surface_widens_height() {
        let res = Resolution::derive(128, 1080, 1920);
        assert_eq!(res.width, 128);
        assert!(res.height > res.width);
    }

    #[test]
    fn aspect_is_symmetric_under_rotation() {
        let landscape = Resolution::derive(64, 800, 600);
        let portrait = Resolution::derive(64, 600, 800);
        assert_eq!(landscape.width, portrait.height);
        assert_eq!(landscape.height, portrait.width);
    }
}
