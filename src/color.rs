//! Splat color generation
//!
//! Produces bounded-hue random colors weighted into the cyan/blue/purple
//! range so injected dye stays within the electric-blue palette.

use rand::Rng;

/// Convert HSV (all components in [0,1]) to RGB.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    match (i as i32).rem_euclid(6) {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

/// Generate a random splat color.
///
/// Hue falls into three disjoint bands: 60% cyan-to-blue, 25% blue-to-purple,
/// 15% deep cyan. Saturation and value are kept high so splats read clearly
/// against the dark background.
pub fn generate_color<R: Rng>(rng: &mut R) -> [f32; 3] {
    let band: f32 = rng.gen();
    let hue = if band < 0.6 {
        // Pure blue to cyan range (180 - 240 degrees)
        0.5 + rng.gen::<f32>() * 0.17
    } else if band < 0.85 {
        // Electric blue to purple (240 - 270 degrees)
        0.67 + rng.gen::<f32>() * 0.08
    } else {
        // Deep cyan (160 - 180 degrees)
        0.44 + rng.gen::<f32>() * 0.06
    };

    let saturation = 0.8 + rng.gen::<f32>() * 0.2;
    let value = 0.7 + rng.gen::<f32>() * 0.3;

    hsv_to_rgb(hue, saturation, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_primaries_convert_exactly() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [1.0, 0.0, 0.0]);
        let green = hsv_to_rgb(1.0 / 3.0, 1.0, 1.0);
        assert!(green[1] > 0.99 && green[0] < 0.01 && green[2] < 0.01);
        let blue = hsv_to_rgb(2.0 / 3.0, 1.0, 1.0);
        assert!(blue[2] > 0.99 && blue[0] < 0.01 && blue[1] < 0.01);
    }

    #[test]
    fn components_stay_in_unit_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let [r, g, b] = generate_color(&mut rng);
            assert!((0.0..=1.0).contains(&r));
            assert!((0.0..=1.0).contains(&g));
            assert!((0.0..=1.0).contains(&b));
        }
    }

    #[test]
    fn hue_bands_follow_weighting() {
        // Recover the hue from RGB and bucket it. Over 10k samples the
        // 60/25/15 weighting should hold within sampling tolerance.
        let mut rng = rand::thread_rng();
        let samples = 10_000;
        let mut cyan_blue = 0;
        let mut blue_purple = 0;
        let mut deep_cyan = 0;

        for _ in 0..samples {
            let [r, g, b] = generate_color(&mut rng);
            let max = r.max(g).max(b);
            let min = r.min(g).min(b);
            let delta = max - min;
            assert!(delta > 0.0, "saturation floor keeps colors chromatic");
            let hue = if max == r {
                (((g - b) / delta).rem_euclid(6.0)) / 6.0
            } else if max == g {
                ((b - r) / delta + 2.0) / 6.0
            } else {
                ((r - g) / delta + 4.0) / 6.0
            };

            if (0.5..0.67).contains(&hue) {
                cyan_blue += 1;
            } else if (0.67..=0.76).contains(&hue) {
                blue_purple += 1;
            } else if (0.43..0.5).contains(&hue) {
                deep_cyan += 1;
            } else {
                panic!("hue {} outside expected bands", hue);
            }
        }

        let frac = |n: i32| n as f32 / samples as f32;
        assert!((frac(cyan_blue) - 0.60).abs() < 0.05);
        assert!((frac(blue_purple) - 0.25).abs() < 0.05);
        assert!((frac(deep_cyan) - 0.15).abs() < 0.05);
    }
}
