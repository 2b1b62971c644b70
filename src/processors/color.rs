//! Color-space conversions used by the segmenter.

use image::{GrayImage, Luma, Rgb, RgbImage};
use palette::{FromColor, IntoColor, Lab, LinSrgb, Srgb};

use super::clahe::Clahe;

/// Converts an 8-bit RGB pixel to HSV in OpenCV 8-bit units.
///
/// Hue is halved to fit a byte (0..=180), saturation and value span 0..=255.
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { delta / max * 255.0 } else { 0.0 };
    let hue_deg = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let hue_deg = if hue_deg < 0.0 { hue_deg + 360.0 } else { hue_deg };

    [
        (hue_deg / 2.0).round().min(180.0) as u8,
        saturation.round() as u8,
        max as u8,
    ]
}

/// Converts an 8-bit RGB pixel to CIE L*a*b* (D65).
pub fn rgb_to_lab(pixel: Rgb<u8>) -> Lab {
    let srgb: Srgb<f32> = Srgb::new(
        f32::from(pixel[0]) / 255.0,
        f32::from(pixel[1]) / 255.0,
        f32::from(pixel[2]) / 255.0,
    );
    let lin: LinSrgb<f32> = srgb.into_linear();
    Lab::from_color(lin)
}

/// Converts CIE L*a*b* back to 8-bit RGB, clipping out-of-gamut values.
pub fn lab_to_rgb(lab: Lab) -> Rgb<u8> {
    let lin: LinSrgb<f32> = lab.into_color();
    let srgb: Srgb<f32> = Srgb::from_linear(lin);
    let to_u8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb([to_u8(srgb.red), to_u8(srgb.green), to_u8(srgb.blue)])
}

/// Equalizes the L* channel of `image` with CLAHE and converts back to RGB.
///
/// Chroma (a*, b*) is left untouched, so hue survives while uneven
/// lighting across the panel is flattened.
pub fn normalize_illumination(image: &RgbImage, clahe: &Clahe) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut labs = Vec::with_capacity((width as usize) * (height as usize));
    let mut lightness = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lab = rgb_to_lab(*pixel);
        let l = (lab.l * 2.55).round().clamp(0.0, 255.0) as u8;
        lightness.put_pixel(x, y, Luma([l]));
        labs.push(lab);
    }

    let equalized = clahe.apply(&lightness);

    let mut out = RgbImage::new(width, height);
    for ((x, y, pixel), lab) in out.enumerate_pixels_mut().zip(labs) {
        let l = f32::from(equalized.get_pixel(x, y)[0]) / 2.55;
        *pixel = lab_to_rgb(Lab::new(l, lab.a, lab.b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(rgb_to_hsv(Rgb([255, 0, 0])), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(Rgb([0, 255, 0])), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 255])), [120, 255, 255]);
    }

    #[test]
    fn test_hsv_grays_have_no_saturation() {
        assert_eq!(rgb_to_hsv(Rgb([255, 255, 255])), [0, 0, 255]);
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 0])), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(Rgb([128, 128, 128])), [0, 0, 128]);
    }

    #[test]
    fn test_hsv_magenta_red_wraps_high() {
        let [h, _, _] = rgb_to_hsv(Rgb([255, 0, 20]));
        assert!(h >= 170, "hue {} should sit near the top of the range", h);
    }

    #[test]
    fn test_lab_round_trip() {
        for rgb in [Rgb([12u8, 200, 90]), Rgb([255, 255, 255]), Rgb([40, 40, 40])] {
            let back = lab_to_rgb(rgb_to_lab(rgb));
            for c in 0..3 {
                assert!((i32::from(back[c]) - i32::from(rgb[c])).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_white_lightness_is_full_scale() {
        let lab = rgb_to_lab(Rgb([255, 255, 255]));
        assert!((lab.l - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_normalize_illumination_keeps_shape() {
        let img = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 90]));
        let out = normalize_illumination(&img, &Clahe::new(2.0, 4));
        assert_eq!(out.dimensions(), (40, 30));
    }
}
