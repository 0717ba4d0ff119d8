//! Bilinear resampling of RGBA8888 planes.

/// Resamples a tightly packed `width` x `height` RGBA8888 plane into a
/// `new_width` x `new_height` one.
///
/// Source coordinates use the ratio `(size - 1) / new_size`; the right and
/// bottom neighbours are clamped to the last row and column.
pub fn resize_rgba8_bilinear(
    input: &[u8],
    width: u32,
    height: u32,
    output: &mut [u8],
    new_width: u32,
    new_height: u32,
) -> bool {
    let (w, h) = (width as usize, height as usize);
    let (w2, h2) = (new_width as usize, new_height as usize);
    if w == 0 || h == 0 || w2 == 0 || h2 == 0 {
        return false;
    }
    if input.len() < w * h * 4 || output.len() < w2 * h2 * 4 {
        return false;
    }

    let x_ratio = (w - 1) as f32 / w2 as f32;
    let y_ratio = (h - 1) as f32 / h2 as f32;

    for i in 0..h2 {
        let fy = y_ratio * i as f32;
        let y = fy as usize;
        let dy = fy - y as f32;
        let y1 = (y + 1).min(h - 1);
        for j in 0..w2 {
            let fx = x_ratio * j as f32;
            let x = fx as usize;
            let dx = fx - x as f32;
            let x1 = (x + 1).min(w - 1);

            let a = (y * w + x) * 4;
            let b = (y * w + x1) * 4;
            let c = (y1 * w + x) * 4;
            let d = (y1 * w + x1) * 4;
            let o = (i * w2 + j) * 4;
            for ch in 0..4 {
                let v = f32::from(input[a + ch]) * (1.0 - dx) * (1.0 - dy)
                    + f32::from(input[b + ch]) * dx * (1.0 - dy)
                    + f32::from(input[c + ch]) * (1.0 - dx) * dy
                    + f32::from(input[d + ch]) * dx * dy;
                output[o + ch] = v as u8;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_plane_stays_uniform() {
        let input = [7u8, 8, 9, 10].repeat(9);
        let mut output = vec![0u8; 5 * 4 * 4];
        assert!(resize_rgba8_bilinear(&input, 3, 3, &mut output, 5, 4));
        // truncation may drop the weighted sum by one step
        for px in output.chunks_exact(4) {
            for (v, e) in px.iter().zip([7u8, 8, 9, 10]) {
                assert!(*v == e || *v + 1 == e, "{v} vs {e}");
            }
        }
    }

    #[test]
    fn single_pixel_upscale() {
        let input = [1u8, 2, 3, 4];
        let mut output = [0u8; 16];
        assert!(resize_rgba8_bilinear(&input, 1, 1, &mut output, 2, 2));
        assert_eq!(output.to_vec(), [1u8, 2, 3, 4].repeat(4));
    }
}
