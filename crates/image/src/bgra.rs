/// Swap the blue and red channels of a 4-byte-per-pixel buffer (BGRA <-> RGBA).
pub fn swap_red_blue(data: &[u8]) -> Vec<u8> {
    let mut swapped = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(4) {
        swapped.extend_from_slice(&[chunk[2], chunk[1], chunk[0], chunk[3]]);
    }
    swapped
}

/// Map a single-channel float buffer onto 8-bit gray, stretching `[min, max]` to `[0, 255]`.
pub fn r32f_to_gray(data: &[u8]) -> Vec<u8> {
    let values: Vec<f32> = data
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    values
        .iter()
        .map(|&v| {
            if !v.is_finite() || range <= 0.0 {
                0
            } else {
                (((v - min) / range) * 255.0).round() as u8
            }
        })
        .collect()
}
