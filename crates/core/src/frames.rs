//! View-angle math for multi-frame (turntable) previews.

/// Angle in whole degrees for frame `index` of `count`.
///
/// Frame *i* of *n* sits at `i * 360 / n`, floored. `count` of zero is
/// treated as one frame.
pub fn frame_angle(index: u32, count: u32) -> u32 {
    let count = u64::from(count.max(1));
    (u64::from(index) * 360 / count) as u32
}

/// Decorate the base prompt with the view angle for one frame.
pub fn frame_prompt(base_prompt: &str, index: u32, count: u32) -> String {
    let angle = frame_angle(index, count);
    format!(
        "{base_prompt}. Camera view rotated {angle} degrees around the piece (frame {} of {count}), \
         identical lighting and background across frames.",
        index + 1
    )
}
