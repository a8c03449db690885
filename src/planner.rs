/// One planned output clip, as a time range into the source video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Splits `total_duration` into consecutive `clip_duration`-second windows.
/// The final window is shortened to the end of the video, and dropped
/// entirely when it comes out under `min_duration` — nobody wants a
/// five-second clip.
pub fn plan(total_duration: f64, clip_duration: f64, min_duration: f64) -> Vec<Segment> {
    if total_duration <= 0.0 || clip_duration <= 0.0 {
        return vec![];
    }

    let count = (total_duration / clip_duration).ceil() as usize;

    (0..count)
        .map(|index| Segment {
            index,
            start: index as f64 * clip_duration,
            end: ((index + 1) as f64 * clip_duration).min(total_duration),
        })
        .filter(|segment| segment.duration() >= min_duration)
        .collect()
}
