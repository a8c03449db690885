use std::time::Duration;

pub struct Config {
    pub target_width: u32,
    pub target_height: u32,
    pub default_clip_duration: f64,
    pub min_clip_duration: f64,
    pub max_source_height: u32,
    pub output_frame_rate: u32,
    pub expire_completed_tasks_after: Duration,
}

// FIXME : these should be options (environment variables?) instead of being hardcoded

pub static CONFIG: Config = Config {
    target_width: 1080,
    target_height: 1920,
    default_clip_duration: 65.0,
    min_clip_duration: 30.0,
    max_source_height: 1080,
    output_frame_rate: 30,
    expire_completed_tasks_after: Duration::from_secs(60 * 60),
};
