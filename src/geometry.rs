/// Centered crop-and-scale transform mapping an arbitrary source frame onto
/// the fixed portrait output. Computed once per source video; every clip of
/// that source reuses the same rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CenterCrop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub target_width: u32,
    pub target_height: u32,
}

impl CenterCrop {
    /// Crops the source to the target aspect ratio around its center, then
    /// scales to the exact target dimensions. A source wider than the target
    /// loses its sides; a taller (or matching) source loses top and bottom.
    /// The integer floor here can leave the crop a pixel off the exact
    /// ratio; the final scale absorbs that.
    pub fn compute(width: u32, height: u32, target_width: u32, target_height: u32) -> Self {
        let current_ratio = width as f64 / height as f64;
        let target_ratio = target_width as f64 / target_height as f64;

        if current_ratio > target_ratio {
            let new_width = (height as f64 * target_ratio).floor() as u32;
            let x = (width as f64 / 2.0 - new_width as f64 / 2.0).floor() as u32;

            Self {
                x,
                y: 0,
                width: new_width,
                height,
                target_width,
                target_height,
            }
        } else {
            let new_height = (width as f64 / target_ratio).floor() as u32;
            let y = (height as f64 / 2.0 - new_height as f64 / 2.0).floor() as u32;

            Self {
                x: 0,
                y,
                width,
                height: new_height,
                target_width,
                target_height,
            }
        }
    }

    /// The ffmpeg `-vf` expression applying the crop, then the scale.
    pub fn to_filter(&self) -> String {
        format!(
            "crop={}:{}:{}:{},scale={}:{}",
            self.width, self.height, self.x, self.y, self.target_width, self.target_height
        )
    }
}
