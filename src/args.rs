use std::path::PathBuf;

pub struct Args {
    pub path: PathBuf,
    pub config: Option<PathBuf>,
    pub scene_scale: Option<f32>,
    pub frames_per_second: f32,
    pub archive_entry: Option<String>,
}

impl Args {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: None,
            scene_scale: None,
            frames_per_second: 30.0,
            archive_entry: None,
        }
    }
}
