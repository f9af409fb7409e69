//! Where a run writes its files

use std::path::{Path, PathBuf};

/// Checkpoint, image and log locations for one run
///
/// ```text
/// {checkpoint_dir}/{model_filename}.safetensors
/// {output_root}/{model_name}/{model_filename}/result_{batch}_x{scale}_{hr|t_sr|s_sr}.png
/// {output_root}/{model_name}/{model_filename}/{id}_x{scale}_w{width}_SR.png
/// {log_root}/{model_filename}/scalars.json
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    checkpoint_dir: PathBuf,
    model_name: String,
    model_filename: String,
    output_root: PathBuf,
    log_root: PathBuf,
}

impl OutputLayout {
    /// Layout with `./output` and `./log` roots
    pub fn new(
        checkpoint_dir: impl Into<PathBuf>,
        model_name: impl Into<String>,
        model_filename: impl Into<String>,
    ) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            model_name: model_name.into(),
            model_filename: model_filename.into(),
            output_root: PathBuf::from("output"),
            log_root: PathBuf::from("log"),
        }
    }

    /// Move image output and logs under other roots
    pub fn with_roots(
        mut self,
        output_root: impl Into<PathBuf>,
        log_root: impl Into<PathBuf>,
    ) -> Self {
        self.output_root = output_root.into();
        self.log_root = log_root.into();
        self
    }

    /// The single retained checkpoint
    pub fn checkpoint(&self) -> PathBuf {
        self.checkpoint_dir
            .join(format!("{}.safetensors", self.model_filename))
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Directory for snapshots and evaluation images
    pub fn output_dir(&self) -> PathBuf {
        self.output_root
            .join(&self.model_name)
            .join(&self.model_filename)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_root.join(&self.model_filename)
    }

    /// JSON file the scalar log flushes to
    pub fn scalars_file(&self) -> PathBuf {
        self.log_dir().join("scalars.json")
    }

    /// Debug snapshot written every `print_every` batches
    pub fn snapshot(&self, batch: usize, scale: usize, kind: &str) -> PathBuf {
        self.output_dir()
            .join(format!("result_{batch}_x{scale}_{kind}.png"))
    }
}

/// File name of a saved evaluation output
pub fn sr_image_name(id: &str, scale: usize, width_mult: f32) -> String {
    format!("{id}_x{scale}_w{width_mult}_SR.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let layout = OutputLayout::new("ckpt", "slim_mixer", "x4_w05").with_roots("out", "logs");
        assert_eq!(layout.checkpoint(), PathBuf::from("ckpt/x4_w05.safetensors"));
        assert_eq!(layout.output_dir(), PathBuf::from("out/slim_mixer/x4_w05"));
        assert_eq!(layout.scalars_file(), PathBuf::from("logs/x4_w05/scalars.json"));
        assert_eq!(
            layout.snapshot(100, 4, "t_sr"),
            PathBuf::from("out/slim_mixer/x4_w05/result_100_x4_t_sr.png")
        );
    }

    #[test]
    fn test_default_roots() {
        let layout = OutputLayout::new("ckpt", "m", "f");
        assert_eq!(layout.output_dir(), PathBuf::from("output/m/f"));
        assert_eq!(layout.log_dir(), PathBuf::from("log/f"));
    }

    #[test]
    fn test_sr_image_name() {
        assert_eq!(sr_image_name("baby", 4, 0.25), "baby_x4_w0.25_SR.png");
    }
}
