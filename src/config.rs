// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::Parser;
use std::path::PathBuf;

use crate::model::Thresholds;

/// YOLOv8 视频检测演示 (video detection demo)
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLOv8 camera/video viewer", long_about = None)]
pub struct Args {
    /// 模型目录 (yolov8{n,s,m,l,x}[-seg|-pose].onnx)
    #[arg(long, default_value = "models")]
    pub model_dir: PathBuf,

    /// 摄像头序号
    #[arg(long, default_value_t = 0)]
    pub camera: i32,

    /// 播放间隔(毫秒)
    #[arg(long, default_value_t = 30)]
    pub delay_ms: u64,

    /// 置信度阈值
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// NMS IoU阈值
    #[arg(long, default_value_t = 0.7)]
    pub iou: f32,

    /// 关键点置信度阈值
    #[arg(long, default_value_t = 0.55)]
    pub kconf: f32,

    /// 启动时打开的视频文件
    #[arg(long)]
    pub video: Option<PathBuf>,
}

impl Args {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            conf: self.conf,
            iou: self.iou,
            kconf: self.kconf,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_settings() {
        let args = Args::parse_from(["yolo-player"]);
        assert_eq!(args.model_dir, PathBuf::from("models"));
        assert_eq!(args.camera, 0);
        assert_eq!(args.delay_ms, 30);
        let t = args.thresholds();
        assert_eq!(t.conf, 0.25);
        assert_eq!(t.iou, 0.7);
        assert_eq!(t.kconf, 0.55);
        assert!(args.video.is_none());
    }
}
