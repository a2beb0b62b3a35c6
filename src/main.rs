// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 主窗口与控制面板 (main window & control panel)

use clap::Parser;
use egui_macroquad::egui;
use image::RgbImage;
use macroquad::prelude::*;
use std::time::{Duration, Instant};

use yolo_player::config::Args;
use yolo_player::model::{ModelKind, ModelSize};
use yolo_player::player::Player;
use yolo_player::render::Surface;

/// Display canvas backed by a macroquad texture. Rebuilds only when the
/// frame size changes, otherwise updates pixels in place.
struct TextureSurface {
    texture: Option<Texture2D>,
}

impl TextureSurface {
    fn new() -> Self {
        Self { texture: None }
    }

    fn draw(&self) {
        let Some(texture) = &self.texture else {
            return;
        };
        // 居中缩放显示
        let scale = (screen_width() / texture.width()).min(screen_height() / texture.height());
        let (w, h) = (texture.width() * scale, texture.height() * scale);
        let x = (screen_width() - w) / 2.0;
        let y = (screen_height() - h) / 2.0;
        draw_texture_ex(
            texture,
            x,
            y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(w, h)),
                ..Default::default()
            },
        );
    }
}

impl Surface for TextureSurface {
    fn present(&mut self, img: &RgbImage) {
        let mut rgba = Vec::with_capacity(img.as_raw().len() / 3 * 4);
        for px in img.as_raw().chunks_exact(3) {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }

        let needs_rebuild = match &self.texture {
            Some(tex) => {
                tex.width() != img.width() as f32 || tex.height() != img.height() as f32
            }
            None => true,
        };
        if needs_rebuild {
            let texture = Texture2D::from_rgba8(img.width() as u16, img.height() as u16, &rgba);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            tex.update(&Image {
                bytes: rgba,
                width: img.width() as u16,
                height: img.height() as u16,
            });
        }
    }
}

fn window_conf() -> Conf {
    Conf {
        window_title: "YOLOv8 Player".to_string(),
        window_width: 1100,
        window_height: 700,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut player = Player::new(args.model_dir.clone(), args.thresholds());
    // 默认模型
    let mut sel_kind = ModelKind::Detect;
    let mut sel_size = ModelSize::N;
    player.change_model(sel_kind, sel_size);

    if let Some(video) = &args.video {
        player.open_video(video);
    }

    let mut surface = TextureSurface::new();
    let delay = Duration::from_millis(args.delay_ms);
    let mut last_tick = Instant::now();

    loop {
        // 定时取帧
        if player.is_running() && last_tick.elapsed() >= delay {
            player.tick(&mut surface);
            last_tick = Instant::now();
        }

        clear_background(BLACK);
        surface.draw();

        egui_macroquad::ui(|egui_ctx| {
            egui::Window::new("控制面板")
                .default_pos(egui::pos2(10.0, 10.0))
                .resizable(false)
                .show(egui_ctx, |ui| {
                    // --- 输入源 ---
                    egui::CollapsingHeader::new("🎥 输入源")
                        .default_open(true)
                        .show(ui, |ui| {
                            ui.horizontal(|ui| {
                                if ui.button("打开摄像头").clicked() {
                                    player.open_camera(args.camera);
                                }
                                if ui.button("打开视频...").clicked() {
                                    let picked = rfd::FileDialog::new()
                                        .add_filter("video", &["mp4", "avi", "mkv", "mov"])
                                        .pick_file();
                                    // 取消选择时不改变当前输入源
                                    if let Some(path) = picked {
                                        player.open_video(&path);
                                    }
                                }
                            });
                        });

                    ui.separator();

                    // --- 模型选择 ---
                    egui::CollapsingHeader::new("⚙️ 模型")
                        .default_open(true)
                        .show(ui, |ui| {
                            let mut changed = false;
                            ui.horizontal(|ui| {
                                changed |= ui
                                    .radio_value(&mut sel_kind, ModelKind::Detect, "检测")
                                    .changed();
                                changed |= ui
                                    .radio_value(&mut sel_kind, ModelKind::Segment, "分割")
                                    .changed();
                                changed |= ui
                                    .radio_value(&mut sel_kind, ModelKind::Pose, "姿态")
                                    .changed();
                            });
                            ui.horizontal(|ui| {
                                for size in [
                                    ModelSize::N,
                                    ModelSize::S,
                                    ModelSize::M,
                                    ModelSize::L,
                                    ModelSize::X,
                                ] {
                                    changed |= ui
                                        .radio_value(
                                            &mut sel_size,
                                            size,
                                            size.letter().to_string(),
                                        )
                                        .changed();
                                }
                            });
                            if changed {
                                player.change_model(sel_kind, sel_size);
                            }

                            let mut detecting = player.detecting;
                            if ui.checkbox(&mut detecting, "启用检测").changed() {
                                player.toggle_detection();
                            }
                            ui.checkbox(&mut player.show_box, "显示边框");
                            ui.checkbox(&mut player.show_mask, "显示掩码");
                            if !player.has_model() {
                                ui.small("未加载模型");
                            }
                        });

                    ui.separator();

                    // --- 播放控制 ---
                    egui::CollapsingHeader::new("▶ 播放")
                        .default_open(true)
                        .show(ui, |ui| {
                            ui.horizontal(|ui| {
                                if player.is_running() {
                                    if ui.button("暂停").clicked() {
                                        player.pause();
                                    }
                                } else if ui.button("播放").clicked() {
                                    player.play();
                                }
                                if ui.button("重播").clicked() {
                                    player.replay();
                                }
                            });

                            // 进度条 (仅视频文件)
                            let total = player.total_frames();
                            if player.is_open() && !player.is_camera() && total > 0 {
                                let mut pos = player.position().min(total);
                                if ui
                                    .add(
                                        egui::Slider::new(&mut pos, 0..=total)
                                            .text("帧"),
                                    )
                                    .changed()
                                {
                                    player.seek(pos, &mut surface);
                                }
                            }
                        });
                });
        });

        egui_macroquad::draw();
        next_frame().await
    }
}
