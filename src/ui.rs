// src/ui.rs - Theme and the video display widget
use eframe::egui::{self, Color32, Pos2, Rect, Vec2};
use image::RgbImage;

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub surface: Color32,
    pub warning: Color32,
    pub success: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(70, 130, 240),
            surface: Color32::from_rgb(30, 30, 35),
            warning: Color32::from_rgb(255, 152, 0),
            success: Color32::from_rgb(76, 175, 80),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

pub fn create_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.widgets.noninteractive.bg_fill = Color32::from_rgb(30, 30, 35);
    visuals.widgets.inactive.bg_fill = Color32::from_rgb(45, 45, 52);
    visuals.widgets.hovered.bg_fill = Color32::from_rgb(55, 55, 65);
    visuals.widgets.active.bg_fill = Color32::from_rgb(70, 130, 240);

    visuals.window_rounding = egui::Rounding::same(12.0);
    visuals.menu_rounding = egui::Rounding::same(8.0);

    visuals
}

/// Shows the latest processed frame, letterboxed into the available space.
pub struct VideoWidget {
    texture: Option<egui::TextureHandle>,
    aspect_ratio: f32,
}

impl VideoWidget {
    pub fn new() -> Self {
        Self {
            texture: None,
            aspect_ratio: 4.0 / 3.0,
        }
    }

    pub fn update_frame(&mut self, ctx: &egui::Context, frame: &RgbImage) {
        let size = [frame.width() as usize, frame.height() as usize];
        let color_image = egui::ColorImage::from_rgb(size, frame.as_raw());

        match self.texture.as_mut() {
            Some(texture) => texture.set(color_image, egui::TextureOptions::default()),
            None => {
                self.texture = Some(ctx.load_texture(
                    "video_frame",
                    color_image,
                    egui::TextureOptions::default(),
                ));
            }
        }

        if frame.height() > 0 {
            self.aspect_ratio = frame.width() as f32 / frame.height() as f32;
        }
    }

    pub fn show(&self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        let size = fit_size(available, self.aspect_ratio);
        let (outer, _response) = ui.allocate_exact_size(available, egui::Sense::hover());
        let rect = Rect::from_center_size(outer.center(), size);

        if let Some(texture) = &self.texture {
            ui.painter().image(
                texture.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        } else {
            ui.painter().rect_filled(rect, egui::Rounding::same(4.0), Color32::from_rgb(50, 50, 55));
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "No Video Signal",
                egui::FontId::proportional(16.0),
                Color32::from_rgb(150, 150, 155),
            );
        }
    }
}

/// Largest size with `aspect_ratio` that fits inside `available`.
fn fit_size(available: Vec2, aspect_ratio: f32) -> Vec2 {
    let width = available.x.min(available.y * aspect_ratio).max(0.0);
    Vec2::new(width, width / aspect_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_size_respects_both_bounds() {
        let wide = fit_size(Vec2::new(1000.0, 300.0), 4.0 / 3.0);
        assert_eq!(wide, Vec2::new(400.0, 300.0));

        let tall = fit_size(Vec2::new(640.0, 2000.0), 16.0 / 9.0);
        assert_eq!(tall, Vec2::new(640.0, 360.0));
    }
}
