//! Drawing of the platformer field.
//!
//! `render` only reads the world and paints it back to front onto a
//! `Surface`. The terminal surface is a grid of half-block pixels, two per
//! cell, scaled from the logical field size.

use ratatui::{
    buffer::Buffer,
    layout::Rect as Area,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Widget},
};

use super::physics::{Rect, World};

pub const SKY: Color = Color::Rgb(135, 206, 235);
pub const PLATFORM: Color = Color::Rgb(139, 69, 19);
pub const PLAYER: Color = Color::Red;

const HALF_BLOCK: &str = "▀";

pub trait Surface {
    fn fill_rect(&mut self, rect: &Rect, color: Color);
}

/// Paint one frame: background, platforms, then the player on top.
pub fn render<S: Surface>(world: &World, surface: &mut S) {
    surface.fill_rect(&world.field(), SKY);
    for platform in &world.platforms {
        surface.fill_rect(platform, PLATFORM);
    }
    surface.fill_rect(&world.player.body, PLAYER);
}

/// Pixel grid mapped onto the logical field. A pixel is painted when its
/// centre lies inside the rectangle.
#[derive(Debug, Clone)]
pub struct PixelCanvas {
    width: usize,
    height: usize,
    scale_x: f32,
    scale_y: f32,
    pixels: Vec<Color>,
}

impl PixelCanvas {
    pub fn new(width: usize, height: usize, field: &Rect) -> Self {
        let scale_x = if width > 0 { field.width / width as f32 } else { 1.0 };
        let scale_y = if height > 0 { field.height / height as f32 } else { 1.0 };
        Self {
            width,
            height,
            scale_x,
            scale_y,
            pixels: vec![Color::Reset; width * height],
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    // Index range of the pixels whose centres fall in [start, end)
    fn span(start: f32, end: f32, scale: f32, limit: usize) -> (usize, usize) {
        let first = (start / scale - 0.5).ceil().max(0.0) as usize;
        let last = (end / scale - 0.5).ceil().max(0.0) as usize;
        (first.min(limit), last.min(limit))
    }

    /// Copy the pixels into `area`, two rows of pixels per cell.
    pub fn blit(&self, area: Area, buf: &mut Buffer) {
        for row in 0..area.height as usize {
            for column in 0..area.width as usize {
                let top = self.pixel(column, row * 2).unwrap_or(Color::Reset);
                let bottom = self.pixel(column, row * 2 + 1).unwrap_or(Color::Reset);
                let position = (area.x + column as u16, area.y + row as u16);
                if let Some(cell) = buf.cell_mut(position) {
                    cell.set_symbol(HALF_BLOCK)
                        .set_style(Style::new().fg(top).bg(bottom));
                }
            }
        }
    }
}

impl Surface for PixelCanvas {
    fn fill_rect(&mut self, rect: &Rect, color: Color) {
        let (x0, x1) = Self::span(rect.x, rect.right(), self.scale_x, self.width);
        let (y0, y1) = Self::span(rect.y, rect.bottom(), self.scale_y, self.height);
        if x0 >= x1 {
            return;
        }
        for y in y0..y1 {
            self.pixels[y * self.width + x0..y * self.width + x1].fill(color);
        }
    }
}

/// The field inside a bordered frame with a controls hint.
pub struct FieldView<'a> {
    world: &'a World,
    hint: &'a str,
}

impl<'a> FieldView<'a> {
    pub fn new(world: &'a World, hint: &'a str) -> Self {
        Self { world, hint }
    }
}

impl Widget for FieldView<'_> {
    fn render(self, area: Area, buf: &mut Buffer) {
        let block = Block::bordered()
            .title(Line::from(" Platformer ").centered())
            .title_bottom(Line::from(format!(" {} ", self.hint)).centered());
        let inner = block.inner(area);
        block.render(area, buf);

        let mut canvas = PixelCanvas::new(
            inner.width as usize,
            inner.height as usize * 2,
            &self.world.field(),
        );
        render(self.world, &mut canvas);
        canvas.blit(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platformer::physics::PhysicsConfig;

    #[derive(Default)]
    struct RecordingSurface {
        calls: Vec<(Rect, Color)>,
    }

    impl Surface for RecordingSurface {
        fn fill_rect(&mut self, rect: &Rect, color: Color) {
            self.calls.push((*rect, color));
        }
    }

    #[test]
    fn draws_back_to_front() {
        let world = World::new(PhysicsConfig::default());
        let mut surface = RecordingSurface::default();
        render(&world, &mut surface);

        let colors: Vec<Color> = surface.calls.iter().map(|(_, c)| *c).collect();
        assert_eq!(colors, vec![SKY, PLATFORM, PLATFORM, PLATFORM, PLAYER]);
        assert_eq!(surface.calls[0].0, Rect::new(0.0, 0.0, 800.0, 400.0));
        assert_eq!(surface.calls[4].0, world.player.body);
    }

    #[test]
    fn render_does_not_touch_the_world() {
        let world = World::new(PhysicsConfig::default());
        let before = world.player.clone();
        render(&world, &mut RecordingSurface::default());
        assert_eq!(world.player, before);
    }

    #[test]
    fn canvas_scales_field_to_pixels() {
        let world = World::new(PhysicsConfig::default());
        // 10 logical units per pixel on both axes
        let mut canvas = PixelCanvas::new(80, 40, &world.field());
        render(&world, &mut canvas);

        assert_eq!(canvas.pixel(0, 0), Some(SKY));
        // Player covers x 50..82, y 200..232
        assert_eq!(canvas.pixel(5, 20), Some(PLAYER));
        assert_eq!(canvas.pixel(7, 22), Some(PLAYER));
        assert_eq!(canvas.pixel(8, 22), Some(SKY));
        // Ground from y 350
        assert_eq!(canvas.pixel(40, 35), Some(PLATFORM));
        assert_eq!(canvas.pixel(40, 34), Some(SKY));
        assert_eq!(canvas.pixel(80, 0), None);
    }

    #[test]
    fn widget_fills_inner_area_with_half_blocks() {
        let world = World::new(PhysicsConfig::default());
        let area = Area::new(0, 0, 82, 22);
        let mut buf = Buffer::empty(area);
        FieldView::new(&world, "q quit").render(area, &mut buf);

        let cell = &buf[(1, 1)];
        assert_eq!(cell.symbol(), HALF_BLOCK);
        assert_eq!(cell.fg, SKY);
        assert_eq!(cell.bg, SKY);

        // Inner row 10 holds pixel rows 20 and 21, both covered by the player
        let player = &buf[(1 + 6, 1 + 10)];
        assert_eq!(player.fg, PLAYER);
        assert_eq!(player.bg, PLAYER);
    }
}
