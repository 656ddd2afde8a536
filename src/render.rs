use crate::config::Rgb;
use crate::scene::{Container, Dot, Node, Sprite, WORLD_HEIGHT, WORLD_WIDTH};
use noise::{NoiseFn, Perlin};
use std::io::Write;

/// Draws the scene as truecolor half-block characters, two pixels per cell.
pub struct Renderer {
    width: usize,
    height: usize,
    bg_color: Rgb,
    glow_buffer: Vec<(f32, Rgb)>,
    twinkle: Perlin,
    output_buf: Vec<u8>,
}

impl Renderer {
    pub fn new(cols: u16, rows: u16, bg_color: Rgb) -> Self {
        let width = cols as usize;
        let height = rows as usize * 2;
        Self {
            width,
            height,
            bg_color,
            glow_buffer: vec![(0.0, bg_color); width * height],
            twinkle: Perlin::new(fastrand::u32(0..1000)),
            output_buf: Vec::with_capacity(width * height * 25),
        }
    }

    /// Maps a world position (origin at the centre) to a pixel.
    fn to_pixel(&self, x: f64, y: f64) -> (i32, i32) {
        let px = (x / WORLD_WIDTH + 0.5) * self.width as f64;
        let py = (y / WORLD_HEIGHT + 0.5) * self.height as f64;
        (px.floor() as i32, py.floor() as i32)
    }

    fn plot(&mut self, x: i32, y: i32, intensity: f32, color: Rgb) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        if intensity > self.glow_buffer[idx].0 {
            self.glow_buffer[idx] = (intensity, color);
        }
    }

    fn draw_dot(&mut self, dot: &Dot, time: f64) {
        let (x, y) = self.to_pixel(dot.x as f64, dot.y as f64);
        let shimmer = self.twinkle.get([dot.x as f64 * 0.05, dot.y as f64 * 0.05, time * 4.0]) as f32;
        let intensity = dot.alpha * 2.0 * (0.8 + shimmer * 0.2);
        self.plot(x, y, intensity, dot.color);

        // Bigger particles bleed into their neighbours
        if dot.scale > 0.45 {
            let glow = intensity * 0.35;
            for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                self.plot(x + dx, y + dy, glow, dot.color);
            }
        }
    }

    fn draw_sprite(&mut self, sprite: &Sprite) {
        if !sprite.visible || sprite.alpha <= 0.0 {
            return;
        }
        let (x, y) = self.to_pixel(sprite.x, sprite.y);
        let alpha = sprite.alpha as f32;
        let radius = 1 + (sprite.blur * 2.0).round() as i32;

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let distance = ((dx * dx + dy * dy) as f32).sqrt();
                if distance > radius as f32 {
                    continue;
                }
                let intensity = if distance < 1.0 {
                    alpha * 2.5
                } else {
                    alpha * 0.8 * (1.0 - distance / (radius as f32 + 1.0))
                };
                self.plot(x + dx, y + dy, intensity, sprite.tint);
            }
        }
    }

    fn blend(&self, intensity: f32, color: Rgb) -> Rgb {
        let bg = self.bg_color;
        if intensity <= 0.05 {
            return bg;
        }
        let blend = (intensity / 3.0).min(1.0);
        (
            (bg.0 as f32 * (1.0 - blend) + color.0 as f32 * blend) as u8,
            (bg.1 as f32 * (1.0 - blend) + color.1 as f32 * blend) as u8,
            (bg.2 as f32 * (1.0 - blend) + color.2 as f32 * blend) as u8,
        )
    }

    /// Draws one frame; `overlay` is printed in the top-left corner.
    pub fn render(
        &mut self,
        container: &Container,
        time_secs: f64,
        overlay: Option<&str>,
        out: &mut impl Write,
    ) -> std::io::Result<()> {
        let bg = self.bg_color;
        self.glow_buffer.fill((0.0, bg));

        let (dots, sprites) = container.with_scene(|scene| {
            let mut dots = Vec::new();
            let mut sprites = Vec::new();
            for node in scene.draw_order() {
                match node {
                    Node::Layer { dots: layer, .. } => dots.extend_from_slice(layer),
                    Node::Sprite(sprite) => sprites.push(*sprite),
                }
            }
            (dots, sprites)
        });
        for dot in &dots {
            self.draw_dot(dot, time_secs);
        }
        // Rocket bodies always sit on top of the sparks
        for sprite in &sprites {
            self.draw_sprite(sprite);
        }

        self.output_buf.clear();
        self.output_buf.extend_from_slice(b"\x1b[H");

        let mut prev_top: Rgb = (255, 255, 255);
        let mut prev_bot: Rgb = (255, 255, 255);

        for y in (0..self.height).step_by(2) {
            for x in 0..self.width {
                let top_idx = y * self.width + x;
                let bot_idx = if y + 1 < self.height {
                    (y + 1) * self.width + x
                } else {
                    top_idx
                };

                let (top_intensity, top_base) = self.glow_buffer[top_idx];
                let (bot_intensity, bot_base) = self.glow_buffer[bot_idx];
                let top = self.blend(top_intensity, top_base);
                let bot = self.blend(bot_intensity, bot_base);

                // Only emit color codes if changed
                if top != prev_top {
                    write!(self.output_buf, "\x1b[48;2;{};{};{}m", top.0, top.1, top.2)?;
                    prev_top = top;
                }
                if bot != prev_bot {
                    write!(self.output_buf, "\x1b[38;2;{};{};{}m", bot.0, bot.1, bot.2)?;
                    prev_bot = bot;
                }
                self.output_buf.extend_from_slice("▄".as_bytes());
            }
            self.output_buf.extend_from_slice(b"\x1b[0m");
            prev_top = (255, 255, 255);
            prev_bot = (255, 255, 255);
            if y + 2 < self.height {
                self.output_buf.extend_from_slice(b"\r\n");
            }
        }

        if let Some(text) = overlay {
            write!(self.output_buf, "\x1b[H\x1b[0m\x1b[97m{text}\x1b[0m")?;
        }

        out.write_all(&self.output_buf)?;
        out.flush()
    }
}

/// Frames-per-second readout, refreshed every ten frames.
#[derive(Debug, Default)]
pub struct FrameCounter {
    last_frame_ms: Option<f64>,
    frames: u64,
    fps: f64,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&mut self, now_ms: f64) {
        if let Some(last) = self.last_frame_ms {
            let delta = now_ms - last;
            self.frames += 1;
            if self.frames % 10 == 0 && delta > 0.0 {
                self.fps = 1000.0 / delta;
            }
        }
        self.last_frame_ms = Some(now_ms);
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_counter_refreshes_every_tenth_frame() {
        let mut counter = FrameCounter::new();
        for i in 0..10 {
            counter.frame(i as f64 * 20.0);
        }
        assert_eq!(counter.fps(), 0.0);
        counter.frame(200.0);
        assert_eq!(counter.fps(), 50.0);
    }

    fn frame(renderer: &mut Renderer, container: &Container) -> String {
        let mut out = Vec::new();
        renderer.render(container, 0.0, None, &mut out).expect("writes to a Vec");
        String::from_utf8(out).expect("valid UTF-8")
    }

    #[test]
    fn empty_scene_is_background_only() {
        let mut renderer = Renderer::new(4, 2, (10, 20, 30));
        let out = frame(&mut renderer, &Container::new());
        assert!(out.starts_with("\x1b[H"));
        assert_eq!(out.matches('▄').count(), 8);
        assert!(out.contains("\x1b[48;2;10;20;30m"));
        assert!(!out.contains("\x1b[48;2;255;"));
    }

    #[test]
    fn visible_marker_is_drawn_in_its_tint() {
        let container = Container::new();
        container.add_sprite(Sprite {
            x: 0.0,
            y: 0.0,
            tint: (255, 0, 0),
            alpha: 1.0,
            blur: 0.0,
            visible: true,
        });
        let mut renderer = Renderer::new(8, 4, (0, 0, 0));
        let out = frame(&mut renderer, &container);
        // Full alpha core blends 2.5/3 of the way from black to the tint
        assert!(out.contains("2;212;0;0m"));
    }

    #[test]
    fn hidden_marker_is_not_drawn() {
        let container = Container::new();
        container.add_sprite(Sprite::hidden(0.0, 0.0, (255, 0, 0)));
        let mut renderer = Renderer::new(8, 4, (0, 0, 0));
        let out = frame(&mut renderer, &container);
        assert_eq!(out, frame(&mut renderer, &Container::new()));
    }

    #[test]
    fn overlay_goes_on_top() {
        let mut renderer = Renderer::new(8, 2, (0, 0, 0));
        let mut out = Vec::new();
        renderer
            .render(&Container::new(), 0.0, Some("FPS: 60.00"), &mut out)
            .expect("writes to a Vec");
        assert!(String::from_utf8_lossy(&out).ends_with("FPS: 60.00\x1b[0m"));
    }
}
