use crate::game::ClientGame;
use crate::network::Transport;
use crate::player::LocalPlayer;
use crate::projectiles::Projectile;
use crate::reconcile::RemoteGhost;
use crate::trails::DashTrail;
use macroquad::prelude::*;
use shared::{AnimState, Facing, ProjectileKind, PLATFORMS, WORLD_HEIGHT, WORLD_WIDTH};

const SKY: Color = Color::new(0.10, 0.08, 0.16, 1.0);
const PLATFORM_FILL: Color = Color::new(0.55, 0.40, 0.25, 1.0);
const PLATFORM_EDGE: Color = Color::new(0.85, 0.68, 0.42, 1.0);
const FALLBACK_COLOR: Color = Color::new(0.4, 1.0, 0.8, 1.0);

/// Parses the colours the server hands out: `#rrggbb`, `#rgb` or
/// `hsl(h, s%, l%)`.
pub fn parse_css_color(value: &str) -> Option<Color> {
    let value = value.trim();

    if let Some(hex) = value.strip_prefix('#') {
        if !hex.is_ascii() {
            return None;
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
        return Some(Color::from_rgba(channel(0)?, channel(2)?, channel(4)?, 255));
    }

    let inner = value.strip_prefix("hsl(")?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(|part| part.trim().trim_end_matches('%'));
    let hue: f32 = parts.next()?.parse().ok()?;
    let saturation: f32 = parts.next()?.parse().ok()?;
    let lightness: f32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let (r, g, b) = hsl_to_rgb(hue, saturation / 100.0, lightness / 100.0);
    Some(Color::new(r, g, b, 1.0))
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> (f32, f32, f32) {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = lightness - c / 2.0;
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    (r + m, g + m, b + m)
}

fn css_color_or_fallback(value: &str) -> Color {
    parse_css_color(value).unwrap_or(FALLBACK_COLOR)
}

/// Horizontal-scrolling camera following the local player
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
}

impl Camera {
    pub fn follow(&mut self, player: &LocalPlayer, screen_width: f32, screen_height: f32) {
        let (cx, cy) = player.center();
        self.x = (cx - screen_width / 2.0).clamp(0.0, (WORLD_WIDTH - screen_width).max(0.0));
        self.y = (cy - screen_height / 2.0).clamp(0.0, (WORLD_HEIGHT - screen_height).max(0.0));
    }

    pub fn world_to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (x - self.x, y - self.y)
    }

    pub fn screen_to_world(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.x, y + self.y)
    }
}

pub struct Renderer {
    pub camera: Camera,
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            camera: Camera::default(),
        }
    }

    pub fn render<T: Transport>(&mut self, game: &ClientGame<T>) {
        self.camera.follow(&game.player, screen_width(), screen_height());
        clear_background(SKY);

        self.draw_platforms();
        for trail in game.trails.iter() {
            self.draw_trail(trail);
        }
        for ghost in game.ghosts.iter() {
            self.draw_ghost(ghost);
        }
        self.draw_local_player(&game.player);
        for projectile in game.projectiles.iter() {
            self.draw_projectile(projectile);
        }

        if game.session.has_joined() {
            self.draw_hud(game);
        }
        if game.session.lobby.visible {
            self.draw_join_overlay(game);
        }
        if let Some(text) = game.notices.text() {
            self.draw_notice(text);
        }
    }

    fn draw_platforms(&self) {
        for platform in PLATFORMS.iter() {
            let (x, y) = self.camera.world_to_screen(platform.x, platform.y);
            draw_rectangle(x, y, platform.width, platform.height, PLATFORM_FILL);
            draw_rectangle(x, y, platform.width, 4.0, PLATFORM_EDGE);
        }
    }

    fn draw_trail(&self, trail: &DashTrail) {
        let (x, y) = self.camera.world_to_screen(trail.x, trail.y);
        let mut color = css_color_or_fallback(&trail.color);
        color.a = trail.alpha();
        draw_rectangle(x, y, trail.width, trail.height, color);
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_body(
        &self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        facing: Facing,
        anim: AnimState,
        color: Color,
        hit_flash: f32,
        blink: bool,
    ) {
        let (sx, sy) = self.camera.world_to_screen(x, y);
        let body = if hit_flash > 0.0 { WHITE } else { color };
        let body = if blink {
            Color::new(body.r, body.g, body.b, 0.45)
        } else {
            body
        };

        if anim == AnimState::Down {
            // Lying flat on the ground
            draw_rectangle(sx - height / 4.0, sy + height - width / 2.0, height, width / 2.0, body);
            return;
        }

        draw_rectangle(sx, sy, width, height, body);
        draw_rectangle_lines(sx, sy, width, height, 2.0, BLACK);

        let eye_x = match facing {
            Facing::Right => sx + width * 0.65,
            Facing::Left => sx + width * 0.2,
        };
        draw_rectangle(eye_x, sy + height * 0.2, width * 0.15, height * 0.1, BLACK);

        if anim == AnimState::Attack {
            let reach = facing.sign() * width * 0.6;
            let hand_x = sx + width / 2.0 + reach;
            draw_circle(hand_x, sy + height * 0.5, 8.0, YELLOW);
        }
    }

    fn draw_name(&self, name: &str, x: f32, y: f32, width: f32) {
        let (sx, sy) = self.camera.world_to_screen(x, y);
        let size = measure_text(name, None, 16, 1.0);
        draw_text(name, sx + width / 2.0 - size.width / 2.0, sy - 16.0, 16.0, WHITE);
    }

    fn draw_health_bar(&self, x: f32, y: f32, width: f32, health: f32, max_health: f32) {
        let (sx, sy) = self.camera.world_to_screen(x, y);
        let ratio = if max_health > 0.0 {
            (health / max_health).clamp(0.0, 1.0)
        } else {
            0.0
        };
        draw_rectangle(sx, sy - 10.0, width, 5.0, DARKGRAY);
        draw_rectangle(sx, sy - 10.0, width * ratio, 5.0, RED);
    }

    fn draw_ghost(&self, ghost: &RemoteGhost) {
        let color = css_color_or_fallback(&ghost.color);
        self.draw_body(
            ghost.x,
            ghost.y,
            ghost.width,
            ghost.height,
            ghost.facing,
            ghost.anim,
            color,
            ghost.hit_flash,
            false,
        );
        self.draw_name(&ghost.name, ghost.x, ghost.y, ghost.width);
        self.draw_health_bar(ghost.x, ghost.y, ghost.width, ghost.health, ghost.max_health);
    }

    fn draw_local_player(&self, player: &LocalPlayer) {
        let color = css_color_or_fallback(&player.color);
        let blink = player.invuln > 0.0 && (player.invuln * 20.0) as u32 % 2 == 0;
        self.draw_body(
            player.x,
            player.y,
            player.width,
            player.height,
            player.facing,
            player.anim,
            color,
            player.hit_flash,
            blink,
        );
        self.draw_name(&player.display_name, player.x, player.y, player.width);
    }

    fn draw_projectile(&self, projectile: &Projectile) {
        let (x, y) = self.camera.world_to_screen(projectile.x, projectile.y);
        match projectile.kind {
            ProjectileKind::Fireball => {
                let radius = projectile.width / 2.0;
                draw_circle(x + radius, y + radius, radius, ORANGE);
                draw_circle(x + radius, y + radius, radius * 0.5, YELLOW);
            }
            ProjectileKind::SinbadWave => {
                let alpha = (projectile.lifetime / 0.5).clamp(0.2, 0.8);
                let crest = Color::new(0.4, 0.8, 1.0, alpha);
                draw_rectangle(x, y, projectile.width, projectile.height, crest);
                draw_rectangle_lines(x, y, projectile.width, projectile.height, 2.0, WHITE);
            }
        }
    }

    fn draw_hud<T: Transport>(&self, game: &ClientGame<T>) {
        let player = &game.player;
        let health = format!("Health {:.0} / {:.0}", player.health.max(0.0), player.max_health);
        draw_text(&health, 20.0, 30.0, 24.0, WHITE);
        self.draw_bar(20.0, 40.0, 200.0, player.health / player.max_health.max(1.0));

        let tally = format!("Kills {}  Deaths {}", player.kills, player.deaths);
        draw_text(&tally, 20.0, 76.0, 20.0, WHITE);

        let others = game.ghosts.iter().filter(|ghost| ghost.alive).count();
        let counter = format!("Allies in the caravan: {}", others);
        draw_text(&counter, 20.0, 100.0, 20.0, LIGHTGRAY);

        if !game.transport().is_connected() {
            draw_text("Reconnecting...", 20.0, 124.0, 20.0, ORANGE);
        }
    }

    fn draw_bar(&self, x: f32, y: f32, width: f32, ratio: f32) {
        draw_rectangle(x, y, width, 10.0, DARKGRAY);
        draw_rectangle(x, y, width * ratio.clamp(0.0, 1.0), 10.0, RED);
        draw_rectangle_lines(x, y, width, 10.0, 1.0, WHITE);
    }

    fn draw_join_overlay<T: Transport>(&self, game: &ClientGame<T>) {
        let (w, h) = (screen_width(), screen_height());
        draw_rectangle(0.0, 0.0, w, h, Color::new(0.0, 0.0, 0.0, 0.6));

        let panel_w = 420.0;
        let panel_h = 200.0;
        let px = (w - panel_w) / 2.0;
        let py = (h - panel_h) / 2.0;
        draw_rectangle(px, py, panel_w, panel_h, Color::new(0.15, 0.12, 0.22, 1.0));
        draw_rectangle_lines(px, py, panel_w, panel_h, 2.0, PLATFORM_EDGE);

        let lobby = &game.session.lobby;
        draw_text("Join the caravan", px + 20.0, py + 40.0, 30.0, WHITE);

        let field_color = if lobby.select_all { SKYBLUE } else { WHITE };
        let cursor = if lobby.enabled && (get_time() * 2.0) as u64 % 2 == 0 {
            "_"
        } else {
            ""
        };
        draw_rectangle_lines(px + 20.0, py + 60.0, panel_w - 40.0, 36.0, 2.0, field_color);
        draw_text(
            &format!("{}{}", lobby.name, cursor),
            px + 30.0,
            py + 86.0,
            24.0,
            field_color,
        );

        let character = format!("Character: {}  (Tab to switch)", lobby.character.as_str());
        draw_text(&character, px + 20.0, py + 126.0, 20.0, LIGHTGRAY);

        let action = if lobby.enabled {
            "Press Enter to join"
        } else {
            "Joining..."
        };
        draw_text(action, px + 20.0, py + 170.0, 22.0, PLATFORM_EDGE);
    }

    fn draw_notice(&self, text: &str) {
        let size = measure_text(text, None, 24, 1.0);
        let x = screen_width() / 2.0 - size.width / 2.0;
        let y = 60.0;
        draw_rectangle(
            x - 12.0,
            y - size.height - 10.0,
            size.width + 24.0,
            size.height + 20.0,
            Color::new(0.0, 0.0, 0.0, 0.7),
        );
        draw_text(text, x, y, 24.0, WHITE);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
