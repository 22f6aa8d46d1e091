//! Keyboard and pointer sampling

use crate::game::ClientGame;
use crate::network::Transport;
use crate::rendering::Camera;
use macroquad::prelude::*;
use shared::{Facing, MAX_NAME_CHARS};

/// Two taps of the same direction inside this window trigger a dash
pub const DASH_DOUBLE_TAP_SECONDS: f64 = 0.26;

/// Detects double taps of the movement keys
#[derive(Debug, Clone, Default)]
pub struct DashTapDetector {
    last_left: Option<f64>,
    last_right: Option<f64>,
}

impl DashTapDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a press of `direction` at `now` (seconds). Returns the dash
    /// direction when this press completes a double tap.
    pub fn tap(&mut self, direction: Facing, now: f64) -> Option<Facing> {
        let (same, other) = match direction {
            Facing::Left => (&mut self.last_left, &mut self.last_right),
            Facing::Right => (&mut self.last_right, &mut self.last_left),
        };
        *other = None;

        match *same {
            Some(previous) if now - previous < DASH_DOUBLE_TAP_SECONDS => {
                *same = None;
                Some(direction)
            }
            _ => {
                *same = Some(now);
                None
            }
        }
    }
}

/// Applies typed characters to the name field
///
/// A selected name is replaced by the first typed character, matching how a
/// focused, selected text input behaves.
pub fn edit_name(name: &mut String, select_all: &mut bool, typed: char) {
    if typed.is_control() {
        return;
    }
    if *select_all {
        name.clear();
        *select_all = false;
    }
    if name.chars().count() < MAX_NAME_CHARS {
        name.push(typed);
    }
}

pub struct InputManager {
    taps: DashTapDetector,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            taps: DashTapDetector::new(),
        }
    }

    /// Samples this frame's input into the game
    pub fn update<T: Transport>(&mut self, game: &mut ClientGame<T>, camera: &Camera) {
        if game.session.lobby.visible {
            game.controls.clear();
            self.update_lobby(game);
            return;
        }

        let controls = &mut game.controls;
        controls.left = is_key_down(KeyCode::A) || is_key_down(KeyCode::Left);
        controls.right = is_key_down(KeyCode::D) || is_key_down(KeyCode::Right);

        let now = get_time();
        if is_key_pressed(KeyCode::A) || is_key_pressed(KeyCode::Left) {
            if let Some(direction) = self.taps.tap(Facing::Left, now) {
                controls.dash = Some(direction);
            }
        }
        if is_key_pressed(KeyCode::D) || is_key_pressed(KeyCode::Right) {
            if let Some(direction) = self.taps.tap(Facing::Right, now) {
                controls.dash = Some(direction);
            }
        }

        if is_key_pressed(KeyCode::W) || is_key_pressed(KeyCode::Up) || is_key_pressed(KeyCode::Space) {
            controls.jump_queued = true;
        }

        controls.fire = is_mouse_button_down(MouseButton::Left) || is_key_down(KeyCode::M);

        let (mouse_x, mouse_y) = mouse_position();
        controls.aim = Some(camera.screen_to_world(mouse_x, mouse_y));
    }

    fn update_lobby<T: Transport>(&mut self, game: &mut ClientGame<T>) {
        // Drain typed characters even while the form is disabled
        while let Some(typed) = get_char_pressed() {
            let lobby = &mut game.session.lobby;
            if lobby.enabled {
                edit_name(&mut lobby.name, &mut lobby.select_all, typed);
            }
        }

        let lobby = &mut game.session.lobby;
        if !lobby.enabled {
            return;
        }

        if is_key_pressed(KeyCode::Backspace) {
            if lobby.select_all {
                lobby.name.clear();
                lobby.select_all = false;
            } else {
                lobby.name.pop();
            }
        }
        if is_key_pressed(KeyCode::Tab) {
            lobby.character = lobby.character.next();
        }
        if is_key_pressed(KeyCode::Enter) || is_key_pressed(KeyCode::KpEnter) {
            let _ = game.submit_join();
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
