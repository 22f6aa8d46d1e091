//! Static level data shared by the server (spawns, palette) and the client (terrain).

use crate::GROUND_Y;

/// Axis-aligned rectangle in world units, anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Round-robin spawn rotation.
pub const SPAWN_POINTS: [(f32, f32); 8] = [
    (140.0, 488.0),
    (420.0, 440.0),
    (760.0, 360.0),
    (1080.0, 300.0),
    (1420.0, 260.0),
    (1780.0, 320.0),
    (2120.0, 280.0),
    (2460.0, 320.0),
];

/// Colours handed out to joiners before falling back to random HSL.
pub const PALETTE: [&str; 8] = [
    "#ffcc66", "#ff9966", "#ff6699", "#cc66ff", "#6699ff", "#66ffcc", "#66ff66", "#ccff66",
];

pub const PLATFORMS: [Rect; 24] = [
    Rect::new(-400.0, GROUND_Y, 8000.0, 64.0),
    Rect::new(180.0, GROUND_Y - 120.0, 260.0, 24.0),
    Rect::new(520.0, GROUND_Y - 200.0, 240.0, 24.0),
    Rect::new(860.0, GROUND_Y - 160.0, 220.0, 24.0),
    Rect::new(1180.0, GROUND_Y - 260.0, 220.0, 24.0),
    Rect::new(1500.0, GROUND_Y - 320.0, 220.0, 24.0),
    Rect::new(1780.0, GROUND_Y - 260.0, 220.0, 24.0),
    Rect::new(2060.0, GROUND_Y - 200.0, 240.0, 24.0),
    Rect::new(2360.0, GROUND_Y - 200.0, 240.0, 24.0),
    Rect::new(2680.0, GROUND_Y - 280.0, 240.0, 24.0),
    Rect::new(3020.0, GROUND_Y - 340.0, 240.0, 24.0),
    Rect::new(3340.0, GROUND_Y - 260.0, 260.0, 24.0),
    Rect::new(3340.0, GROUND_Y - 120.0, 260.0, 24.0),
    Rect::new(3680.0, GROUND_Y - 220.0, 260.0, 24.0),
    Rect::new(4040.0, GROUND_Y - 280.0, 220.0, 24.0),
    Rect::new(4380.0, GROUND_Y - 200.0, 260.0, 24.0),
    Rect::new(4760.0, GROUND_Y - 260.0, 240.0, 24.0),
    Rect::new(5120.0, GROUND_Y - 340.0, 260.0, 24.0),
    Rect::new(5480.0, GROUND_Y - 300.0, 240.0, 24.0),
    Rect::new(5840.0, GROUND_Y - 220.0, 280.0, 24.0),
    Rect::new(6180.0, GROUND_Y - 260.0, 240.0, 24.0),
    Rect::new(6520.0, GROUND_Y - 320.0, 240.0, 24.0),
    Rect::new(6860.0, GROUND_Y - 200.0, 260.0, 24.0),
    Rect::new(6860.0, GROUND_Y - 80.0, 260.0, 24.0),
];
