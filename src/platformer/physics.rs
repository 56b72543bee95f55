//! Per-frame physics of the platformer.
//!
//! The update is integrate-then-resolve: positions move by the full
//! velocity first and overlaps are fixed afterwards. There is no swept
//! test, so a fast enough body can pass through a thin platform.

use derive_setters::Setters;
use tracing::trace;

/// Axis-aligned rectangle, `y` grows downwards.
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

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Strict overlap on both axes; touching edges do not count.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub body: Rect,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub airborne: bool,
}

impl Player {
    pub fn new(body: Rect) -> Self {
        Self {
            body,
            velocity_x: 0.0,
            velocity_y: 0.0,
            airborne: false,
        }
    }
}

/// Input sampled for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    pub left: bool,
    pub right: bool,
    /// A jump key went down since the last frame (never set by key repeat).
    pub jump: bool,
}

#[derive(Debug, Clone, PartialEq, Setters)]
#[setters(prefix = "with_")]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub jump_force: f32,
    pub movement_speed: f32,
    pub field_width: f32,
    pub field_height: f32,
    pub player_start: Rect,
    pub platforms: Vec<Rect>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.5,
            jump_force: -12.0,
            movement_speed: 5.0,
            field_width: 800.0,
            field_height: 400.0,
            player_start: Rect::new(50.0, 200.0, 32.0, 32.0),
            platforms: vec![
                Rect::new(0.0, 350.0, 800.0, 50.0),   // Ground
                Rect::new(300.0, 250.0, 200.0, 20.0), // Platform 1
                Rect::new(100.0, 150.0, 200.0, 20.0), // Platform 2
            ],
        }
    }
}

/// Game state. The player is only written by `update`.
#[derive(Debug, Clone)]
pub struct World {
    pub player: Player,
    pub platforms: Vec<Rect>,
    config: PhysicsConfig,
    frame: u64,
}

impl World {
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            player: Player::new(config.player_start),
            platforms: config.platforms.clone(),
            config,
            frame: 0,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn field(&self) -> Rect {
        Rect::new(0.0, 0.0, self.config.field_width, self.config.field_height)
    }

    pub fn update(&mut self, input: &FrameInput) {
        let cfg = &self.config;
        let player = &mut self.player;

        // Right is checked first and wins when both directions are held
        player.velocity_x = if input.right {
            cfg.movement_speed
        } else if input.left {
            -cfg.movement_speed
        } else {
            0.0
        };

        if input.jump && !player.airborne {
            player.velocity_y = cfg.jump_force;
            player.airborne = true;
            trace!("Jump at frame {}", self.frame);
        }

        player.velocity_y += cfg.gravity;

        player.body.x += player.velocity_x;
        player.body.y += player.velocity_y;

        resolve_collisions(player, &self.platforms);
        clamp_to_field(player, cfg.field_width);

        self.frame += 1;
    }
}

/// Push the player out of every platform it overlaps, in platform order.
///
/// A later platform may undo what an earlier one decided within the same
/// frame; the last overlapping platform wins.
pub fn resolve_collisions(player: &mut Player, platforms: &[Rect]) {
    player.airborne = true;
    for platform in platforms {
        if !player.body.overlaps(platform) {
            continue;
        }
        let previous_top = player.body.y - player.velocity_y;
        let previous_bottom = player.body.bottom() - player.velocity_y;

        if player.velocity_y > 0.0 && previous_bottom <= platform.y {
            // Landing on top
            player.body.y = platform.y - player.body.height;
            player.velocity_y = 0.0;
            player.airborne = false;
        } else if player.velocity_y < 0.0 && previous_top >= platform.bottom() {
            // Head bump
            player.body.y = platform.bottom();
            player.velocity_y = 0.0;
        } else if player.velocity_x > 0.0 {
            player.body.x = platform.x - player.body.width;
        } else if player.velocity_x < 0.0 {
            player.body.x = platform.right();
        }
    }
}

/// Keep the player inside `[0, field_width]` horizontally. There is no
/// vertical bound.
pub fn clamp_to_field(player: &mut Player, field_width: f32) {
    if player.body.x < 0.0 {
        player.body.x = 0.0;
    }
    if player.body.right() > field_width {
        player.body.x = field_width - player.body.width;
    }
}
