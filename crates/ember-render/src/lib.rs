// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use ember_math::Vec2;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

#[derive(Clone, Copy, Debug)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

/// Handle into the (not yet existing) sprite atlas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sprite {
    pub index: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct DrawSpriteOptions {
    pub position: Vec2,
    pub scale: Vec2,
}

impl Default for DrawSpriteOptions {
    fn default() -> Self {
        DrawSpriteOptions {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SpriteCommand {
    pub sprite: Sprite,
    pub position: Vec2,
    pub scale: Vec2,
}

/// One frame's worth of recorded draw calls. No backend consumes the list
/// yet; it exists so user code has a stable surface to draw against.
#[derive(Debug, Default)]
pub struct Frame {
    pub index: u64,
    commands: Vec<SpriteCommand>,
}

impl Frame {
    pub fn new(index: u64) -> Self {
        Frame {
            index,
            commands: Vec::new(),
        }
    }

    pub fn draw_sprite(&mut self, sprite: Sprite, opts: DrawSpriteOptions) {
        self.commands.push(SpriteCommand {
            sprite,
            position: opts.position,
            scale: opts.scale,
        });
    }

    pub fn commands(&self) -> &[SpriteCommand] {
        &self.commands
    }
}

pub trait RenderBackend {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        validation: bool,
    ) -> Result<Self>
    where
        Self: Sized;

    fn resize(&mut self, size: RenderSize) -> Result<()>;

    fn begin_frame(&mut self) -> Frame;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_math::vec2;

    #[test]
    fn frame_records_draws_in_order() {
        let mut frame = Frame::new(7);
        frame.draw_sprite(Sprite { index: 3 }, DrawSpriteOptions::default());
        frame.draw_sprite(
            Sprite { index: 1 },
            DrawSpriteOptions {
                position: vec2(10.0, 20.0),
                scale: vec2(2.0, 2.0),
            },
        );

        let cmds = frame.commands();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].sprite, Sprite { index: 3 });
        assert_eq!(cmds[0].scale, Vec2::ONE);
        assert_eq!(cmds[1].position, vec2(10.0, 20.0));
    }
}
