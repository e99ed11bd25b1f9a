// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
pub use winit;

use anyhow::{Context, Result};
use tracing::info;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

/// Window parameters supplied by the app's config layer.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            title: "ember".into(),
            width: 640,
            height: 480,
        }
    }
}

pub fn create_window(event_loop: &ActiveEventLoop, cfg: &WindowConfig) -> Result<Window> {
    let attrs = Window::default_attributes()
        .with_title(&cfg.title)
        .with_inner_size(PhysicalSize::new(cfg.width, cfg.height));
    let window = event_loop
        .create_window(attrs)
        .context("create_window")?;

    let size = window.inner_size();
    info!("window ready ({}x{})", size.width, size.height);
    Ok(window)
}

/// Current pixel size, polled. Zero in either axis means "do not present".
pub fn physical_size(window: &Window) -> (u32, u32) {
    let size = window.inner_size();
    (size.width, size.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_640x480() {
        let cfg = WindowConfig::default();
        assert_eq!((cfg.width, cfg.height), (640, 480));
    }
}
