//! Full-screen flash on an ANSI terminal.
//!
//! The overlay is the terminal's alternate screen: mounting switches to it,
//! each opacity change repaints it with the flash colour blended over black,
//! and release restores the primary screen.

use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::warn;

use super::{Overlay, OverlayStyle, Screen};
use crate::error::PlatformError;
use crate::guard::Release;

const ENTER_ALT_SCREEN: &str = "\x1b[?1049h\x1b[?25l";
const LEAVE_ALT_SCREEN: &str = "\x1b[0m\x1b[2J\x1b[?25h\x1b[?1049l";

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

pub struct TerminalScreen {
    out: SharedWriter,
    interactive: bool,
}

impl TerminalScreen {
    /// Flash the process's stdout. Only available when stdout is a tty.
    pub fn stdout() -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(std::io::stdout()))),
            interactive: std::io::stdout().is_terminal(),
        }
    }

    /// Write escape sequences to an arbitrary sink.
    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            interactive: true,
        }
    }
}

#[async_trait]
impl Screen for TerminalScreen {
    fn is_available(&self) -> bool {
        self.interactive
    }

    fn supports_wake_lock(&self) -> bool {
        false
    }

    async fn request_wake_lock(&self) -> Result<Box<dyn Release>, PlatformError> {
        Err(PlatformError::NotSupported(
            "terminals cannot hold the display awake".into(),
        ))
    }

    fn mount_overlay(&self, style: &OverlayStyle) -> Result<Box<dyn Overlay>, PlatformError> {
        if !self.interactive {
            return Err(PlatformError::NotSupported("stdout is not a terminal".into()));
        }
        let rgb = parse_hex_color(&style.color)?;
        write_seq(&self.out, ENTER_ALT_SCREEN)?;
        let overlay = TerminalOverlay {
            out: Arc::clone(&self.out),
            rgb,
        };
        overlay.set_opacity(style.off_opacity)?;
        Ok(Box::new(overlay))
    }
}

struct TerminalOverlay {
    out: SharedWriter,
    rgb: (u8, u8, u8),
}

impl Overlay for TerminalOverlay {
    fn set_opacity(&self, opacity: f32) -> Result<(), PlatformError> {
        let (r, g, b) = blend(self.rgb, opacity);
        write_seq(&self.out, &format!("\x1b[48;2;{r};{g};{b}m\x1b[2J\x1b[H"))
    }
}

impl Release for TerminalOverlay {
    fn release(&self) {
        if let Err(err) = write_seq(&self.out, LEAVE_ALT_SCREEN) {
            warn!(error = %err, "failed to restore the primary screen");
        }
    }
}

fn write_seq(out: &SharedWriter, seq: &str) -> Result<(), PlatformError> {
    let mut out = out.lock().unwrap_or_else(PoisonError::into_inner);
    out.write_all(seq.as_bytes())?;
    out.flush()?;
    Ok(())
}

fn blend((r, g, b): (u8, u8, u8), opacity: f32) -> (u8, u8, u8) {
    let a = opacity.clamp(0.0, 1.0);
    let scale = |c: u8| (f32::from(c) * a).round() as u8;
    (scale(r), scale(g), scale(b))
}

fn parse_hex_color(color: &str) -> Result<(u8, u8, u8), PlatformError> {
    let hex = color.trim().trim_start_matches('#');
    let invalid = || PlatformError::NotSupported(format!("unsupported overlay color '{color}'"));
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok((channel(0)?, channel(2)?, channel(4)?))
}
