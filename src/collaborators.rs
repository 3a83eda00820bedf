//! External collaborator contracts.
//!
//! The bot core never touches the operating system directly. Screen capture,
//! window focus, OCR, template matching, and input injection are all reached
//! through the traits in this module. Each trait has a no-op implementation
//! so the core can run (and be tested) without any platform backend wired in.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// A point in screen or window coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A rectangle as (left, top, right, bottom) edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Named sub-regions of the game window used for capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Bottom 50% - main gameplay UI, plant tooltips.
    Bottom,
    /// Bottom 30% - inventory strip.
    Inventory,
    /// Top 20% - status bars.
    Top,
    /// Center 60% - gameplay area.
    Center,
    /// The whole window.
    Full,
}

impl Zone {
    /// Cuts the zone out of a window rectangle.
    pub fn cut(&self, window: Rect) -> Rect {
        let h = window.height();
        match self {
            Zone::Bottom => Rect {
                top: window.top + h / 2,
                ..window
            },
            Zone::Inventory => Rect {
                top: window.top + (h as f32 * 0.7) as i32,
                ..window
            },
            Zone::Top => Rect {
                bottom: window.top + (h as f32 * 0.2) as i32,
                ..window
            },
            Zone::Center => Rect {
                top: window.top + (h as f32 * 0.2) as i32,
                bottom: window.top + (h as f32 * 0.8) as i32,
                ..window
            },
            Zone::Full => window,
        }
    }
}

/// Access to the game window: discovery, capture, focus, coordinate
/// translation. A platform backend (Win32, X11, ...) implements this.
pub trait WindowAccess: Send {
    /// Locates the game window by process name. Returns false if the game
    /// is not running; the other methods then fall back to the full screen.
    fn find_window(&mut self, process_name: &str) -> bool;

    /// Returns the screen rectangle for a named zone of the game window.
    fn region_for_zone(&self, zone: Zone) -> Rect;

    /// Captures the given screen rectangle as an RGBA image.
    fn capture(&mut self, rect: Rect) -> Result<RgbaImage>;

    /// Brings the game window to the foreground. Returns false if focus
    /// could not be taken.
    fn focus(&mut self) -> bool;

    /// Translates a window-relative point to screen-absolute coordinates.
    fn to_screen(&self, point: Point) -> Point;

    /// Translates a screen-absolute point to window-relative coordinates.
    fn to_window(&self, point: Point) -> Point;
}

/// OCR page segmentation hint passed through to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OcrMode {
    /// Single uniform block of text.
    Block,
    /// Sparse text scattered over the image.
    Sparse,
}

/// A single recognized word with its engine confidence (0-100).
#[derive(Clone, Debug)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

/// A recognized line of text with its words and mean confidence (0-100).
#[derive(Clone, Debug)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f32,
}

impl OcrLine {
    /// Builds a line from its words; text is the joined words, confidence
    /// their mean.
    pub fn from_words(words: Vec<OcrWord>) -> Self {
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let confidence = if words.is_empty() {
            0.0
        } else {
            words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32
        };
        Self {
            text,
            words,
            confidence,
        }
    }
}

/// Black-box OCR engine: image in, lines of words with confidences out.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &RgbaImage, languages: &str, mode: OcrMode) -> Result<Vec<OcrLine>>;
}

/// Vision search collaborator: template matching and text location.
///
/// `locate_text` exists because the OCR contract carries no geometry; finding
/// where a recognized label sits on screen is the vision backend's job.
pub trait TemplateMatcher: Send + Sync {
    /// Returns the best match position (center) and its confidence (0-1).
    fn best_match(&self, image: &RgbaImage, template: &RgbaImage) -> Option<(Point, f32)>;

    /// Locates the given text inside the image, returning the center of the
    /// matched word and a confidence (0-1).
    fn locate_text(&self, image: &RgbaImage, text: &str) -> Option<(Point, f32)>;
}

/// Mouse and keyboard injection.
pub trait InputActuator: Send {
    fn move_to(&mut self, point: Point) -> Result<()>;
    fn click(&mut self) -> Result<()>;
    fn press(&mut self, key: &str) -> Result<()>;
}

/// Fallback window access used when no platform backend is wired in.
///
/// Reports a fixed screen rectangle and captures blank frames, so the loop
/// idles harmlessly instead of erroring every cycle.
pub struct NullWindowAccess {
    screen: Rect,
}

impl NullWindowAccess {
    pub fn new() -> Self {
        Self {
            screen: Rect {
                left: 0,
                top: 0,
                right: 1920,
                bottom: 1080,
            },
        }
    }
}

impl Default for NullWindowAccess {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowAccess for NullWindowAccess {
    fn find_window(&mut self, _process_name: &str) -> bool {
        false
    }

    fn region_for_zone(&self, zone: Zone) -> Rect {
        zone.cut(self.screen)
    }

    fn capture(&mut self, rect: Rect) -> Result<RgbaImage> {
        let w = rect.width().max(1) as u32;
        let h = rect.height().max(1) as u32;
        Ok(RgbaImage::new(w, h))
    }

    fn focus(&mut self) -> bool {
        false
    }

    fn to_screen(&self, point: Point) -> Point {
        point
    }

    fn to_window(&self, point: Point) -> Point {
        point
    }
}

/// OCR engine that recognizes nothing. Stands in when no engine is wired.
pub struct NullOcrEngine;

impl OcrEngine for NullOcrEngine {
    fn recognize(
        &self,
        _image: &RgbaImage,
        _languages: &str,
        _mode: OcrMode,
    ) -> Result<Vec<OcrLine>> {
        Ok(Vec::new())
    }
}

/// Vision backend that never finds anything.
pub struct NullTemplateMatcher;

impl TemplateMatcher for NullTemplateMatcher {
    fn best_match(&self, _image: &RgbaImage, _template: &RgbaImage) -> Option<(Point, f32)> {
        None
    }

    fn locate_text(&self, _image: &RgbaImage, _text: &str) -> Option<(Point, f32)> {
        None
    }
}

/// Input actuator that rejects every injection attempt.
///
/// Failing (rather than silently succeeding) keeps the executor's failure
/// accounting honest when no backend is present.
pub struct NullInputActuator;

impl InputActuator for NullInputActuator {
    fn move_to(&mut self, _point: Point) -> Result<()> {
        Err(anyhow!("no input backend available"))
    }

    fn click(&mut self) -> Result<()> {
        Err(anyhow!("no input backend available"))
    }

    fn press(&mut self, _key: &str) -> Result<()> {
        Err(anyhow!("no input backend available"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_cut_bottom_half() {
        let window = Rect {
            left: 100,
            top: 200,
            right: 1100,
            bottom: 1200,
        };
        let bottom = Zone::Bottom.cut(window);
        assert_eq!(bottom.top, 700);
        assert_eq!(bottom.bottom, 1200);
        assert_eq!(bottom.left, 100);
        assert_eq!(bottom.right, 1100);
    }

    #[test]
    fn test_zone_cut_inventory_strip() {
        let window = Rect {
            left: 0,
            top: 0,
            right: 1000,
            bottom: 1000,
        };
        let inv = Zone::Inventory.cut(window);
        assert_eq!(inv.top, 700);
        assert_eq!(inv.bottom, 1000);
    }

    #[test]
    fn test_null_window_captures_blank_frame() {
        let mut access = NullWindowAccess::new();
        let rect = access.region_for_zone(Zone::Bottom);
        let img = access.capture(rect).unwrap();
        assert_eq!(img.width(), rect.width() as u32);
        assert_eq!(img.height(), rect.height() as u32);
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }
}
