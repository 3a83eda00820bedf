//! Inventory interaction: chemical lookup and watering can inspection.
//!
//! The inventory strip is read through the vision collaborator. Chemicals are
//! found by locating their label text; the watering can fill state is judged
//! by template matching against reference images from the data directory.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::collaborators::{InputActuator, Point, TemplateMatcher, WindowAccess, Zone};

/// Scales tried when matching can templates. The game renders the inventory
/// at slightly different sizes depending on window dimensions.
const TEMPLATE_SCALES: &[f32] = &[1.0, 0.9, 0.8, 1.1, 1.2];

/// Minimum match score for a can template to count.
const CAN_MATCH_THRESHOLD: f32 = 0.7;

/// Settle time after toggling the inventory panel.
const TOGGLE_DELAY: Duration = Duration::from_millis(500);

/// Judged fill state of the watering can.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanStatus {
    Full,
    Empty,
    Unknown,
}

impl CanStatus {
    /// Only a confirmed empty can warrants a refill trip.
    pub fn needs_refill(&self) -> bool {
        matches!(self, CanStatus::Empty)
    }
}

#[derive(Debug, Default)]
pub struct InventoryStats {
    pub opens: u32,
    pub chemical_clicks: u32,
    pub can_checks: u32,
}

pub struct InventoryScanner {
    matcher: Arc<dyn TemplateMatcher>,
    can_full: Option<RgbaImage>,
    can_empty: Option<RgbaImage>,
    open: bool,
    toggle_delay: Duration,
    pub stats: InventoryStats,
}

impl InventoryScanner {
    /// Builds a scanner, loading can templates from the data directory.
    /// Missing templates are logged and disable can inspection only.
    pub fn new(matcher: Arc<dyn TemplateMatcher>) -> Self {
        let data_dir = crate::paths::get_data_dir();
        let can_full = load_template(&data_dir.join("water_full.png"));
        let can_empty = load_template(&data_dir.join("water_empty.png"));
        Self::with_templates(matcher, can_full, can_empty, TOGGLE_DELAY)
    }

    pub fn with_templates(
        matcher: Arc<dyn TemplateMatcher>,
        can_full: Option<RgbaImage>,
        can_empty: Option<RgbaImage>,
        toggle_delay: Duration,
    ) -> Self {
        Self {
            matcher,
            can_full,
            can_empty,
            open: false,
            toggle_delay,
            stats: InventoryStats::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Opens the inventory panel if it is not already open.
    pub fn open_inventory(&mut self, input: &mut dyn InputActuator) -> Result<()> {
        if self.open {
            return Ok(());
        }
        input.press("tab")?;
        std::thread::sleep(self.toggle_delay);
        self.open = true;
        self.stats.opens += 1;
        Ok(())
    }

    /// Closes the inventory panel if it is open.
    pub fn close_inventory(&mut self, input: &mut dyn InputActuator) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        input.press("tab")?;
        std::thread::sleep(self.toggle_delay);
        self.open = false;
        Ok(())
    }

    /// Looks for a chemical's label in the inventory strip. Returns the
    /// screen position of the label center if found.
    pub fn find_chemical(
        &self,
        window: &mut dyn WindowAccess,
        name: &str,
    ) -> Result<Option<Point>> {
        let region = window.region_for_zone(Zone::Inventory);
        let frame = window.capture(region)?;

        match self.matcher.locate_text(&frame, name) {
            Some((point, score)) => {
                crate::log(&format!(
                    "Found chemical '{}' at ({}, {}) score {:.2}",
                    name, point.x, point.y, score
                ));
                Ok(Some(Point {
                    x: region.left + point.x,
                    y: region.top + point.y,
                }))
            }
            None => Ok(None),
        }
    }

    /// Opens the inventory, clicks the named chemical and closes the panel
    /// again. Returns false if the chemical was not found.
    pub fn click_chemical(
        &mut self,
        window: &mut dyn WindowAccess,
        input: &mut dyn InputActuator,
        name: &str,
    ) -> Result<bool> {
        self.open_inventory(input)?;

        let found = self.find_chemical(window, name)?;
        let clicked = match found {
            Some(point) => {
                input.move_to(point)?;
                input.click()?;
                self.stats.chemical_clicks += 1;
                true
            }
            None => {
                crate::log(&format!("Chemical '{}' not found in inventory", name));
                false
            }
        };

        self.close_inventory(input)?;
        Ok(clicked)
    }

    /// Judges the watering can fill state by matching the full/empty
    /// templates against the inventory strip at several scales.
    pub fn watering_can_status(&mut self, window: &mut dyn WindowAccess) -> Result<CanStatus> {
        self.stats.can_checks += 1;

        let region = window.region_for_zone(Zone::Inventory);
        let frame = window.capture(region)?;

        let full_score = self
            .can_full
            .as_ref()
            .and_then(|t| self.best_scaled_match(&frame, t))
            .unwrap_or(0.0);
        let empty_score = self
            .can_empty
            .as_ref()
            .and_then(|t| self.best_scaled_match(&frame, t))
            .unwrap_or(0.0);

        let status = if full_score >= CAN_MATCH_THRESHOLD && full_score >= empty_score {
            CanStatus::Full
        } else if empty_score >= CAN_MATCH_THRESHOLD {
            CanStatus::Empty
        } else {
            CanStatus::Unknown
        };

        crate::log(&format!(
            "Watering can check: full {:.2} / empty {:.2} -> {:?}",
            full_score, empty_score, status
        ));
        Ok(status)
    }

    /// Best template match score over all scales, None if nothing matched.
    fn best_scaled_match(&self, frame: &RgbaImage, template: &RgbaImage) -> Option<f32> {
        let mut best: Option<f32> = None;

        for &scale in TEMPLATE_SCALES {
            let w = (template.width() as f32 * scale) as u32;
            let h = (template.height() as f32 * scale) as u32;
            if w == 0 || h == 0 || w > frame.width() || h > frame.height() {
                continue;
            }

            let scaled = if scale == 1.0 {
                template.clone()
            } else {
                imageops::resize(template, w, h, FilterType::Triangle)
            };

            if let Some((_, score)) = self.matcher.best_match(frame, &scaled) {
                if best.map_or(true, |b| score > b) {
                    best = Some(score);
                }
            }
        }

        best
    }
}

fn load_template(path: &std::path::Path) -> Option<RgbaImage> {
    match image::open(path) {
        Ok(img) => Some(img.to_rgba8()),
        Err(e) => {
            crate::log(&format!(
                "Can template {} not loaded: {}. Can inspection disabled.",
                path.display(),
                e
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::NullWindowAccess;
    use std::sync::Mutex;

    /// Matcher returning scripted scores; records the template sizes it saw.
    struct ScriptedMatcher {
        score_by_width: Vec<(u32, f32)>,
        text_hit: Option<(Point, f32)>,
        seen_sizes: Mutex<Vec<(u32, u32)>>,
    }

    impl ScriptedMatcher {
        fn with_scores(score_by_width: Vec<(u32, f32)>) -> Self {
            Self {
                score_by_width,
                text_hit: None,
                seen_sizes: Mutex::new(Vec::new()),
            }
        }
    }

    impl TemplateMatcher for ScriptedMatcher {
        fn best_match(&self, _image: &RgbaImage, template: &RgbaImage) -> Option<(Point, f32)> {
            self.seen_sizes
                .lock()
                .unwrap()
                .push((template.width(), template.height()));
            self.score_by_width
                .iter()
                .find(|(w, _)| *w == template.width())
                .map(|(_, s)| (Point { x: 0, y: 0 }, *s))
        }

        fn locate_text(&self, _image: &RgbaImage, _text: &str) -> Option<(Point, f32)> {
            self.text_hit
        }
    }

    fn template(size: u32) -> RgbaImage {
        RgbaImage::new(size, size)
    }

    fn scanner(matcher: ScriptedMatcher, full: Option<RgbaImage>, empty: Option<RgbaImage>) -> InventoryScanner {
        InventoryScanner::with_templates(Arc::new(matcher), full, empty, Duration::ZERO)
    }

    #[test]
    fn test_can_full_when_full_template_wins() {
        // Base width 100; the 0.9 scale (width 90) scores best
        let matcher = ScriptedMatcher::with_scores(vec![(100, 0.55), (90, 0.82), (80, 0.4)]);
        let mut scanner = scanner(matcher, Some(template(100)), None);
        let mut window = NullWindowAccess::new();

        assert_eq!(scanner.watering_can_status(&mut window).unwrap(), CanStatus::Full);
        assert_eq!(scanner.stats.can_checks, 1);
    }

    #[test]
    fn test_can_unknown_below_threshold() {
        let matcher = ScriptedMatcher::with_scores(vec![(100, 0.6), (90, 0.65)]);
        let mut scanner = scanner(matcher, Some(template(100)), Some(template(100)));
        let mut window = NullWindowAccess::new();

        assert_eq!(
            scanner.watering_can_status(&mut window).unwrap(),
            CanStatus::Unknown
        );
    }

    #[test]
    fn test_can_empty_when_only_empty_matches() {
        // Both templates share a size so they see the same score table;
        // drop the full template so only empty can win
        let matcher = ScriptedMatcher::with_scores(vec![(100, 0.9)]);
        let mut scanner = scanner(matcher, None, Some(template(100)));
        let mut window = NullWindowAccess::new();

        assert_eq!(
            scanner.watering_can_status(&mut window).unwrap(),
            CanStatus::Empty
        );
    }

    #[test]
    fn test_all_scales_tried() {
        let matcher = Arc::new(ScriptedMatcher::with_scores(vec![]));
        let mut scanner = InventoryScanner::with_templates(
            Arc::clone(&matcher) as Arc<dyn TemplateMatcher>,
            Some(template(100)),
            None,
            Duration::ZERO,
        );
        let mut window = NullWindowAccess::new();

        scanner.watering_can_status(&mut window).unwrap();

        let mut widths: Vec<u32> = matcher
            .seen_sizes
            .lock()
            .unwrap()
            .iter()
            .map(|(w, _)| *w)
            .collect();
        widths.sort_unstable();
        assert_eq!(widths, vec![80, 90, 100, 110, 120]);
    }

    #[test]
    fn test_missing_templates_yield_unknown() {
        let matcher = ScriptedMatcher::with_scores(vec![(100, 0.95)]);
        let mut scanner = scanner(matcher, None, None);
        let mut window = NullWindowAccess::new();

        assert_eq!(
            scanner.watering_can_status(&mut window).unwrap(),
            CanStatus::Unknown
        );
    }

    #[test]
    fn test_find_chemical_offsets_into_screen_coordinates() {
        let matcher = ScriptedMatcher {
            score_by_width: vec![],
            text_hit: Some((Point { x: 40, y: 30 }, 0.9)),
            seen_sizes: Mutex::new(Vec::new()),
        };
        let scanner = scanner(matcher, None, None);
        let mut window = NullWindowAccess::new();

        let region = window.region_for_zone(Zone::Inventory);
        let point = scanner.find_chemical(&mut window, "ТЛЯ").unwrap().unwrap();
        assert_eq!(point.x, region.left + 40);
        assert_eq!(point.y, region.top + 30);
    }

    #[test]
    fn test_open_close_toggles_state() {
        struct CountingInput(u32);
        impl InputActuator for CountingInput {
            fn move_to(&mut self, _p: Point) -> Result<()> {
                Ok(())
            }
            fn click(&mut self) -> Result<()> {
                Ok(())
            }
            fn press(&mut self, key: &str) -> Result<()> {
                assert_eq!(key, "tab");
                self.0 += 1;
                Ok(())
            }
        }

        let matcher = ScriptedMatcher::with_scores(vec![]);
        let mut scanner = scanner(matcher, None, None);
        let mut input = CountingInput(0);

        scanner.open_inventory(&mut input).unwrap();
        assert!(scanner.is_open());
        // Already open: no second press
        scanner.open_inventory(&mut input).unwrap();
        assert_eq!(input.0, 1);

        scanner.close_inventory(&mut input).unwrap();
        assert!(!scanner.is_open());
        assert_eq!(input.0, 2);
    }
}
