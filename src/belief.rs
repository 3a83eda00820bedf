//! Belief extraction: recognized text in, structured game facts out.
//!
//! Everything in this module is a pure function of (lowercased text, static
//! catalog). Keyword sets and regex patterns mirror the game's Ukrainian and
//! Russian UI strings, with English fallbacks for mixed-language frames.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;

use crate::catalog::{PestCatalog, PestDefinition};

/// Word-level similarity floor for OCR-error-tolerant pest matching.
const FUZZY_THRESHOLD: f64 = 0.8;
/// Variant tokens shorter than this are too ambiguous for fuzzy matching.
const FUZZY_MIN_TOKEN_LEN: usize = 3;

/// Which game screen the analyzed frame belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ScreenKind {
    Gameplay,
    Inventory,
    Shop,
    Menu,
    #[default]
    Unknown,
}

/// UI element categories tagged from keyword hits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiElement {
    WateringButton,
    ChemicalButton,
    StatusBar,
    Inventory,
}

/// Structured interpretation of one analyzed frame.
///
/// Built fresh every cycle, immutable once extracted; anything that must
/// outlive the cycle goes into `GameContext` instead.
#[derive(Clone, Debug, Default)]
pub struct ScreenBelief {
    pub text: String,
    pub text_confidence: f32,
    pub lines: Vec<String>,

    pub pests: Vec<Arc<PestDefinition>>,
    pub water_low: bool,
    pub water_amount: Option<f32>,
    pub needs_fertilizer: bool,
    pub soil_level: Option<u8>,

    pub screen: ScreenKind,
    pub ui_elements: Vec<UiElement>,

    pub confidence: f32,
    /// Time spent extracting this belief.
    pub elapsed: Duration,
}

impl ScreenBelief {
    /// Short description for logging, empty if nothing was detected.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.pests.is_empty() {
            let names: Vec<&str> = self.pests.iter().map(|p| p.name.as_str()).collect();
            parts.push(format!("{} pest(s): {}", self.pests.len(), names.join(", ")));
        }
        if self.water_low {
            parts.push("water low".to_string());
        }
        if let Some(amount) = self.water_amount {
            parts.push(format!("needs {:.1}L", amount));
        }
        if self.needs_fertilizer {
            parts.push("fertilizer".to_string());
        }
        if let Some(soil) = self.soil_level {
            parts.push(format!("soil {}%", soil));
        }
        parts.join(" | ")
    }
}

/// Extracts all facts from one transcript. The text is lowercased once here;
/// every matcher below assumes lowercase input.
pub fn extract(
    text: &str,
    text_confidence: f32,
    lines: &[String],
    catalog: &PestCatalog,
) -> ScreenBelief {
    let started = std::time::Instant::now();
    let lower = text.to_lowercase();

    let mut belief = ScreenBelief {
        text: text.to_string(),
        text_confidence,
        lines: lines.to_vec(),
        ..Default::default()
    };

    if lower.trim().is_empty() {
        belief.elapsed = started.elapsed();
        return belief;
    }

    belief.screen = classify_screen(&lower);
    belief.pests = detect_pests(&lower, catalog);
    let (low, amount) = analyze_water_status(&lower);
    belief.water_low = low;
    belief.water_amount = amount;
    belief.needs_fertilizer = needs_fertilizer(&lower);
    belief.soil_level = parse_soil_level(&lower);
    belief.ui_elements = detect_ui_elements(&lower);
    belief.confidence = score(&belief);
    belief.elapsed = started.elapsed();

    belief
}

/// First-match screen classifier; keyword sets are checked in priority order.
pub fn classify_screen(text: &str) -> ScreenKind {
    const GAMEPLAY: &[&str] = &["полив", "грунт", "рослин", "цибул", "добрив"];
    const INVENTORY: &[&str] = &["інвентар", "inventory", "предмет", "хімікат"];
    const SHOP: &[&str] = &["магазин", "shop", "купити", "продати"];
    const MENU: &[&str] = &["меню", "menu", "налаштування", "settings"];

    if GAMEPLAY.iter().any(|kw| text.contains(kw)) {
        ScreenKind::Gameplay
    } else if INVENTORY.iter().any(|kw| text.contains(kw)) {
        ScreenKind::Inventory
    } else if SHOP.iter().any(|kw| text.contains(kw)) {
        ScreenKind::Shop
    } else if MENU.iter().any(|kw| text.contains(kw)) {
        ScreenKind::Menu
    } else {
        ScreenKind::Unknown
    }
}

/// Finds catalog pests mentioned in the text. Each entry appears at most
/// once; the first matching variant stops the search for that entry.
pub fn detect_pests(text: &str, catalog: &PestCatalog) -> Vec<Arc<PestDefinition>> {
    let text_words: Vec<&str> = text.split_whitespace().collect();
    let mut found = Vec::new();

    for entry in catalog.iter() {
        for variant in &entry.name_variants {
            let variant_lower = variant.to_lowercase();

            if text.contains(&variant_lower) || fuzzy_match(&variant_lower, &text_words) {
                found.push(Arc::clone(entry));
                break;
            }
        }
    }

    found
}

/// Token-level fuzzy match: any variant token of length >= 3 within
/// edit-similarity 0.8 of any text word counts as a hit.
fn fuzzy_match(variant: &str, text_words: &[&str]) -> bool {
    for token in variant.split_whitespace() {
        if token.chars().count() < FUZZY_MIN_TOKEN_LEN {
            continue;
        }
        for word in text_words {
            if token_similarity(token, word) >= FUZZY_THRESHOLD {
                return true;
            }
        }
    }
    false
}

/// Normalized edit similarity between two tokens: 1.0 for identical,
/// 0.0 for completely different.
fn token_similarity(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let max_len = a_chars.len().max(b_chars.len());
    if max_len == 0 {
        return 1.0;
    }
    let dist = edit_distance(&a_chars, &b_chars);
    1.0 - dist as f64 / max_len as f64
}

fn edit_distance(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];

    for (i, &ac) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, &bc) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ac != bc);
            cur[j + 1] = sub.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[b.len()]
}

/// Liter amounts outside this range are OCR noise, not requests.
const AMOUNT_RANGE: (f32, f32) = (0.5, 10.0);

fn amount_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(\d+[\.,]?\d*)\s*л",
            r"(\d+[\.,]?\d*)\s*літр",
            r"води.*?(\d+[\.,]?\d*)",
            r"налити.*?(\d+[\.,]?\d*)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("amount pattern"))
        .collect()
    })
}

/// Detects the water-shortage flag and tries to parse a requested amount.
pub fn analyze_water_status(text: &str) -> (bool, Option<f32>) {
    const LOW_WATER_KEYWORDS: &[&str] = &[
        "мало води",
        "низьк",
        "недостатн",
        "потрібн",
        "треба полив",
        "додати вод",
        "долити",
        "water low",
        "need water",
    ];

    let low = LOW_WATER_KEYWORDS.iter().any(|kw| text.contains(kw));

    let mut amount = None;
    for pattern in amount_patterns() {
        if let Some(caps) = pattern.captures(text) {
            if let Ok(value) = caps[1].replace(',', ".").parse::<f32>() {
                if (AMOUNT_RANGE.0..=AMOUNT_RANGE.1).contains(&value) {
                    amount = Some(value);
                    break;
                }
                // Out of range: parse noise, fall through to the next pattern
            }
        }
    }

    (low, amount)
}

/// Boolean OR over the fertilizer keyword set.
pub fn needs_fertilizer(text: &str) -> bool {
    const FERTILIZER_KEYWORDS: &[&str] = &[
        "добрив",
        "азотн",
        "fertilizer",
        "nitrogen",
        "підживлення",
        "удобрение",
    ];
    FERTILIZER_KEYWORDS.iter().any(|kw| text.contains(kw))
}

fn soil_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"грунт.*?(\d+)\s*%",
            r"soil.*?(\d+)\s*%",
            r"земл.*?(\d+)\s*%",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("soil pattern"))
        .collect()
    })
}

/// Parses a soil percentage; values outside 0..=100 are rejected.
pub fn parse_soil_level(text: &str) -> Option<u8> {
    for pattern in soil_patterns() {
        if let Some(caps) = pattern.captures(text) {
            if let Ok(level) = caps[1].parse::<u32>() {
                if level <= 100 {
                    return Some(level as u8);
                }
            }
        }
    }
    None
}

/// Tags UI element categories whose keywords appear in the text.
pub fn detect_ui_elements(text: &str) -> Vec<UiElement> {
    const UI_KEYWORDS: &[(UiElement, &[&str])] = &[
        (UiElement::WateringButton, &["полити", "water", "лейка"]),
        (UiElement::ChemicalButton, &["хімікат", "chemical", "обробити"]),
        (UiElement::StatusBar, &["здоров", "health", "енергія", "energy"]),
        (UiElement::Inventory, &["інвентар", "inventory"]),
    ];

    UI_KEYWORDS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(element, _)| *element)
        .collect()
}

/// Aggregate confidence: an additive heuristic gating whether any action is
/// worth taking, capped at 1.0. Not a probability.
pub fn score(belief: &ScreenBelief) -> f32 {
    let mut score = 0.0f32;

    if belief.text_confidence > 0.7 {
        score += 0.3;
    } else if belief.text_confidence > 0.5 {
        score += 0.2;
    } else if belief.text_confidence > 0.3 {
        score += 0.1;
    }

    if !belief.pests.is_empty() {
        score += 0.4;
    }
    if belief.water_low {
        score += 0.2;
    }
    if belief.water_amount.is_some() {
        score += 0.1;
    }
    if !belief.ui_elements.is_empty() {
        score += 0.1;
    }

    score.min(1.0)
}
