//! Recognition adapter: multi-attempt OCR with transcript fusion.
//!
//! The engine is tried with several (language set, mode) configurations per
//! frame; the attempt with the best mean word confidence wins. Identical
//! frames within a short window are answered from a one-slot cache keyed by
//! a perceptual hash, so a static screen does not burn OCR time every cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, RgbaImage};
use image_hasher::{HashAlg, Hasher, HasherConfig};

use crate::collaborators::{OcrEngine, OcrLine, OcrMode};

/// Attempt order. Mixed-language block mode first; sparse mode catches
/// scattered UI labels, the narrower sets catch frames the mixed pass garbles.
const OCR_ATTEMPTS: &[(&str, OcrMode)] = &[
    ("ukr+rus+eng", OcrMode::Block),
    ("ukr+rus+eng", OcrMode::Sparse),
    ("rus+eng", OcrMode::Block),
    ("ukr", OcrMode::Block),
];

/// Words at or below this engine confidence (0..100) are discarded.
const WORD_CONFIDENCE_FLOOR: f32 = 30.0;

/// Side length of the corner crop hashed for the cache key. Big enough to
/// distinguish frames, small enough to hash in microseconds.
const HASH_CROP_SIZE: u32 = 48;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3);

/// Fused OCR output for one frame.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    pub text: String,
    /// Mean word confidence of the winning attempt, 0.0..=1.0.
    pub confidence: f32,
    pub lines: Vec<String>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Runs the attempt ladder against an [`OcrEngine`] and caches the result.
pub struct RecognitionAdapter {
    engine: Arc<dyn OcrEngine>,
    hasher: Hasher,
    cache: Option<CacheSlot>,
    cache_ttl: Duration,
}

struct CacheSlot {
    key: String,
    stored_at: Instant,
    transcript: Transcript,
}

impl RecognitionAdapter {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self::with_cache_ttl(engine, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(engine: Arc<dyn OcrEngine>, cache_ttl: Duration) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::DoubleGradient)
            .to_hasher();
        Self {
            engine,
            hasher,
            cache: None,
            cache_ttl,
        }
    }

    /// Recognizes one frame, serving an unexpired cache hit when the frame
    /// hashes to the same key as the previous one.
    pub fn recognize(&mut self, image: &RgbaImage) -> Transcript {
        let key = self.frame_key(image);
        let now = Instant::now();

        if let Some(slot) = &self.cache {
            if slot.key == key && now.duration_since(slot.stored_at) < self.cache_ttl {
                return slot.transcript.clone();
            }
        }

        let transcript = self.recognize_uncached(image);

        // Empty transcripts are not cached: the next cycle should retry
        if !transcript.is_empty() {
            self.cache = Some(CacheSlot {
                key,
                stored_at: now,
                transcript: transcript.clone(),
            });
        }

        transcript
    }

    /// Runs every attempt and keeps the one with the best mean confidence.
    /// Engine errors are swallowed per attempt; total failure yields an
    /// empty transcript with confidence 0.
    fn recognize_uncached(&self, image: &RgbaImage) -> Transcript {
        let mut best = Transcript::default();

        for &(languages, mode) in OCR_ATTEMPTS {
            let lines = match self.engine.recognize(image, languages, mode) {
                Ok(lines) => lines,
                Err(e) => {
                    crate::log(&format!("OCR attempt {}/{:?} failed: {}", languages, mode, e));
                    continue;
                }
            };

            let candidate = fuse_lines(&lines);
            if !candidate.is_empty() && candidate.confidence > best.confidence {
                best = candidate;
            }
        }

        best
    }

    /// Perceptual hash of a corner crop, stable across identical frames.
    fn frame_key(&self, image: &RgbaImage) -> String {
        let w = image.width().min(HASH_CROP_SIZE);
        let h = image.height().min(HASH_CROP_SIZE);
        let crop = image::imageops::crop_imm(image, 0, 0, w.max(1), h.max(1)).to_image();
        self.hasher.hash_image(&DynamicImage::ImageRgba8(crop)).to_base64()
    }
}

/// Drops low-confidence words, rebuilds each line from its survivors and
/// joins the surviving lines into one transcript.
fn fuse_lines(lines: &[OcrLine]) -> Transcript {
    let mut kept_lines = Vec::new();
    let mut confidence_sum = 0.0f32;
    let mut kept_words = 0usize;

    for line in lines {
        let survivors: Vec<&str> = line
            .words
            .iter()
            .filter(|w| w.confidence > WORD_CONFIDENCE_FLOOR && !w.text.trim().is_empty())
            .map(|w| {
                confidence_sum += w.confidence;
                kept_words += 1;
                w.text.trim()
            })
            .collect();

        if !survivors.is_empty() {
            kept_lines.push(survivors.join(" "));
        }
    }

    if kept_words == 0 {
        return Transcript::default();
    }

    Transcript {
        text: kept_lines.join(" "),
        confidence: confidence_sum / kept_words as f32 / 100.0,
        lines: kept_lines,
    }
}
