//! Static pest catalog.
//!
//! Maps pest names (and their OCR-error-tolerant variants) to treatment
//! parameters. Loaded once at startup and shared read-only for the process
//! lifetime; the built-in entries can be replaced from config.json.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Chemical category a pest treatment belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PestCategory {
    Biological,
    Systemic,
    Intestinal,
    Contact,
}

/// Treatment definition for one pest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PestDefinition {
    /// Canonical display name, as shown by the game.
    pub name: String,
    /// Name variants checked against OCR output, including common misreads.
    pub name_variants: Vec<String>,
    /// Treatment dosage range in liters (min, max).
    pub dose_range: (f32, f32),
    /// Treatment duration in seconds.
    pub duration_secs: u32,
    /// Direct key binding for the chemical, empty if none.
    pub key: String,
    pub category: PestCategory,
}

impl PestDefinition {
    /// Dosage actually applied: the midpoint of the configured range.
    pub fn dose(&self) -> f32 {
        (self.dose_range.0 + self.dose_range.1) / 2.0
    }
}

/// Read-only pest catalog. Entry order is match-priority order.
#[derive(Clone, Debug, Default)]
pub struct PestCatalog {
    entries: Vec<Arc<PestDefinition>>,
}

impl PestCatalog {
    pub fn new(definitions: Vec<PestDefinition>) -> Self {
        Self {
            entries: definitions.into_iter().map(Arc::new).collect(),
        }
    }

    /// The built-in catalog covering every pest the game currently spawns.
    pub fn builtin() -> Self {
        Self::new(builtin_definitions())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PestDefinition>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn pest(
    name: &str,
    variants: &[&str],
    dose_range: (f32, f32),
    duration_secs: u32,
    key: &str,
    category: PestCategory,
) -> PestDefinition {
    PestDefinition {
        name: name.to_string(),
        name_variants: variants.iter().map(|v| v.to_string()).collect(),
        dose_range,
        duration_secs,
        key: key.to_string(),
        category,
    }
}

fn builtin_definitions() -> Vec<PestDefinition> {
    use PestCategory::*;
    vec![
        pest(
            "ТЛЯ",
            &["тля", "тли", "tля", "tli", "aphid", "тл", "тлi"],
            (2.0, 2.4),
            120,
            "2",
            Biological,
        ),
        pest(
            "ГОЛЫЕ СЛИЗНИ",
            &[
                "голые слизни",
                "слизни",
                "голі слизні",
                "слизень",
                "slug",
                "slugs",
                "голi слизнi",
            ],
            (2.0, 2.4),
            120,
            "3",
            Biological,
        ),
        pest(
            "КОЛОРАДСКИЙ ЖУК",
            &[
                "колорадский жук",
                "колорадський жук",
                "жук",
                "colorado beetle",
                "beetle",
                "колорадський",
            ],
            (2.0, 2.4),
            120,
            "4",
            Biological,
        ),
        pest(
            "ЖУК-ЩЕЛКУН",
            &["жук-щелкун", "щелкун", "жук щелкун", "click beetle"],
            (1.0, 1.6),
            80,
            "1",
            Systemic,
        ),
        pest(
            "КРАВЧИК-ГОЛОВАЧ",
            &["кравчик-головач", "кравчик", "головач", "kravchyk"],
            (1.0, 1.6),
            80,
            "1",
            Systemic,
        ),
        pest(
            "МЕДВЕДКА",
            &["медведка", "медведь", "mole cricket", "медвiдка"],
            (4.0, 4.7),
            120,
            "5",
            Intestinal,
        ),
        pest(
            "ПРОВОЛОЧНИК",
            &["проволочник", "wireworm", "проволочнiк"],
            (4.0, 4.7),
            120,
            "6",
            Intestinal,
        ),
        pest(
            "ГАЛЛОВА НЕМАТОДА",
            &["нематода", "галлова нематода", "галова", "nematode", "галлова"],
            (4.0, 4.7),
            120,
            "7",
            Intestinal,
        ),
        pest(
            "ТРИПС",
            &["трипс", "трипси", "thrips", "трiпс"],
            (3.0, 3.5),
            150,
            "8",
            Contact,
        ),
        pest(
            "ПАУТИННЫЙ КЛЕЩ",
            &[
                "паутинный клещ",
                "павутинний кліщ",
                "клещ",
                "кліщ",
                "spider mite",
                "mite",
                "павутинний",
            ],
            (3.0, 3.5),
            150,
            "9",
            Contact,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_has_all_pests() {
        let catalog = PestCatalog::builtin();
        assert_eq!(catalog.len(), 10);
    }

    #[test]
    fn test_dose_is_range_midpoint() {
        let catalog = PestCatalog::builtin();
        let aphid = catalog.iter().find(|p| p.name == "ТЛЯ").unwrap();
        assert!((aphid.dose() - 2.2).abs() < 1e-6);
    }

    #[test]
    fn test_every_entry_has_variants_and_key() {
        for entry in PestCatalog::builtin().iter() {
            assert!(!entry.name_variants.is_empty(), "{} has no variants", entry.name);
            assert!(!entry.key.is_empty(), "{} has no key binding", entry.name);
            assert!(entry.dose_range.0 <= entry.dose_range.1);
        }
    }
}
