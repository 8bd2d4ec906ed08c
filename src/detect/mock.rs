use rand::seq::SliceRandom;
use rand::Rng;

use super::result::DetectedObject;

/// Common household nouns used for simulated detections.
pub const DEFAULT_VOCABULARY: &[&str] = &[
    "pelota",
    "libro",
    "teléfono",
    "botella",
    "zapato",
    "reloj",
    "lápiz",
    "taza",
    "silla",
    "mesa",
    "ventana",
    "puerta",
    "coche",
    "árbol",
    "flor",
    "gato",
    "perro",
    "casa",
    "computadora",
    "televisión",
    "cama",
    "almohada",
    "espejo",
    "lámpara",
    "planta",
    "cuadro",
    "bolso",
    "gafas",
    "llaves",
    "moneda",
];

pub const DEFAULT_MIN_OBJECTS: usize = 8;
pub const DEFAULT_MAX_OBJECTS: usize = 12;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// Produces plausible, randomized detections with no I/O.
///
/// This is the fallback of last resort: it never fails, and returns a
/// non-empty list whenever the vocabulary is non-empty.
#[derive(Clone, Debug)]
pub struct MockResultGenerator {
    vocabulary: Vec<String>,
    min_objects: usize,
    max_objects: usize,
    min_confidence: f64,
}

impl Default for MockResultGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResultGenerator {
    pub fn new() -> Self {
        Self {
            vocabulary: DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect(),
            min_objects: DEFAULT_MIN_OBJECTS,
            max_objects: DEFAULT_MAX_OBJECTS,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    /// Replace the vocabulary. Blank and duplicate entries are dropped; an
    /// input with no usable words leaves the current vocabulary in place.
    pub fn with_vocabulary<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut vocabulary: Vec<String> = Vec::new();
        for word in words {
            let word: String = word.into();
            let word = word.trim().to_string();
            if !word.is_empty() && !vocabulary.contains(&word) {
                vocabulary.push(word);
            }
        }
        if !vocabulary.is_empty() {
            self.vocabulary = vocabulary;
        }
        self
    }

    /// Inclusive range for the number of objects per call. A zero minimum is
    /// raised to one and the bounds are reordered when given backwards.
    pub fn with_count_range(mut self, min_objects: usize, max_objects: usize) -> Self {
        let (lo, hi) = if min_objects <= max_objects {
            (min_objects, max_objects)
        } else {
            (max_objects, min_objects)
        };
        self.min_objects = lo.max(1);
        self.max_objects = hi.max(1);
        self
    }

    /// Confidence floor; values are drawn from `[floor, 1.0)`.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        if min_confidence.is_finite() && (0.0..1.0).contains(&min_confidence) {
            self.min_confidence = min_confidence;
        }
        self
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn count_range(&self) -> (usize, usize) {
        (self.min_objects, self.max_objects)
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    pub fn generate(&self) -> Vec<DetectedObject> {
        self.generate_with(&mut rand::thread_rng())
    }

    /// Same as [`generate`](Self::generate) with a caller-supplied RNG.
    pub fn generate_with<R: Rng>(&self, rng: &mut R) -> Vec<DetectedObject> {
        let count = rng
            .gen_range(self.min_objects..=self.max_objects)
            .min(self.vocabulary.len());
        self.vocabulary
            .choose_multiple(rng, count)
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|name| {
                let confidence = rng.gen_range(self.min_confidence..1.0);
                DetectedObject::new(name.clone(), confidence)
            })
            .collect()
    }
}
