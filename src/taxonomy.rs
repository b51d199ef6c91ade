//! Fixed emotion taxonomy
//!
//! The engine operates over a 15-category affect taxonomy. Every emotion-state
//! vector is a probability distribution over these categories, in this order.
//! The band partition (positive / neutral-mixed / negative) follows the index
//! ranges used by the risk heuristic; note that the taxonomy ordering predates
//! the band partition, so individual category names do not always match their
//! band (happiness sits at index 11, inside the negative index range). The
//! ordering is frozen for artifact compatibility.

/// Number of categories in the emotion taxonomy
pub const EMOTION_DIM: usize = 15;

/// Category names, index-aligned with every emotion-state vector
pub const EMOTION_NAMES: [&str; EMOTION_DIM] = [
    "amusement",
    "anger",
    "anxiety",
    "awe",
    "concentration",
    "confusion",
    "contempt",
    "contentment",
    "disappointment",
    "disgust",
    "excitement",
    "happiness",
    "interest",
    "pain",
    "sadness",
];

/// Positive band: indices `[0, POSITIVE_BAND_END)`
pub const POSITIVE_BAND_END: usize = 6;

/// Negative band: indices `[NEGATIVE_BAND_START, EMOTION_DIM)`
pub const NEGATIVE_BAND_START: usize = 11;

/// Index of anxiety
pub const IDX_ANXIETY: usize = 2;
/// Index of contentment
pub const IDX_CONTENTMENT: usize = 7;
/// Index of disgust
pub const IDX_DISGUST: usize = 9;
/// Index of happiness
pub const IDX_HAPPINESS: usize = 11;
/// Index of sadness
pub const IDX_SADNESS: usize = 14;
