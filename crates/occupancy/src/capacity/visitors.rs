use crate::{
    building::{Level, SubCategory},
    constants::VISITOR_BANDS
};

// ----------------------------------------------
// Visitor demand
// ----------------------------------------------

// Only shops draw visitors.
pub fn sub_category_multiplier(sub_category: SubCategory) -> f64 {
    match sub_category {
        SubCategory::CommercialLow     => 1.0,
        SubCategory::CommercialHigh    => 1.25,
        SubCategory::CommercialLeisure => 1.5,
        SubCategory::CommercialTourist => 1.75,
        SubCategory::CommercialEco     => 0.8,
        _ => 0.0,
    }
}

pub fn level_multiplier(level: Level) -> f64 {
    match level {
        Level::Level1 => 1.0,
        Level::Level2 => 1.1,
        Level::Level3 => 1.2,
        Level::Level4 => 1.3,
        Level::Level5 => 1.4,
    }
}

// Piecewise-linear diminishing demand. Continuous at every band start.
pub fn band_visitors(raw: f64) -> f64 {
    if raw.is_nan() || raw <= 0.0 {
        return 0.0;
    }

    let (start, value, slope) = VISITOR_BANDS
        .iter()
        .rev()
        .find(|(start, _, _)| raw >= *start)
        .copied()
        .unwrap_or(VISITOR_BANDS[0]);

    value + slope * (raw - start)
}

pub fn compute_visitor_count(total_workers: u32, sub_category: SubCategory, level: Level) -> u32 {
    let raw = total_workers as f64 * sub_category_multiplier(sub_category) * level_multiplier(level);
    (band_visitors(raw).floor() as u32).max(1)
}
