// Occupant units are fixed-size blocks; the slot count is part of the record layout.
pub const UNIT_SLOT_COUNT: usize = 5;

// Hard ceiling on list walks. Matches the size of the host's occupant record
// buffer, so a walk this long can only mean the list loops back on itself.
pub const MAX_LIST_ITERATIONS: usize = 1 << 19;

// Pool allocation hints.
pub const DEFAULT_UNIT_POOL_CAPACITY: usize = 1 << 19;
pub const UNIT_POOL_INITIAL_RESERVE:  usize = 1024;

// We reserve generation 0 as a sentinel value to detect uninitialized handles.
pub const INITIAL_GENERATION:  u32 = 1;
pub const RESERVED_GENERATION: u32 = 0;

pub const DEFAULT_RANDOM_SEED: u64 = 0xCAFE1CAFE2CAFE3A;

// Capacity formulas:
pub const DEGENERATE_FOOTPRINT_SCALE:   f64 = 6.0;
// High density homes keep at least 90% of their floor count, rounded up.
pub const HIGH_DENSITY_FLOOR_PERCENT:   u32 = 90;
pub const HIGH_DENSITY_MIN_HOUSEHOLDS:  u32 = 2;

// Pack parameters below these are treated as these.
pub const MIN_FLOOR_HEIGHT:   f64 = 1.0;
pub const MIN_AREA_PER_UNIT:  f64 = 1.0;

// Tier promotion rolls, [0,100) minus a per-tier penalty must beat the threshold.
pub const PROMOTION_THRESHOLD:    i32 = 50;
pub const PROMOTION_TIER_PENALTY: i32 = 15;

// Visitor demand bands: (band start, value at band start, slope inside band).
pub const VISITOR_BANDS: [(f64, f64, f64); 4] = [
    (0.0,   0.0,   1.0),
    (200.0, 200.0, 0.75),
    (400.0, 350.0, 0.5),
    (600.0, 450.0, 0.25),
];
