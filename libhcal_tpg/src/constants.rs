// Linearization bit masks, one per front-end chip
pub const QIE8_LUT_BITMASK: u32 = 0x3FF;
pub const QIE10_LUT_BITMASK: u32 = 0x7FF;
pub const QIE11_LUT_BITMASK: u32 = 0x3FF;

// Largest linearized ET the upgrade compressors accept
pub const QIE10_MAX_LINEARIZATION_ET: u32 = 0x7FF;
pub const QIE11_MAX_LINEARIZATION_ET: u32 = 0x7FF;

// Tower boundaries
pub const HBHE_OVERLAP_TOWER: u32 = 16; // last tower on the barrel side
pub const LAST_FINEGRAIN_DEPTH: u32 = 6;
pub const LAST_FINEGRAIN_TOWER: u32 = 28;
pub const LAST_HBHE_TOWER: u32 = 28;
pub const HF_FIRST_TOWER_RCT: u32 = 29; // version 0
pub const HF_FIRST_TOWER_1X1: u32 = 30; // version 1
pub const HF_LAST_TOWER: u32 = 41;
pub const HF_CHANNEL_EXCLUDED_FROM_FG: u32 = 29;
pub const FIRST_10_DEGREE_TOWER: u32 = 21; // towers above this have doubled phi pitch
pub const NUMBER_OF_IPHI: u32 = 72;

// Forward readout
pub const HF_ANODES_PER_PAIR: usize = 4; // QIE10: two long, two short
pub const HF_LONG_ANODES: [usize; 2] = [0, 2];
pub const HF_SHORT_ANODES: [usize; 2] = [1, 3];
pub const HF_2017_AVERAGING_SHIFT: u32 = 2; // compensates the two halvings in the 2017 sum

// FED / front-end raw data
pub const MIN_HCAL_FED_ID: u16 = 700;
pub const MAX_HCAL_FED_ID: u16 = 731;
pub const MIN_FED_SIZE: usize = 12; // bytes
pub const SPIGOT_COUNT: usize = 15;
pub const DCC_HEADER_SIZE: usize = 12; // source id u16, spigot mask u16, spigot count u16, reserved
pub const HTR_RECORD_SIZE: usize = 8;
pub const HTR_ERROR_WORD_MASK: u32 = 0x1FFFF;
pub const HTR_FORMAT_ERROR_BIT: u32 = 0x800;
pub const FIBERS_PER_SPIGOT: u8 = 9;
pub const CHANNELS_PER_FIBER: u8 = 3;

// Output encoding
pub const COMPRESSED_ET_MAX: u16 = 0xFF;
pub const MAX_SCALE_SHIFT: u32 = u32::BITS - 1; // linear sums are u32
