use bit_set::BitSet;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::constants::{
    DCC_HEADER_SIZE, HTR_ERROR_WORD_MASK, HTR_FORMAT_ERROR_BIT, HTR_RECORD_SIZE, MAX_HCAL_FED_ID,
    MIN_FED_SIZE, MIN_HCAL_FED_ID, SPIGOT_COUNT,
};
use super::error::RawDataError;

const HTR_CHECK_OK: u8 = 0b01;
const HTR_HISTOGRAM: u8 = 0b10;

/// The raw payload of one front-end driver (FED) for one event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FedBlock {
    pub fed_id: u16,
    pub data: Vec<u8>,
}

/// All FED blocks of an event
pub type RawDataCollection = Vec<FedBlock>;

/// The data concentrator card (DCC) header at the start of every HCAL FED block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccHeader {
    pub source_id: u16,
    pub spigots_present: BitSet,
    pub spigot_count: u16,
}

impl DccHeader {
    pub fn is_spigot_present(&self, spigot: usize) -> bool {
        self.spigots_present.contains(spigot)
    }
}

/// The summary record an HTR card leaves in its spigot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HtrRecord {
    pub crate_id: u8,
    pub slot: u8,
    pub top_bottom: u8,
    pub flags: u8,
    pub error_word: u32,
}

impl HtrRecord {
    /// Whether the HTR payload passed its internal consistency check
    pub fn check(&self) -> bool {
        self.flags & HTR_CHECK_OK != 0
    }

    pub fn is_histogram_event(&self) -> bool {
        self.flags & HTR_HISTOGRAM != 0
    }

    pub fn errors_word(&self) -> u32 {
        self.error_word & HTR_ERROR_WORD_MASK
    }

    /// A front-end format error: failed check, histogram data, or the format
    /// error bit of the error word
    pub fn has_format_error(&self) -> bool {
        !self.check() || self.is_histogram_event() || (self.errors_word() & HTR_FORMAT_ERROR_BIT) != 0
    }
}

/// A decoded HCAL FED block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFed {
    pub header: DccHeader,
    /// (spigot, record) for every present spigot
    pub spigots: Vec<(usize, HtrRecord)>,
}

pub fn is_hcal_fed(fed_id: u16) -> bool {
    (MIN_HCAL_FED_ID..=MAX_HCAL_FED_ID).contains(&fed_id)
}

impl FedBlock {
    /// Decode the DCC header and the HTR record of every present spigot.
    ///
    /// Layout (little endian):
    /// - header: source id (u16), spigot-present mask (u16), spigot count (u16), 6 reserved bytes
    /// - one record per spigot slot, in spigot order: crate (u8), slot (u8),
    ///   top/bottom (u8), flags (u8), error word (u32)
    pub fn decode(&self) -> Result<DecodedFed, RawDataError> {
        if self.data.len() < MIN_FED_SIZE {
            return Err(RawDataError::TooSmall(self.fed_id, self.data.len()));
        }
        let mut cursor = Cursor::new(self.data.as_slice());
        let source_id = cursor.read_u16::<LittleEndian>()?;
        let mask = cursor.read_u16::<LittleEndian>()?;
        let spigot_count = cursor.read_u16::<LittleEndian>()?;

        let mut spigots_present = BitSet::with_capacity(SPIGOT_COUNT);
        for spigot in 0..SPIGOT_COUNT {
            if mask & (1 << spigot) != 0 {
                spigots_present.insert(spigot);
            }
        }
        let header = DccHeader {
            source_id,
            spigots_present,
            spigot_count,
        };

        let mut spigots = Vec::new();
        for spigot in header.spigots_present.iter() {
            let offset = DCC_HEADER_SIZE + spigot * HTR_RECORD_SIZE;
            if offset + HTR_RECORD_SIZE > self.data.len() {
                return Err(RawDataError::TruncatedSpigot(self.fed_id, spigot));
            }
            cursor.set_position(offset as u64);
            let record = HtrRecord {
                crate_id: cursor.read_u8()?,
                slot: cursor.read_u8()?,
                top_bottom: cursor.read_u8()?,
                flags: cursor.read_u8()?,
                error_word: cursor.read_u32::<LittleEndian>()?,
            };
            spigots.push((spigot, record));
        }

        Ok(DecodedFed { header, spigots })
    }

    /// Build a block from HTR records. Spigots not listed are marked absent.
    pub fn from_records(fed_id: u16, records: &[(usize, HtrRecord)]) -> Result<Self, RawDataError> {
        let mut mask: u16 = 0;
        let mut last_spigot = 0;
        for (spigot, _) in records {
            if *spigot >= SPIGOT_COUNT {
                return Err(RawDataError::TruncatedSpigot(fed_id, *spigot));
            }
            mask |= 1 << spigot;
            last_spigot = last_spigot.max(*spigot + 1);
        }

        let size = DCC_HEADER_SIZE + last_spigot * HTR_RECORD_SIZE;
        let mut data: Vec<u8> = Vec::with_capacity(size);
        data.write_u16::<LittleEndian>(fed_id)?;
        data.write_u16::<LittleEndian>(mask)?;
        data.write_u16::<LittleEndian>(last_spigot as u16)?;
        data.resize(size, 0);
        for (spigot, record) in records {
            let mut slot = &mut data[DCC_HEADER_SIZE + spigot * HTR_RECORD_SIZE..][..HTR_RECORD_SIZE];
            slot.write_u8(record.crate_id)?;
            slot.write_u8(record.slot)?;
            slot.write_u8(record.top_bottom)?;
            slot.write_u8(record.flags)?;
            slot.write_u32::<LittleEndian>(record.error_word)?;
        }
        Ok(Self { fed_id, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_record() -> HtrRecord {
        HtrRecord {
            crate_id: 0,
            slot: 1,
            top_bottom: 0,
            flags: HTR_CHECK_OK,
            error_word: 0,
        }
    }

    #[test]
    fn test_decode_present_spigots() {
        let mut bad = good_record();
        bad.error_word = 0x800;
        let block = FedBlock::from_records(702, &[(0, good_record()), (3, bad)]).unwrap();
        let decoded = block.decode().unwrap();
        assert_eq!(decoded.header.source_id, 702);
        assert!(decoded.header.is_spigot_present(0));
        assert!(!decoded.header.is_spigot_present(1));
        assert!(decoded.header.is_spigot_present(3));
        assert_eq!(decoded.spigots.len(), 2);
        assert!(!decoded.spigots[0].1.has_format_error());
        assert_eq!(decoded.spigots[1].0, 3);
        assert!(decoded.spigots[1].1.has_format_error());
    }

    #[test]
    fn test_error_conditions() {
        let mut record = good_record();
        record.flags = 0;
        assert!(record.has_format_error());
        record.flags = HTR_CHECK_OK | HTR_HISTOGRAM;
        assert!(record.has_format_error());
        record.flags = HTR_CHECK_OK;
        // bits outside the error word are ignored
        record.error_word = 0x20000 | 0x400;
        assert!(!record.has_format_error());
    }

    #[test]
    fn test_short_blocks() {
        let tiny = FedBlock {
            fed_id: 700,
            data: vec![0; 8],
        };
        assert!(matches!(tiny.decode(), Err(RawDataError::TooSmall(700, 8))));

        // header claims spigot 2 but the record is missing
        let mut data = vec![0u8; DCC_HEADER_SIZE];
        data[2] = 0b100;
        let truncated = FedBlock { fed_id: 701, data };
        assert!(matches!(
            truncated.decode(),
            Err(RawDataError::TruncatedSpigot(701, 2))
        ));
    }

    #[test]
    fn test_hcal_fed_range() {
        assert!(is_hcal_fed(700));
        assert!(is_hcal_fed(731));
        assert!(!is_hcal_fed(699));
        assert!(!is_hcal_fed(732));
    }
}
