// The electronics map ties a readout address to the detector channel it
// reads. The raw data only knows where a bad fiber plugs in:
// [crate, slot, top/bottom, fiber, fiber channel] -> channel
// The DCC and spigot are redundant once the HTR location is known, so the key
// is built from the HTR half and the fiber alone.
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use fxhash::FxHashMap;

use super::detid::{generate_uuid, ChannelId, ElectronicsId, Subdetector};
use super::error::ElectronicsMapError;

const ENTRIES_PER_LINE: usize = 9; //Number of elements in a single row in the CSV file

/// Load the default map for windows
#[cfg(target_family = "windows")]
fn load_default_map() -> String {
    String::from(include_str!("data\\default_emap.csv"))
}

/// Load the default map for macos and linux
#[cfg(target_family = "unix")]
fn load_default_map() -> String {
    String::from(include_str!("data/default_emap.csv"))
}

/// Lookup of the channel read out at an electronics address.
pub trait ElectronicsMap {
    fn lookup(&self, eid: &ElectronicsId) -> Option<ChannelId>;
}

/// CsvElectronicsMap contains the mapping of HTR fiber channels (crate, slot, top/bottom, fiber, fiber channel) to HCAL channels.
///
/// This changes with the readout configuration, so the map reads in a CSV file where each row contains 9 elements. The first five are the
/// electronics identifiers (in the order listed previously), followed by the subdetector keyword (HB, HE, HO, HF), ieta, iphi and depth.
#[derive(Debug, Clone, Default)]
pub struct CsvElectronicsMap {
    map: FxHashMap<u64, ChannelId>,
}

impl CsvElectronicsMap {
    /// Create a new CsvElectronicsMap
    /// If the path is None, we load the default that is bundled with the library
    pub fn new(path: Option<&Path>) -> Result<Self, ElectronicsMapError> {
        let mut contents = String::new();
        if let Some(p) = path {
            let mut file = File::open(p)?;
            file.read_to_string(&mut contents)?;
        } else {
            contents = load_default_map();
        }
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self, ElectronicsMapError> {
        let mut em = CsvElectronicsMap::default();

        let mut lines = contents.lines();
        lines.next(); // Skip the header
        for line in lines {
            if line.trim().is_empty() {
                continue;
            }
            let entries: Vec<&str> = line.split_terminator(",").collect();
            if entries.len() != ENTRIES_PER_LINE {
                return Err(ElectronicsMapError::BadFileFormat);
            }

            let crate_id: u8 = entries[0].parse()?;
            let slot: u8 = entries[1].parse()?;
            let top_bottom: u8 = entries[2].parse()?;
            let fiber: u8 = entries[3].parse()?;
            let fiber_channel: u8 = entries[4].parse()?;
            let subdet = Subdetector::from_str(entries[5])?;
            let channel = ChannelId::new(
                subdet,
                entries[6].parse()?,
                entries[7].parse()?,
                entries[8].parse()?,
            );

            let uuid = generate_uuid(&crate_id, &slot, &top_bottom, &fiber, &fiber_channel);
            em.map.insert(uuid, channel);
        }

        Ok(em)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl ElectronicsMap for CsvElectronicsMap {
    fn lookup(&self, eid: &ElectronicsId) -> Option<ChannelId> {
        self.map.get(&eid.uuid()).copied()
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map() {
        let map = match CsvElectronicsMap::new(None) {
            Ok(m) => m,
            Err(_) => {
                panic!();
            }
        };
        let mut eid = ElectronicsId::new(1, 4, 0, 0);
        eid.set_htr(0, 1, 0);
        let expected = ChannelId::new(Subdetector::Barrel, 5, 1, 2);
        let given = match map.lookup(&eid) {
            Some(id) => id,
            None => panic!(),
        };
        assert_eq!(expected, given);

        let mut unmapped = ElectronicsId::new(0, 0, 0, 0);
        unmapped.set_htr(9, 9, 1);
        assert_eq!(map.lookup(&unmapped), None);
    }

    #[test]
    fn test_bad_format() {
        let result = CsvElectronicsMap::parse("header\n0,1,0,4,1,HB,5,1\n");
        assert!(matches!(result, Err(ElectronicsMapError::BadFileFormat)));
        let result = CsvElectronicsMap::parse("header\n0,1,0,4,1,EB,5,1,1\n");
        assert!(matches!(result, Err(ElectronicsMapError::BadSubdetector(_))));
        let result = CsvElectronicsMap::parse("header\n0,1,x,4,1,HB,5,1,1\n");
        assert!(matches!(result, Err(ElectronicsMapError::ParsingError(_))));
    }
}
