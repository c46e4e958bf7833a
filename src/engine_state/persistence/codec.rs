//! Serialization of modification maps.
//!
//! The on-disk format is plain text, one edited voxel per line:
//!
//! ```text
//! x,y,z,delta
//! ```
//!
//! There is no header, version or checksum. Lines are written sorted by `(z, y, x)`
//! and deltas use the shortest representation that parses back to the same `f32`,
//! so decoding an encoded map reproduces it exactly.

use log::debug;

use cgmath::Point3;

use crate::engine_state::voxels::chunk::ModificationMap;

/// Converts modification maps to and from bytes.
pub trait ModificationCodec: Send + Sync {
    /// Serializes a map.
    fn encode(&self, modifications: &ModificationMap) -> Vec<u8>;

    /// Parses a map. Records that cannot be understood are skipped.
    fn decode(&self, bytes: &[u8]) -> ModificationMap;
}

/// The `x,y,z,delta` line format.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvModificationCodec;

impl CsvModificationCodec {
    fn parse_line(line: &str) -> Option<(Point3<i32>, f32)> {
        let mut fields = line.split(',').map(str::trim);
        let x = fields.next()?.parse().ok()?;
        let y = fields.next()?.parse().ok()?;
        let z = fields.next()?.parse().ok()?;
        let delta = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some((Point3::new(x, y, z), delta))
    }
}

impl ModificationCodec for CsvModificationCodec {
    fn encode(&self, modifications: &ModificationMap) -> Vec<u8> {
        let mut text = String::with_capacity(modifications.len() * 16);
        for (voxel, delta) in modifications.sorted_entries() {
            text.push_str(&format!("{},{},{},{}\n", voxel.x, voxel.y, voxel.z, delta));
        }
        text.into_bytes()
    }

    fn decode(&self, bytes: &[u8]) -> ModificationMap {
        let text = String::from_utf8_lossy(bytes);
        let mut modifications = ModificationMap::new();
        let mut skipped = 0;

        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            match Self::parse_line(line) {
                Some((voxel, delta)) => modifications.insert(voxel, delta),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Skipped {} malformed modification records", skipped);
        }
        modifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_sorted_lines() {
        let modifications: ModificationMap = [
            (Point3::new(1, 0, 2), 0.5_f32),
            (Point3::new(-3, 7, 0), -0.125),
            (Point3::new(0, 0, 2), 1.0),
        ]
        .into_iter()
        .collect();

        let text = String::from_utf8(CsvModificationCodec.encode(&modifications)).unwrap();
        assert_eq!(text, "-3,7,0,-0.125\n0,0,2,1\n1,0,2,0.5\n");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let bytes = b"1,2,3,0.5\n\
                      1,2,3\n\
                      a,b,c,d\n\
                      4,5,6,7,8\n\
                      \n\
                      -1, -2, -3, -0.25\r\n\
                      9,9,9,oops\n";

        let modifications = CsvModificationCodec.decode(bytes);

        assert_eq!(modifications.len(), 2);
        assert_eq!(modifications.get(Point3::new(1, 2, 3)), Some(0.5));
        assert_eq!(modifications.get(Point3::new(-1, -2, -3)), Some(-0.25));
    }

    #[test]
    fn later_lines_overwrite_earlier_ones() {
        let modifications = CsvModificationCodec.decode(b"0,0,0,1\n0,0,0,2\n");
        assert_eq!(modifications.get(Point3::new(0, 0, 0)), Some(2.0));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            entries in proptest::collection::hash_map(
                (-40i32..40, -40i32..40, -40i32..40),
                -1.0e6f32..1.0e6,
                1..64,
            )
        ) {
            let modifications: ModificationMap = entries
                .into_iter()
                .map(|((x, y, z), delta)| (Point3::new(x, y, z), delta))
                .collect();

            let decoded = CsvModificationCodec.decode(&CsvModificationCodec.encode(&modifications));
            prop_assert_eq!(decoded, modifications);
        }
    }
}
