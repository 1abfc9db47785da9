//! Maps station names to dense ids through a perfect hash built once over a closed set of names.

use rustc_hash::FxHashMap;

use crate::{error::Error, lane::MAX_NAME_LEN};

/// Cheap content hash: the first and last four bytes, read little-endian and added.
/// Names shorter than that combine their first and last byte into 24 bits.
#[inline]
pub fn o1hash(name: &[u8]) -> u32 {
    if let (Some(first), Some(last)) = (name.first_chunk::<4>(), name.last_chunk::<4>()) {
        u32::from_le_bytes(*first).wrapping_add(u32::from_le_bytes(*last))
    } else if let (Some(first), Some(last)) = (name.first(), name.last()) {
        ((*first as u32) << 16) | *last as u32
    } else {
        0
    }
}

/// A closed, ordered set of names. The id of a name is its position.
pub struct Dictionary<'a> {
    names: &'a [&'a str],
    index: PerfectHash,
}

impl<'a> Dictionary<'a> {
    /// Validates `names` and builds the lookup table.
    /// Fails on empty, duplicate or over-long names, and on names sharing a content hash.
    pub fn new(names: &'a [&'a str]) -> Result<Self, Error> {
        let mut seen = FxHashMap::<u32, &str>::default();
        seen.reserve(names.len());
        let mut keys = Vec::with_capacity(names.len());

        for &name in names {
            if name.is_empty() {
                return Err(Error::EmptyName);
            }
            if name.len() > MAX_NAME_LEN {
                return Err(Error::NameTooLong {
                    name: name.to_owned(),
                    len: name.len(),
                    max: MAX_NAME_LEN,
                });
            }
            let key = o1hash(name.as_bytes());
            if let Some(other) = seen.insert(key, name) {
                return Err(if other == name {
                    Error::DuplicateName(name.to_owned())
                } else {
                    Error::HashCollision {
                        first: other.to_owned(),
                        second: name.to_owned(),
                    }
                });
            }
            keys.push(key);
        }

        Ok(Self {
            names,
            index: PerfectHash::build(&keys)?,
        })
    }

    /// Id of `name`, or `None` if it is not a member.
    #[inline]
    pub fn id(&self, name: &[u8]) -> Option<usize> {
        let id = self.index.lookup(o1hash(name))? as usize;
        // the perfect hash says nothing about non-members, so confirm the hit
        (self.names.get(id)?.as_bytes() == name).then_some(id)
    }

    pub fn name(&self, id: usize) -> &'a str {
        self.names[id]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

const EMPTY: u16 = u16::MAX;
const KEYS_PER_BUCKET: usize = 4;
const MAX_PILOT: u32 = 1 << 16;
const SEEDS: [u64; 4] = [
    0x243F_6A88_85A3_08D3,
    0x1319_8A2E_0370_7344,
    0xA409_3822_299F_31D0,
    0x082E_FA98_EC4E_6C89,
];

/// Hash-and-displace table over distinct `u32` keys.
///
/// Keys are spread over buckets by one hash; each bucket then gets a pilot value, chosen
/// so that a second hash seeded with it sends every key of the bucket to a free slot.
/// A lookup is two hashes and two loads, with no probing.
struct PerfectHash {
    seed: u64,
    pilots: Box<[u32]>,
    slots: Box<[u16]>,
}

impl PerfectHash {
    fn build(keys: &[u32]) -> Result<Self, Error> {
        if keys.len() >= EMPTY as usize {
            return Err(Error::PerfectHash { keys: keys.len() });
        }
        SEEDS
            .iter()
            .find_map(|&seed| Self::try_build(keys, seed))
            .ok_or(Error::PerfectHash { keys: keys.len() })
    }

    fn try_build(keys: &[u32], seed: u64) -> Option<Self> {
        let bucket_count = keys.len().div_ceil(KEYS_PER_BUCKET).next_power_of_two();
        // keep the load factor well under one so pilots are found quickly
        let slot_count = (keys.len() + keys.len() / 4 + 1).next_power_of_two();

        let mut buckets = vec![Vec::new(); bucket_count];
        for (id, &key) in keys.iter().enumerate() {
            buckets[bucket_of(key, seed, bucket_count)].push((key, id as u16));
        }
        let mut order = (0..bucket_count).collect::<Vec<_>>();
        order.sort_by_key(|&b| std::cmp::Reverse(buckets[b].len()));

        let mut pilots = vec![0u32; bucket_count];
        let mut slots = vec![EMPTY; slot_count];
        let mut claimed = Vec::with_capacity(KEYS_PER_BUCKET * 4);

        for b in order {
            let bucket = &buckets[b];
            if bucket.is_empty() {
                break;
            }
            let pilot = (0..MAX_PILOT).find(|&pilot| {
                claimed.clear();
                bucket.iter().all(|&(key, _)| {
                    let slot = slot_of(key, seed, pilot, slot_count);
                    let free = slots[slot] == EMPTY && !claimed.contains(&slot);
                    claimed.push(slot);
                    free
                })
            })?;
            pilots[b] = pilot;
            for &(key, id) in bucket {
                slots[slot_of(key, seed, pilot, slot_count)] = id;
            }
        }

        Some(Self {
            seed,
            pilots: pilots.into_boxed_slice(),
            slots: slots.into_boxed_slice(),
        })
    }

    #[inline]
    fn lookup(&self, key: u32) -> Option<u16> {
        let pilot = self.pilots[bucket_of(key, self.seed, self.pilots.len())];
        let id = self.slots[slot_of(key, self.seed, pilot, self.slots.len())];
        (id != EMPTY).then_some(id)
    }
}

#[inline]
fn mix(key: u32, seed: u64) -> u64 {
    let mut x = (key as u64 ^ seed).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 29;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^ (x >> 32)
}

/// `buckets` is a power of two.
#[inline]
fn bucket_of(key: u32, seed: u64, buckets: usize) -> usize {
    mix(key, seed) as usize & (buckets - 1)
}

/// `slots` is a power of two.
#[inline]
fn slot_of(key: u32, seed: u64, pilot: u32, slots: usize) -> usize {
    let pilot_seed = seed.rotate_left(32) ^ (pilot as u64 + 1).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    mix(key, pilot_seed) as usize & (slots - 1)
}

#[cfg(test)]
mod test {
    use super::{o1hash, Dictionary, PerfectHash};
    use crate::{cities::CITIES, error::Error, lane::MAX_NAME_LEN};

    #[test]
    fn hashes_short_and_long_names() {
        for (name, expected) in [
            (&b""[..], 0),
            (b"J", (b'J' as u32) << 16 | b'J' as u32),
            (b"Jos", (b'J' as u32) << 16 | b's' as u32),
            (b"Abha", 2 * u32::from_le_bytes(*b"Abha")),
            (
                b"Abidjan",
                u32::from_le_bytes(*b"Abid").wrapping_add(u32::from_le_bytes(*b"djan")),
            ),
        ] {
            assert_eq!(
                expected,
                o1hash(name),
                "name: `{}`",
                String::from_utf8_lossy(name)
            );
        }
    }

    #[test]
    fn every_city_gets_its_position() {
        let dict = Dictionary::new(CITIES).unwrap();
        assert_eq!(CITIES.len(), dict.len());
        for (i, name) in CITIES.iter().enumerate() {
            assert_eq!(Some(i), dict.id(name.as_bytes()), "name: `{name}`");
            assert_eq!(*name, dict.name(i));
        }
    }

    #[test]
    fn rejects_names_outside_the_dictionary() {
        let dict = Dictionary::new(CITIES).unwrap();
        for name in [
            "Nowhereville",
            "",
            "Abh",
            "Abhaa",
            "abha",
            // same first and last four bytes as a member
            "Abidxxdjan",
        ] {
            assert_eq!(None, dict.id(name.as_bytes()), "name: `{name}`");
        }
    }

    #[test]
    fn construction_errors() {
        let too_long = "x".repeat(MAX_NAME_LEN + 1);
        for (names, expected) in [
            (vec!["a", ""], Error::EmptyName),
            (
                vec![too_long.as_str()],
                Error::NameTooLong {
                    name: too_long.clone(),
                    len: MAX_NAME_LEN + 1,
                    max: MAX_NAME_LEN,
                },
            ),
            (
                vec!["Abha", "Accra", "Abha"],
                Error::DuplicateName("Abha".to_owned()),
            ),
            (
                vec!["abcd-wxyz", "abcd+wxyz"],
                Error::HashCollision {
                    first: "abcd-wxyz".to_owned(),
                    second: "abcd+wxyz".to_owned(),
                },
            ),
            (
                vec!["aXb", "aYb"],
                Error::HashCollision {
                    first: "aXb".to_owned(),
                    second: "aYb".to_owned(),
                },
            ),
        ] {
            match Dictionary::new(&names) {
                Ok(_) => panic!("expected {expected:?} for {names:?}"),
                Err(e) => assert_eq!(expected, e, "names: {names:?}"),
            }
        }
    }

    #[test]
    fn longest_supported_name_is_accepted() {
        let longest = "y".repeat(MAX_NAME_LEN);
        let names = [longest.as_str(), "z"];
        let dict = Dictionary::new(&names).unwrap();
        assert_eq!(Some(0), dict.id(longest.as_bytes()));
        assert_eq!(Some(1), dict.id(b"z"));
    }

    #[test]
    fn perfect_hash_places_dense_keys() {
        for n in [0u32, 1, 2, 3, 17, 500, 5000] {
            let keys = (0..n).map(|k| k.wrapping_mul(2_654_435_761)).collect::<Vec<_>>();
            let table = PerfectHash::build(&keys).unwrap();
            for (id, key) in keys.iter().enumerate() {
                assert_eq!(Some(id as u16), table.lookup(*key), "n {n}, key {key}");
            }
        }
    }
}
