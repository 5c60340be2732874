//! stable identity of an alert, derived from its labels only
//!
//! Uses the same hashing scheme as prometheus (FNV-1a 64 over the sorted label
//! pairs, each name and value terminated by `0xff`), so fingerprints match the
//! ones shown by alertmanager for the same label set.

use std::fmt;

use crate::alert::LabelSet;

/// FNV-1a 64 offset basis
const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
/// FNV-1a 64 prime
const PRIME: u64 = 0x0000_0100_0000_01b3;
/// never part of valid utf-8, so it can't occur inside a name or value
const SEPARATOR: u8 = 0xff;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// 64 bit label set hash
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:016x}", self.0)
	}
}

/// FNV-1a 64 hasher state
struct Fnv64(u64);

impl Fnv64 {
	fn new() -> Self {
		Self(OFFSET)
	}

	fn write(&mut self, bytes: &[u8]) {
		for byte in bytes {
			self.0 ^= u64::from(*byte);
			self.0 = self.0.wrapping_mul(PRIME);
		}
	}

	fn write_byte(&mut self, byte: u8) {
		self.write(&[byte]);
	}
}

/// Hash a label set. Insertion order doesn't matter, [LabelSet] iterates in
/// key order.
pub fn fingerprint(labels: &LabelSet) -> Fingerprint {
	let mut hasher = Fnv64::new();

	for (name, value) in labels {
		hasher.write(name.as_bytes());
		hasher.write_byte(SEPARATOR);
		hasher.write(value.as_bytes());
		hasher.write_byte(SEPARATOR);
	}

	Fingerprint(hasher.0)
}

/// Hash of an arbitrary key (e.g. a group key), rendered as hex.
pub fn hash_key(key: &str) -> String {
	let mut hasher = Fnv64::new();
	hasher.write(key.as_bytes());
	Fingerprint(hasher.0).to_string()
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	fn labels(pairs: &[(&str, &str)]) -> LabelSet {
		pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
	}

	#[test]
	fn matches_prometheus_fingerprints() {
		assert_eq!(
			fingerprint(&labels(&[("alertname", "alert1"), ("lbl1", "val1")])).to_string(),
			"fac0861a85de433a"
		);
		assert_eq!(
			fingerprint(&labels(&[("alertname", "alert1"), ("lbl1", "val2")])).to_string(),
			"fab6861a85d5eeb5"
		);
	}

	#[test]
	fn empty_label_set_is_offset_basis() {
		assert_eq!(fingerprint(&LabelSet::new()), Fingerprint(OFFSET));
		assert_eq!(fingerprint(&LabelSet::new()).to_string(), "cbf29ce484222325");
	}

	#[test]
	fn insertion_order_is_irrelevant() {
		let mut forward = LabelSet::new();
		forward.insert("a".into(), "1".into());
		forward.insert("b".into(), "2".into());

		let mut backward = LabelSet::new();
		backward.insert("b".into(), "2".into());
		backward.insert("a".into(), "1".into());

		assert_eq!(fingerprint(&forward), fingerprint(&backward));
	}

	#[test]
	fn distinct_label_sets_do_not_collide() {
		let sets = [
			labels(&[]),
			labels(&[("a", "1")]),
			labels(&[("a", "2")]),
			labels(&[("b", "1")]),
			labels(&[("a", "1"), ("b", "2")]),
			labels(&[("a", "12")]),
			// name/value boundary must matter
			labels(&[("a1", "")]),
			labels(&[("a", "1b"), ("c", "")]),
			labels(&[("alertname", "alert1"), ("lbl1", "val1")]),
			labels(&[("alertname", "alert1"), ("lbl1", "val2")]),
			labels(&[("alertname", "alert1"), ("lbl1", "val3")]),
		];

		let fingerprints: HashSet<_> = sets.iter().map(fingerprint).collect();
		assert_eq!(fingerprints.len(), sets.len());
	}

	#[test]
	fn group_key_hash() {
		assert_eq!(hash_key(""), "cbf29ce484222325");
		assert_eq!(hash_key("{}:{alertname=\"cpu\"}").len(), 16);
		assert_ne!(hash_key("{}:{alertname=\"cpu\"}"), hash_key("{}:{alertname=\"mem\"}"));
	}
}
