//! headers/extras.rs
//! Variable-size extra attributes written right after each fixed header.
//!
//! The mapping is ordered by key and serialized with bincode (little-endian,
//! fixed-width integers), so replacing a numeric value never changes the
//! serialized length. Strings and byte blobs still can.

use std::collections::BTreeMap;
use std::fmt;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::headers::types::{HeaderError, RxTime};
use crate::utils::split_seconds;

/// Value carried by a tag or an extra attribute.
#[derive(Debug, Clone, PartialEq, Encode, Decode, Serialize, Deserialize)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Whole seconds + fractional seconds.
    Time(u64, f64),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Bool(_) => "bool",
            AttrValue::Int(_) => "int",
            AttrValue::UInt(_) => "uint",
            AttrValue::Double(_) => "double",
            AttrValue::Str(_) => "str",
            AttrValue::Bytes(_) => "bytes",
            AttrValue::Time(..) => "time",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            AttrValue::Double(v) => Some(v),
            AttrValue::Int(v) => Some(v as f64),
            AttrValue::UInt(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            AttrValue::UInt(v) => Some(v),
            AttrValue::Int(v) if v >= 0 => Some(v as u64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            AttrValue::Bool(v) => Some(v),
            AttrValue::Int(v) => Some(v != 0),
            AttrValue::UInt(v) => Some(v != 0),
            _ => None,
        }
    }

    /// Accepts an explicit `(secs, frac)` pair or plain seconds as a double.
    pub fn as_rx_time(&self) -> Option<RxTime> {
        match *self {
            AttrValue::Time(secs, frac) if (0.0..1.0).contains(&frac) => Some(RxTime::new(secs, frac)),
            AttrValue::Time(secs, frac) if frac.is_finite() && frac >= 0.0 => {
                let (carry, frac) = split_seconds(frac);
                Some(RxTime::new(secs + carry, frac))
            }
            AttrValue::Double(v) if v.is_finite() && v >= 0.0 => {
                let (secs, frac) = split_seconds(v);
                Some(RxTime::new(secs, frac))
            }
            AttrValue::UInt(v) => Some(RxTime::new(v, 0.0)),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v) => write!(f, "{}", v),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::UInt(v) => write!(f, "{}", v),
            AttrValue::Double(v) => write!(f, "{}", v),
            AttrValue::Str(v) => write!(f, "{:?}", v),
            AttrValue::Bytes(v) => write!(f, "0x{}", hex::encode(v)),
            AttrValue::Time(s, fr) => write!(f, "({}, {})", s, fr),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self { AttrValue::Bool(v) }
}
impl From<i32> for AttrValue {
    fn from(v: i32) -> Self { AttrValue::Int(v as i64) }
}
impl From<i64> for AttrValue {
    fn from(v: i64) -> Self { AttrValue::Int(v) }
}
impl From<u64> for AttrValue {
    fn from(v: u64) -> Self { AttrValue::UInt(v) }
}
impl From<f64> for AttrValue {
    fn from(v: f64) -> Self { AttrValue::Double(v) }
}
impl From<&str> for AttrValue {
    fn from(v: &str) -> Self { AttrValue::Str(v.to_owned()) }
}
impl From<String> for AttrValue {
    fn from(v: String) -> Self { AttrValue::Str(v) }
}
impl From<Vec<u8>> for AttrValue {
    fn from(v: Vec<u8>) -> Self { AttrValue::Bytes(v) }
}
impl From<RxTime> for AttrValue {
    fn from(t: RxTime) -> Self { AttrValue::Time(t.secs, t.frac) }
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

/// Ordered key -> value mapping with a cached serialized length.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraAttributes {
    map: BTreeMap<String, AttrValue>,
    encoded_len: usize,
}

impl Default for ExtraAttributes {
    fn default() -> Self {
        let map = BTreeMap::new();
        let encoded_len = Self::measure(&map);
        Self { map, encoded_len }
    }
}

impl ExtraAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a blob produced by `encode`. An empty blob is an empty mapping.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        let (map, used): (BTreeMap<String, AttrValue>, usize) =
            bincode::decode_from_slice(bytes, bincode_config())
                .map_err(|e| HeaderError::ExtraDecode(e.to_string()))?;
        if used != bytes.len() {
            return Err(HeaderError::TrailingBytes { extra: bytes.len() - used });
        }
        let encoded_len = Self::measure(&map);
        Ok(Self { map, encoded_len })
    }

    /// Parse the extras that follow a fixed header, given that header's `strt`.
    pub fn parse_region(bytes: &[u8], extra_len: usize) -> Result<Self, HeaderError> {
        if bytes.len() < extra_len {
            return Err(HeaderError::BufferTooShort { have: bytes.len(), need: extra_len });
        }
        Self::parse(&bytes[..extra_len])
    }

    pub fn encode(&self) -> Result<Vec<u8>, HeaderError> {
        bincode::encode_to_vec(&self.map, bincode_config())
            .map_err(|e| HeaderError::ExtraEncode(e.to_string()))
    }

    fn measure(map: &BTreeMap<String, AttrValue>) -> usize {
        bincode::encode_to_vec(map, bincode_config())
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// Cached serialized length (`extra_size`).
    pub fn encoded_len(&self) -> usize {
        self.encoded_len
    }

    /// Insert or replace; returns the previous value. Refreshes the cached length.
    pub fn insert(&mut self, key: impl Into<String>, value: AttrValue) -> Option<AttrValue> {
        let prev = self.map.insert(key.into(), value);
        self.encoded_len = Self::measure(&self.map);
        prev
    }

    /// Merge every entry of `other` into `self`, later values winning.
    pub fn merge(&mut self, other: &ExtraAttributes) {
        for (k, v) in &other.map {
            self.map.insert(k.clone(), v.clone());
        }
        self.encoded_len = Self::measure(&self.map);
    }

    /// Serialized length this mapping would have after `insert(key, value)`.
    pub fn len_with(&self, key: &str, value: &AttrValue) -> usize {
        let mut probe = self.map.clone();
        probe.insert(key.to_owned(), value.clone());
        Self::measure(&probe)
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.map.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, AttrValue)> for ExtraAttributes {
    fn from_iter<I: IntoIterator<Item = (K, AttrValue)>>(iter: I) -> Self {
        let map: BTreeMap<String, AttrValue> = iter.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let encoded_len = Self::measure(&map);
        Self { map, encoded_len }
    }
}
