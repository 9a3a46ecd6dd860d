use serde::{Deserialize, Serialize};
use std::fmt;

/// A single probe position at which a diffraction pattern was measured
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPoint {
    /// Index correlating this point with its diffraction pattern
    pub index: i64,
    pub position_x_m: f64,
    pub position_y_m: f64,
}

impl ScanPoint {
    pub fn new(index: i64, position_x_m: f64, position_y_m: f64) -> Self {
        Self {
            index,
            position_x_m,
            position_y_m,
        }
    }
}

/// Ordered scan trajectory
///
/// Insertion order is the physical scan order. Indexes are neither required to
/// be contiguous nor sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionSequence(Vec<ScanPoint>);

impl PositionSequence {
    pub fn new(points: Vec<ScanPoint>) -> Self {
        Self(points)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScanPoint> {
        self.0.iter()
    }

    pub fn push(&mut self, point: ScanPoint) {
        self.0.push(point);
    }

    /// Indexes in scan order
    pub fn indexes(&self) -> Vec<i64> {
        self.0.iter().map(|point| point.index).collect()
    }

    pub fn as_slice(&self) -> &[ScanPoint] {
        &self.0
    }

    /// Copy of this sequence with `preset` applied to every point
    pub fn transformed(&self, preset: ScanTransformPreset) -> Self {
        self.0.iter().map(|point| preset.apply(point)).collect()
    }
}

impl FromIterator<ScanPoint> for PositionSequence {
    fn from_iter<I: IntoIterator<Item = ScanPoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PositionSequence {
    type Item = &'a ScanPoint;
    type IntoIter = std::slice::Iter<'a, ScanPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One of the eight axis flips and swaps of a scan's coordinate frame
///
/// Bit 0 negates x, bit 1 negates y, and bit 2 swaps the axes. Reconstructing
/// once per preset shows which orientation the instrument actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanTransformPreset(u8);

impl ScanTransformPreset {
    pub const COUNT: u8 = 8;

    pub fn new(value: u8) -> Option<Self> {
        (value < Self::COUNT).then_some(Self(value))
    }

    /// Every preset, identity first
    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT).map(Self)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn negate_x(self) -> bool {
        self.0 & 0x1 != 0
    }

    pub fn negate_y(self) -> bool {
        self.0 & 0x2 != 0
    }

    pub fn swap_xy(self) -> bool {
        self.0 & 0x4 != 0
    }

    pub fn apply(self, point: &ScanPoint) -> ScanPoint {
        let x = if self.negate_x() { -point.position_x_m } else { point.position_x_m };
        let y = if self.negate_y() { -point.position_y_m } else { point.position_y_m };

        if self.swap_xy() {
            ScanPoint::new(point.index, y, x)
        } else {
            ScanPoint::new(point.index, x, y)
        }
    }
}

impl fmt::Display for ScanTransformPreset {
    /// Where `(y, x)` ends up, for example `(y, x) \u{2192} (\u{2212}x, +y)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let y = if self.negate_y() { "\u{2212}y" } else { "+y" };
        let x = if self.negate_x() { "\u{2212}x" } else { "+x" };

        if self.swap_xy() {
            write!(f, "(y, x) \u{2192} ({}, {})", x, y)
        } else {
            write!(f, "(y, x) \u{2192} ({}, {})", y, x)
        }
    }
}
