//! Conversions between board-internal units and human ones.
//!
//! Internal lengths are nanometres; internal angles are tenths of a degree.

use crate::Pt;

pub const NM_PER_MM: f64 = 1_000_000.0;
pub const MM_PER_INCH: f64 = 25.4;

pub fn to_mm(nm: i64) -> f64 {
    nm as f64 / NM_PER_MM
}

pub fn from_mm(mm: f64) -> i64 {
    (mm * NM_PER_MM).round() as i64
}

pub fn to_inch(nm: i64) -> f64 {
    to_mm(nm) / MM_PER_INCH
}

pub fn from_inch(inch: f64) -> i64 {
    from_mm(inch * MM_PER_INCH)
}

pub fn pt_to_mm(p: Pt) -> (f64, f64) {
    (to_mm(p.x), to_mm(p.y))
}

pub fn pt_from_mm(x: f64, y: f64) -> Pt {
    Pt::new(from_mm(x), from_mm(y))
}

pub fn pt_to_inch(p: Pt) -> (f64, f64) {
    (to_inch(p.x), to_inch(p.y))
}

pub fn pt_from_inch(x: f64, y: f64) -> Pt {
    Pt::new(from_inch(x), from_inch(y))
}

/// Degrees to internal decidegrees.
pub fn from_deg(deg: f64) -> f64 {
    deg * 10.0
}

/// Internal decidegrees to degrees.
pub fn to_deg(decideg: f64) -> f64 {
    decideg / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mm_roundtrip() {
        for mm in [0.0, 1.0, -2.54, 123.456] {
            assert!((to_mm(from_mm(mm)) - mm).abs() < 1e-6);
        }
        assert_eq!(from_mm(1.0), 1_000_000);
    }

    #[test]
    fn test_inch_is_25_4_mm() {
        assert_eq!(from_inch(1.0), from_mm(25.4));
        assert!((to_inch(from_inch(0.1)) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_points() {
        assert_eq!(pt_from_mm(1.0, -2.0), Pt::new(1_000_000, -2_000_000));
        assert_eq!(pt_to_mm(Pt::new(500_000, 250_000)), (0.5, 0.25));
    }

    #[test]
    fn test_angles() {
        assert_eq!(from_deg(180.0), 1800.0);
        assert_eq!(to_deg(-900.0), -90.0);
    }
}
