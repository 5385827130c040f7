use crate::location::Fix;

/// Mean earth radius in meters (IUGG).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between two fixes in meters (haversine).
///
/// Accurate to well under a meter at the fix-to-fix scales produced by a
/// 1-second sampling interval.
pub fn haversine_m(a: &Fix, b: &Fix) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_fixes() {
        let p = Fix {
            lat: 51.5007,
            lon: -0.1246,
        };
        assert_eq!(haversine_m(&p, &p), 0.0);
    }

    #[test]
    fn one_millidegree_of_latitude() {
        // 0.001 deg of latitude is ~111.2 m everywhere on the sphere.
        let a = Fix { lat: 48.0, lon: 2.0 };
        let b = Fix {
            lat: 48.001,
            lon: 2.0,
        };
        let d = haversine_m(&a, &b);
        assert!((d - 111.2).abs() < 1.0, "got {d}");
    }

    #[test]
    fn symmetric() {
        let a = Fix {
            lat: 59.33,
            lon: 18.06,
        };
        let b = Fix {
            lat: 59.34,
            lon: 18.08,
        };
        let ab = haversine_m(&a, &b);
        let ba = haversine_m(&b, &a);
        assert!((ab - ba).abs() < 1e-9);
        assert!(ab > 0.0);
    }
}
