//! Coordinate transposition between the mower's local planar frame and WGS84.
//!
//! The local frame is a metric offset from a datum point. The datum is
//! projected into its UTM zone once; planar offsets are added in projected
//! space and the result is unprojected with the Krüger series, which keeps
//! round trips well under a millimeter for points within a few kilometers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, Result};

/// Settings key holding the datum longitude.
pub const DATUM_LON_KEY: &str = "OM_DATUM_LONG";
/// Settings key holding the datum latitude.
pub const DATUM_LAT_KEY: &str = "OM_DATUM_LAT";

// WGS84 ellipsoid
const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Mean earth radius used by the flat-earth display helpers, in km.
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// One meter expressed in degrees of latitude on the flat-earth model.
pub fn meter_in_degree() -> f64 {
    (1.0 / ((2.0 * std::f64::consts::PI / 360.0) * EARTH_RADIUS_KM)) / 1000.0
}

/// Geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// GeoJSON position order: `[lon, lat]`.
    pub fn to_position(self) -> Vec<f64> {
        vec![self.lon, self.lat]
    }

    pub fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [lon, lat, ..] => Some(Self::new(*lon, *lat)),
            _ => None,
        }
    }

    pub fn offset(self, delta: GeoDelta) -> Self {
        Self::new(self.lon + delta.lng, self.lat + delta.lat)
    }
}

/// Difference between two geographic positions, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoDelta {
    pub lng: f64,
    pub lat: f64,
}

impl GeoDelta {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn between(from: GeoPoint, to: GeoPoint) -> Self {
        Self::new(to.lon - from.lon, to.lat - from.lat)
    }

    pub fn is_finite(&self) -> bool {
        self.lng.is_finite() && self.lat.is_finite()
    }
}

/// Local metric offset from the datum (x = east, y = north).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanarPoint {
    pub x: f64,
    pub y: f64,
}

impl PlanarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Antenna/sensor offset applied on top of the datum, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offsets {
    pub x: f64,
    pub y: f64,
}

impl Offsets {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// UTM zone number plus hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmZone {
    pub number: u8,
    pub north: bool,
}

impl UtmZone {
    /// Standard zoning including the Norway and Svalbard exceptions.
    pub fn for_point(lon: f64, lat: f64) -> Self {
        let lon_norm = (lon + 180.0).rem_euclid(360.0) - 180.0;
        let mut number = ((lon_norm + 180.0) / 6.0).floor() as i32 + 1;
        if number > 60 {
            number = 60;
        }

        if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon_norm) {
            number = 32;
        }
        if (72.0..84.0).contains(&lat) {
            number = match lon_norm {
                l if (0.0..9.0).contains(&l) => 31,
                l if (9.0..21.0).contains(&l) => 33,
                l if (21.0..33.0).contains(&l) => 35,
                l if (33.0..42.0).contains(&l) => 37,
                _ => number,
            };
        }

        Self {
            number: number as u8,
            north: lat >= 0.0,
        }
    }

    /// Longitude of the zone's central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        (self.number as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }
}

/// Latitude band letter (C..X) for a latitude, `None` outside UTM coverage.
pub fn latitude_band(lat: f64) -> Option<char> {
    const BANDS: &[u8] = b"CDEFGHJKLMNPQRSTUVWXX";
    if !(-80.0..=84.0).contains(&lat) {
        return None;
    }
    let idx = ((lat + 80.0) / 8.0).floor() as usize;
    BANDS.get(idx.min(BANDS.len() - 1)).map(|b| *b as char)
}

/// Projected UTM coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtmCoord {
    pub easting: f64,
    pub northing: f64,
    pub zone: UtmZone,
}

struct KruegerSeries {
    e: f64,
    big_a: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
}

fn krueger() -> KruegerSeries {
    let f = WGS84_F;
    let e = (f * (2.0 - f)).sqrt();
    let n = f / (2.0 - f);
    let n2 = n * n;
    let n3 = n2 * n;
    let n4 = n3 * n;
    let n5 = n4 * n;
    let n6 = n5 * n;

    let big_a = WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

    let alpha = [
        n / 2.0 - 2.0 / 3.0 * n2 + 5.0 / 16.0 * n3 + 41.0 / 180.0 * n4 - 127.0 / 288.0 * n5
            + 7891.0 / 37800.0 * n6,
        13.0 / 48.0 * n2 - 3.0 / 5.0 * n3 + 557.0 / 1440.0 * n4 + 281.0 / 630.0 * n5
            - 1_983_433.0 / 1_935_360.0 * n6,
        61.0 / 240.0 * n3 - 103.0 / 140.0 * n4 + 15061.0 / 26880.0 * n5
            + 167_603.0 / 181_440.0 * n6,
        49561.0 / 161_280.0 * n4 - 179.0 / 168.0 * n5 + 6_601_661.0 / 7_257_600.0 * n6,
        34729.0 / 80640.0 * n5 - 3_418_889.0 / 1_995_840.0 * n6,
        212_378_941.0 / 319_334_400.0 * n6,
    ];

    let beta = [
        n / 2.0 - 2.0 / 3.0 * n2 + 37.0 / 96.0 * n3 - 1.0 / 360.0 * n4 - 81.0 / 512.0 * n5
            + 96199.0 / 604_800.0 * n6,
        1.0 / 48.0 * n2 + 1.0 / 15.0 * n3 - 437.0 / 1440.0 * n4 + 46.0 / 105.0 * n5
            - 1_118_711.0 / 3_870_720.0 * n6,
        17.0 / 480.0 * n3 - 37.0 / 840.0 * n4 - 209.0 / 4480.0 * n5 + 5569.0 / 90720.0 * n6,
        4397.0 / 161_280.0 * n4 - 11.0 / 504.0 * n5 - 830_251.0 / 7_257_600.0 * n6,
        4583.0 / 161_280.0 * n5 - 108_847.0 / 3_991_680.0 * n6,
        20_648_693.0 / 638_668_800.0 * n6,
    ];

    KruegerSeries {
        e,
        big_a,
        alpha,
        beta,
    }
}

/// Project a geographic position into the given UTM zone.
pub fn project_utm(lon: f64, lat: f64, zone: UtmZone) -> Result<UtmCoord> {
    if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
        return Err(MapError::Projection(format!(
            "position ({lon}, {lat}) cannot be projected"
        )));
    }

    let k = krueger();
    let phi = lat.to_radians();
    let lambda = (lon - zone.central_meridian()).to_radians();

    let cos_lambda = lambda.cos();
    let sin_lambda = lambda.sin();

    let tau = phi.tan();
    let sigma = (k.e * (k.e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
    let tau_p = tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt();

    let xi_p = tau_p.atan2(cos_lambda);
    let eta_p = (sin_lambda / (tau_p * tau_p + cos_lambda * cos_lambda).sqrt()).asinh();

    let mut xi = xi_p;
    let mut eta = eta_p;
    for (j, alpha) in k.alpha.iter().enumerate() {
        let m = 2.0 * (j as f64 + 1.0);
        xi += alpha * (m * xi_p).sin() * (m * eta_p).cosh();
        eta += alpha * (m * xi_p).cos() * (m * eta_p).sinh();
    }

    let x = UTM_K0 * k.big_a * eta;
    let y = UTM_K0 * k.big_a * xi;

    let easting = x + FALSE_EASTING;
    let northing = if zone.north { y } else { y + FALSE_NORTHING_SOUTH };

    Ok(UtmCoord {
        easting,
        northing,
        zone,
    })
}

/// Unproject a UTM coordinate back to `(lon, lat)` in degrees.
pub fn unproject_utm(coord: &UtmCoord) -> Result<GeoPoint> {
    if !coord.easting.is_finite() || !coord.northing.is_finite() {
        return Err(MapError::Projection(format!(
            "projected coordinate ({}, {}) is not finite",
            coord.easting, coord.northing
        )));
    }

    let k = krueger();
    let x = coord.easting - FALSE_EASTING;
    let y = if coord.zone.north {
        coord.northing
    } else {
        coord.northing - FALSE_NORTHING_SOUTH
    };

    let eta = x / (UTM_K0 * k.big_a);
    let xi = y / (UTM_K0 * k.big_a);

    let mut xi_p = xi;
    let mut eta_p = eta;
    for (j, beta) in k.beta.iter().enumerate() {
        let m = 2.0 * (j as f64 + 1.0);
        xi_p -= beta * (m * xi).sin() * (m * eta).cosh();
        eta_p -= beta * (m * xi).cos() * (m * eta).sinh();
    }

    let sinh_eta_p = eta_p.sinh();
    let sin_xi_p = xi_p.sin();
    let cos_xi_p = xi_p.cos();

    let tau_p = sin_xi_p / (sinh_eta_p * sinh_eta_p + cos_xi_p * cos_xi_p).sqrt();

    let e2 = k.e * k.e;
    let mut tau = tau_p;
    for _ in 0..16 {
        let sigma = (k.e * (k.e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
        let tau_i_p = tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt();
        let delta = (tau_p - tau_i_p) / (1.0 + tau_i_p * tau_i_p).sqrt()
            * (1.0 + (1.0 - e2) * tau * tau)
            / ((1.0 - e2) * (1.0 + tau * tau).sqrt());
        tau += delta;
        if delta.abs() < 1e-12 {
            break;
        }
    }

    let lat = tau.atan().to_degrees();
    let lon = sinh_eta_p.atan2(cos_xi_p).to_degrees() + coord.zone.central_meridian();

    Ok(GeoPoint::new(lon, lat))
}

// ==== Datum ====

/// Origin of the local planar frame.
///
/// The projected easting/northing are computed once at construction so every
/// transposition in an editing session shares the same origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    pub lon: f64,
    pub lat: f64,
    pub zone: UtmZone,
    origin: UtmCoord,
}

impl Datum {
    /// Build a datum, rejecting unset (zero) or non-finite coordinates.
    pub fn new(lon: f64, lat: f64) -> Result<Self> {
        if !lon.is_finite() || !lat.is_finite() || lon == 0.0 || lat == 0.0 {
            return Err(MapError::NotReady(format!(
                "datum ({lon}, {lat}) is not configured"
            )));
        }
        let zone = UtmZone::for_point(lon, lat);
        let origin = project_utm(lon, lat, zone)?;
        Ok(Self {
            lon,
            lat,
            zone,
            origin,
        })
    }

    /// Read the datum from backend settings (`OM_DATUM_LONG` / `OM_DATUM_LAT`).
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self> {
        let lon = parse_setting(settings, DATUM_LON_KEY)?;
        let lat = parse_setting(settings, DATUM_LAT_KEY)?;
        Self::new(lon, lat)
    }

    pub fn origin(&self) -> UtmCoord {
        self.origin
    }

    pub fn geo(&self) -> GeoPoint {
        GeoPoint::new(self.lon, self.lat)
    }

    /// Zone designator such as `31T`.
    pub fn zone_label(&self) -> String {
        match latitude_band(self.lat) {
            Some(band) => format!("{}{}", self.zone.number, band),
            None => format!("{}{}", self.zone.number, if self.zone.north { 'N' } else { 'S' }),
        }
    }
}

fn parse_setting(settings: &HashMap<String, String>, key: &str) -> Result<f64> {
    let raw = settings
        .get(key)
        .ok_or_else(|| MapError::NotReady(format!("setting {key} is missing")))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| MapError::NotReady(format!("setting {key} is not a number: {raw}")))
}

// ==== Transposition ====

/// Convert a planar offset to a geographic position.
///
/// Argument order follows the telemetry convention: `y` (north) before `x`
/// (east). The offsets are summed with the point before the datum is added.
pub fn to_geo(datum: &Datum, offset_x: f64, offset_y: f64, y: f64, x: f64) -> Result<GeoPoint> {
    let origin = datum.origin();
    unproject_utm(&UtmCoord {
        easting: origin.easting + (offset_x + x),
        northing: origin.northing + (offset_y + y),
        zone: origin.zone,
    })
}

/// Exact inverse of [`to_geo`].
pub fn to_planar(
    datum: &Datum,
    offset_x: f64,
    offset_y: f64,
    lat: f64,
    lon: f64,
) -> Result<PlanarPoint> {
    let origin = datum.origin();
    let projected = project_utm(lon, lat, origin.zone)?;
    Ok(PlanarPoint::new(
        projected.easting - origin.easting - offset_x,
        projected.northing - origin.northing - offset_y,
    ))
}

impl Datum {
    pub fn point_to_geo(&self, offsets: Offsets, point: PlanarPoint) -> Result<GeoPoint> {
        to_geo(self, offsets.x, offsets.y, point.y, point.x)
    }

    pub fn point_to_planar(&self, offsets: Offsets, point: GeoPoint) -> Result<PlanarPoint> {
        to_planar(self, offsets.x, offsets.y, point.lat, point.lon)
    }

    pub fn ring_to_geo(&self, offsets: Offsets, ring: &[PlanarPoint]) -> Result<Vec<GeoPoint>> {
        ring.iter().map(|p| self.point_to_geo(offsets, *p)).collect()
    }

    pub fn ring_to_planar(&self, offsets: Offsets, ring: &[GeoPoint]) -> Result<Vec<PlanarPoint>> {
        ring.iter().map(|p| self.point_to_planar(offsets, *p)).collect()
    }
}

// ==== Flat-earth display helpers ====
// Small-angle approximation. Good enough for drawing short indicators, never
// used when persisting geometry.

/// Flat-earth variant of [`to_geo`] for display-only use.
pub fn approx_to_geo(datum: &Datum, offsets: Offsets, y: f64, x: f64) -> GeoPoint {
    let mid = meter_in_degree();
    let lat = datum.lat + (y + offsets.y) * mid;
    let lon = datum.lon + ((x + offsets.x) * mid) / datum.lat.to_radians().cos();
    GeoPoint::new(lon, lat)
}

/// End point of a heading indicator of `length_m` meters starting at `origin`.
///
/// `heading_rad` is measured counter-clockwise from east, as published in the
/// pose frames.
pub fn heading_endpoint(origin: GeoPoint, heading_rad: f64, length_m: f64) -> GeoPoint {
    let mid = meter_in_degree();
    let dlat = heading_rad.sin() * length_m * mid;
    let dlon = heading_rad.cos() * length_m * mid / origin.lat.to_radians().cos();
    GeoPoint::new(origin.lon + dlon, origin.lat + dlat)
}

/// Quaternion (x, y, z, w) for a yaw-only rotation.
pub fn quaternion_from_heading(heading_rad: f64) -> [f64; 4] {
    [0.0, 0.0, (heading_rad / 2.0).sin(), (heading_rad / 2.0).cos()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datum() -> Datum {
        Datum::new(2.0, 43.0).unwrap()
    }

    #[test]
    fn test_zone_for_datum() {
        let zone = UtmZone::for_point(2.0, 43.0);
        assert_eq!(zone.number, 31);
        assert!(zone.north);
        assert_eq!(zone.central_meridian(), 3.0);
        assert_eq!(datum().zone_label(), "31T");
    }

    #[test]
    fn test_zone_exceptions() {
        assert_eq!(UtmZone::for_point(5.0, 60.0).number, 32);
        assert_eq!(UtmZone::for_point(10.0, 78.0).number, 33);
        assert!(!UtmZone::for_point(151.2, -33.9).north);
    }

    #[test]
    fn test_known_projection() {
        let zone = UtmZone::for_point(3.0, 45.0);
        let origin = project_utm(3.0, 0.0, zone).unwrap();
        assert!((origin.easting - 500_000.0).abs() < 1e-6);
        assert!(origin.northing.abs() < 1e-6);

        // meridian arc to 45N is ~4_984_944.4m, scaled by k0
        let mid = project_utm(3.0, 45.0, zone).unwrap();
        assert!((mid.easting - 500_000.0).abs() < 1e-6);
        assert!((mid.northing - 4_982_950.4).abs() < 1.0, "{}", mid.northing);

        let west = project_utm(2.0, 45.0, zone).unwrap();
        let east = project_utm(4.0, 45.0, zone).unwrap();
        assert!(((500_000.0 - west.easting) - (east.easting - 500_000.0)).abs() < 1e-6);
    }

    #[test]
    fn test_datum_maps_to_itself() {
        let d = datum();
        let p = to_geo(&d, 0.0, 0.0, 0.0, 0.0).unwrap();
        assert!((p.lon - 2.0).abs() < 1e-9);
        assert!((p.lat - 43.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_within_five_km() {
        let d = datum();
        for &(x, y) in &[
            (0.0, 0.0),
            (10.0, -3.5),
            (1234.567, 987.654),
            (-4999.0, 12.0),
            (3535.0, -3535.0),
        ] {
            let geo = to_geo(&d, 0.0, 0.0, y, x).unwrap();
            let back = to_planar(&d, 0.0, 0.0, geo.lat, geo.lon).unwrap();
            assert!((back.x - x).abs() < 1e-3, "x {x} -> {}", back.x);
            assert!((back.y - y).abs() < 1e-3, "y {y} -> {}", back.y);
        }
    }

    #[test]
    fn test_offset_composition() {
        let d = datum();
        let (ox, oy, y, x) = (1.25, -0.75, 42.0, -17.5);
        let a = to_geo(&d, ox, oy, y, x).unwrap();
        let b = to_geo(&d, 0.0, 0.0, y + oy, x + ox).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_offsets_are_removed_on_inverse() {
        let d = datum();
        let geo = to_geo(&d, 2.0, 3.0, 5.0, 7.0).unwrap();
        let back = to_planar(&d, 2.0, 3.0, geo.lat, geo.lon).unwrap();
        assert!((back.x - 7.0).abs() < 1e-6);
        assert!((back.y - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_unset_datum_is_not_ready() {
        assert!(matches!(Datum::new(0.0, 43.0), Err(MapError::NotReady(_))));
        let settings = HashMap::from([(DATUM_LON_KEY.to_string(), "2.0".to_string())]);
        assert!(matches!(
            Datum::from_settings(&settings),
            Err(MapError::NotReady(_))
        ));
    }

    #[test]
    fn test_datum_from_settings() {
        let settings = HashMap::from([
            (DATUM_LON_KEY.to_string(), "2.0".to_string()),
            (DATUM_LAT_KEY.to_string(), " 43.0 ".to_string()),
        ]);
        let d = Datum::from_settings(&settings).unwrap();
        assert_eq!(d.geo(), GeoPoint::new(2.0, 43.0));
    }

    #[test]
    fn test_flat_earth_close_to_utm_for_short_distances() {
        let d = datum();
        let exact = to_geo(&d, 0.0, 0.0, 10.0, 10.0).unwrap();
        let approx = approx_to_geo(&d, Offsets::default(), 10.0, 10.0);
        // within a few decimeters at 10m
        assert!((exact.lat - approx.lat).abs() * 111_000.0 < 0.5);
        assert!((exact.lon - approx.lon).abs() * 81_000.0 < 0.5);
    }

    #[test]
    fn test_heading_endpoint_points_north() {
        let start = GeoPoint::new(2.0, 43.0);
        let end = heading_endpoint(start, std::f64::consts::FRAC_PI_2, 1.0);
        assert!((end.lon - start.lon).abs() < 1e-12);
        assert!(end.lat > start.lat);
    }

    #[test]
    fn test_quaternion_identity() {
        assert_eq!(quaternion_from_heading(0.0), [0.0, 0.0, 0.0, 1.0]);
    }
}
