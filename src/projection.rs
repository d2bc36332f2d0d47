//! Spherical map projections matching those used by the grid preprocessor.
//!
//! All transforms work on a sphere of radius [`EARTH_RADIUS`] and return projected
//! coordinates in metres. Only differences between projected points are meaningful: no false
//! easting or northing is applied.

use {
    crate::error::{Error, Result},
    std::{
        f64::consts::{FRAC_PI_2, FRAC_PI_4},
        fmt,
        str::FromStr,
    },
};

/// Radius of the sphere assumed by the model, in metres
pub const EARTH_RADIUS: f64 = 6_370_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    Lambert,
    Mercator,
    Polar,
    LatLon,
}

impl ProjectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionKind::Lambert => "lambert",
            ProjectionKind::Mercator => "mercator",
            ProjectionKind::Polar => "polar",
            ProjectionKind::LatLon => "lat-lon",
        }
    }
}

impl FromStr for ProjectionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lambert" => Ok(ProjectionKind::Lambert),
            "mercator" => Ok(ProjectionKind::Mercator),
            "polar" => Ok(ProjectionKind::Polar),
            "lat-lon" => Ok(ProjectionKind::LatLon),
            _ => Err(Error::UnsupportedProjection { kind: s.to_owned() }),
        }
    }
}

impl fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map projection and base grid spacing of the root domain
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub kind: ProjectionKind,
    /// Latitude of the root domain centre
    pub ref_lat: f64,
    /// Longitude of the root domain centre
    pub ref_lon: f64,
    pub stand_lon: f64,
    pub truelat1: Option<f64>,
    pub truelat2: Option<f64>,
    pub pole_lat: f64,
    pub pole_lon: f64,
    /// Grid spacing of the root domain in metres
    pub dx: f64,
    pub dy: f64,
}

impl Projection {
    fn truelats(&self) -> (f64, f64) {
        let lat1 = self.truelat1.unwrap_or(self.ref_lat);
        (lat1, self.truelat2.unwrap_or(lat1))
    }
}

/// Geographic <-> projected transform with its constants precomputed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Lambert conformal conic, origin at (`ref_lat`, `stand_lon`)
    Lambert {
        n: f64,
        /// Earth radius times the cone constant F
        rf: f64,
        rho0: f64,
        lon0: f64,
    },
    /// Mercator, true at `truelat1`
    Mercator { k: f64, lon0: f64 },
    /// Polar stereographic, true at `truelat1`, pole chosen by its hemisphere
    Polar { hemisphere: f64, scale: f64, lon0: f64 },
}

impl Transform {
    pub fn new(projection: &Projection) -> Result<Self> {
        let lon0 = projection.stand_lon.to_radians();
        let (lat1, lat2) = projection.truelats();
        let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());

        match projection.kind {
            ProjectionKind::Lambert => {
                let n = if (phi1 - phi2).abs() < 1.0e-10 {
                    phi1.sin()
                } else {
                    (phi1.cos() / phi2.cos()).ln() / (cone_t(phi2) / cone_t(phi1)).ln()
                };
                let rf = EARTH_RADIUS * phi1.cos() * cone_t(phi1).powf(n) / n;
                let rho0 = rf / cone_t(projection.ref_lat.to_radians()).powf(n);

                Ok(Transform::Lambert { n, rf, rho0, lon0 })
            }
            ProjectionKind::Mercator => Ok(Transform::Mercator {
                k: EARTH_RADIUS * phi1.cos(),
                lon0,
            }),
            ProjectionKind::Polar => {
                let hemisphere = if lat1 < 0.0 { -1.0 } else { 1.0 };
                Ok(Transform::Polar {
                    hemisphere,
                    scale: EARTH_RADIUS * (1.0 + hemisphere * phi1.sin()),
                    lon0,
                })
            }
            ProjectionKind::LatLon => Err(Error::UnsupportedProjection {
                kind: projection.kind.to_string(),
            }),
        }
    }

    /// Projects (`lat`, `lon`) in degrees to (x, y) in metres
    pub fn forward(&self, lat: f64, lon: f64) -> (f64, f64) {
        let phi = lat.to_radians();

        match *self {
            Transform::Lambert { n, rf, rho0, lon0 } => {
                let rho = rf / cone_t(phi).powf(n);
                let theta = n * wrap(lon.to_radians() - lon0);
                (rho * theta.sin(), rho0 - rho * theta.cos())
            }
            Transform::Mercator { k, lon0 } => (
                k * wrap(lon.to_radians() - lon0),
                k * (FRAC_PI_4 + phi / 2.0).tan().ln(),
            ),
            Transform::Polar {
                hemisphere: h,
                scale,
                lon0,
            } => {
                let rho = scale * (FRAC_PI_4 - h * phi / 2.0).tan();
                let dlon = wrap(lon.to_radians() - lon0);
                (rho * dlon.sin(), -h * rho * dlon.cos())
            }
        }
    }

    /// Inverse of [`Transform::forward`], returning (lat, lon) in degrees
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let (phi, lambda) = match *self {
            Transform::Lambert { n, rf, rho0, lon0 } => {
                let sign = n.signum();
                let rho = sign * x.hypot(rho0 - y);
                let theta = (sign * x).atan2(sign * (rho0 - y));
                let phi = 2.0 * (rf / rho).powf(1.0 / n).atan() - FRAC_PI_2;
                (phi, theta / n + lon0)
            }
            Transform::Mercator { k, lon0 } => {
                (2.0 * (y / k).exp().atan() - FRAC_PI_2, x / k + lon0)
            }
            Transform::Polar {
                hemisphere: h,
                scale,
                lon0,
            } => {
                let rho = x.hypot(y);
                let phi = h * (FRAC_PI_2 - 2.0 * (rho / scale).atan());
                (phi, lon0 + x.atan2(-h * y))
            }
        };

        (phi.to_degrees(), normalise_lon(lambda.to_degrees()))
    }
}

fn cone_t(phi: f64) -> f64 {
    (FRAC_PI_4 + phi / 2.0).tan()
}

/// Wraps an angle in radians to [-pi, pi)
fn wrap(angle: f64) -> f64 {
    use std::f64::consts::PI;
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Wraps a longitude in degrees to [-180, 180)
pub fn normalise_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod test {
    use {super::*, approx::assert_abs_diff_eq};

    fn projection(kind: ProjectionKind, ref_lat: f64, truelat: f64) -> Projection {
        Projection {
            kind,
            ref_lat,
            ref_lon: 170.0,
            stand_lon: 170.0,
            truelat1: Some(truelat),
            truelat2: Some(truelat),
            pole_lat: 90.0,
            pole_lon: 0.0,
            dx: 27000.0,
            dy: 27000.0,
        }
    }

    fn round_trip(p: &Projection, points: &[(f64, f64)]) {
        let t = Transform::new(p).unwrap();
        for &(lat, lon) in points {
            let (x, y) = t.forward(lat, lon);
            let (lat2, lon2) = t.inverse(x, y);
            assert_abs_diff_eq!(lat, lat2, epsilon = 1.0e-9);
            assert_abs_diff_eq!(normalise_lon(lon), lon2, epsilon = 1.0e-9);
        }
    }

    #[test]
    fn lambert_round_trip() {
        let points = [(-40.0, 170.0), (-35.5, 175.25), (-47.0, 166.0), (-41.0, -179.5)];
        round_trip(&projection(ProjectionKind::Lambert, -40.0, -40.0), &points);

        let mut secant = projection(ProjectionKind::Lambert, 45.0, 30.0);
        secant.truelat2 = Some(60.0);
        round_trip(&secant, &[(45.0, 170.0), (50.0, 160.0), (38.0, 178.0)]);
    }

    #[test]
    fn mercator_round_trip() {
        round_trip(
            &projection(ProjectionKind::Mercator, 10.0, 10.0),
            &[(0.0, 170.0), (12.5, 150.0), (-20.0, -175.0)],
        );
    }

    #[test]
    fn polar_round_trip_both_hemispheres() {
        round_trip(
            &projection(ProjectionKind::Polar, 70.0, 60.0),
            &[(70.0, 170.0), (80.0, 10.0), (55.0, -120.0)],
        );
        round_trip(
            &projection(ProjectionKind::Polar, -70.0, -60.0),
            &[(-70.0, 170.0), (-80.0, 10.0), (-55.0, -120.0)],
        );
    }

    #[test]
    fn lambert_origin_and_true_scale() {
        let t = Transform::new(&projection(ProjectionKind::Lambert, -40.0, -40.0)).unwrap();

        let (x, y) = t.forward(-40.0, 170.0);
        assert_abs_diff_eq!(x, 0.0, epsilon = 1.0e-6);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1.0e-6);

        // Distance along the true latitude matches the great-circle arc length
        let (x1, y1) = t.forward(-40.0, 170.01);
        let arc = EARTH_RADIUS * (-40.0f64).to_radians().cos() * 0.01f64.to_radians();
        assert_abs_diff_eq!(x1.hypot(y1), arc, epsilon = 1.0e-3);
    }

    #[test]
    fn parse_kind() {
        assert_eq!("Lambert".parse::<ProjectionKind>().unwrap(), ProjectionKind::Lambert);
        assert_eq!("polar".parse::<ProjectionKind>().unwrap(), ProjectionKind::Polar);
        assert!(matches!(
            "rotated_ll".parse::<ProjectionKind>(),
            Err(Error::UnsupportedProjection { .. })
        ));
        assert!(matches!(
            Transform::new(&projection(ProjectionKind::LatLon, 0.0, 0.0)),
            Err(Error::UnsupportedProjection { .. })
        ));
    }
}
