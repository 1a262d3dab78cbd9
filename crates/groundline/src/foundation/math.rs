//! Math utilities and types
//!
//! Geospatial math in double precision: earth-fixed cartesian positions, the
//! reference ellipsoid and bounding spheres.

pub use nalgebra::Vector3;

/// Earth-fixed cartesian position or direction, in meters
pub type Cartesian3 = Vector3<f64>;

/// Comparison tolerance used by geometric predicates
pub const EPSILON7: f64 = 1.0e-7;

/// Triaxial ellipsoid used to convert between geodetic and cartesian positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Radii along the x, y and z axes
    pub radii: Cartesian3,
}

impl Ellipsoid {
    /// The WGS84 reference ellipsoid
    pub fn wgs84() -> Self {
        Self::new(6_378_137.0, 6_378_137.0, 6_356_752.314_245_179)
    }

    /// Create an ellipsoid from its radii
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            radii: Cartesian3::new(x, y, z),
        }
    }

    /// Squared radii, component-wise
    pub fn radii_squared(&self) -> Cartesian3 {
        self.radii.component_mul(&self.radii)
    }

    /// Surface normal for a geodetic longitude and latitude in radians
    pub fn geodetic_surface_normal(&self, longitude: f64, latitude: f64) -> Cartesian3 {
        let cos_latitude = latitude.cos();
        Cartesian3::new(
            cos_latitude * longitude.cos(),
            cos_latitude * longitude.sin(),
            latitude.sin(),
        )
        .normalize()
    }

    /// Surface normal at a cartesian position on or near the surface
    pub fn geodetic_surface_normal_at(&self, position: &Cartesian3) -> Cartesian3 {
        position
            .component_div(&self.radii_squared())
            .normalize()
    }

    /// Convert a geodetic position (radians, meters above the surface) to cartesian
    pub fn cartographic_to_cartesian(&self, longitude: f64, latitude: f64, height: f64) -> Cartesian3 {
        let n = self.geodetic_surface_normal(longitude, latitude);
        let mut k = self.radii_squared().component_mul(&n);
        let gamma = n.dot(&k).sqrt();
        k /= gamma;
        k + n * height
    }

    /// Scale a position along its geocentric ray onto the ellipsoid surface
    ///
    /// Returns `None` for the origin, which has no defined surface point.
    pub fn scale_to_geocentric_surface(&self, position: &Cartesian3) -> Option<Cartesian3> {
        let r = self.radii_squared();
        let beta = (position.x * position.x / r.x
            + position.y * position.y / r.y
            + position.z * position.z / r.z)
            .sqrt();
        if beta <= f64::EPSILON {
            return None;
        }
        Some(position / beta)
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Build a cartesian position from longitude/latitude in radians on WGS84
pub fn from_radians(longitude: f64, latitude: f64, height: f64) -> Cartesian3 {
    Ellipsoid::wgs84().cartographic_to_cartesian(longitude, latitude, height)
}

/// Build cartesian positions from a flat `[lon, lat, lon, lat, ...]` array in radians
///
/// A trailing unpaired value is ignored.
pub fn from_radians_array(coordinates: &[f64]) -> Vec<Cartesian3> {
    coordinates
        .chunks_exact(2)
        .map(|pair| from_radians(pair[0], pair[1], 0.0))
        .collect()
}

/// Build cartesian positions from a flat `[lon, lat, ...]` array in degrees
pub fn from_degrees_array(coordinates: &[f64]) -> Vec<Cartesian3> {
    coordinates
        .chunks_exact(2)
        .map(|pair| from_radians(pair[0].to_radians(), pair[1].to_radians(), 0.0))
        .collect()
}

/// A bounding sphere in earth-fixed coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// The center position of the sphere
    pub center: Cartesian3,
    /// The radius of the sphere, in meters
    pub radius: f64,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: Cartesian3::zeros(),
            radius: 0.0,
        }
    }
}

impl BoundingSphere {
    /// Creates a new bounding sphere with the given center and radius
    pub fn new(center: Cartesian3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Smallest axis-aligned-box-centered sphere containing all points
    ///
    /// Returns `None` when `points` is empty.
    pub fn from_points(points: &[Cartesian3]) -> Option<Self> {
        let first = points.first()?;
        let (min, max) = points.iter().fold((*first, *first), |(min, max), p| {
            (min.inf(p), max.sup(p))
        });
        let center = (min + max) * 0.5;
        let radius = points
            .iter()
            .map(|p| (p - center).norm())
            .fold(0.0_f64, f64::max);
        Some(Self { center, radius })
    }

    /// Grow the radius by a fixed margin
    pub fn expanded(mut self, margin: f64) -> Self {
        self.radius += margin.max(0.0);
        self
    }

    /// Check whether a point lies inside or on the sphere
    pub fn contains(&self, point: &Cartesian3) -> bool {
        (point - self.center).norm() <= self.radius + EPSILON7
    }
}
