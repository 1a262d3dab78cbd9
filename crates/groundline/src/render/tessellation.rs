//! Ground polyline tessellation
//!
//! Turns geometry instances into per-instance vertex counts and bounding
//! volumes. Ground-clamped lines are sampled along the ellipsoid surface and
//! their volumes extended over the whole terrain height range, since the
//! terrain they drape over is not known here.
//!
//! A build runs as a [`TessellationTask`] future that stays pending for a
//! configured number of polls before doing the work, standing in for the
//! worker round-trip of an asynchronous geometry pipeline.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::core::BatchConfig;
use crate::datasource::entity::EntityId;
use crate::datasource::updater::{GeometryInstance, GroundPolylineGeometry, InstanceAttributes};
use crate::foundation::math::{BoundingSphere, Cartesian3, Ellipsoid, EPSILON7};

use super::BuildError;

/// Upper bound on interpolated points per segment
const MAX_SEGMENT_SUBDIVISIONS: usize = 1 << 12;

/// Vertices emitted per sampled surface point (bottom and top of the wall)
const VERTICES_PER_POINT: usize = 2;

/// Parameters shared by every instance of one build
#[derive(Debug, Clone, PartialEq)]
pub struct TessellationOptions {
    /// Pending polls before the task does its work
    pub latency_frames: u32,
    /// Lowest terrain height covered by bounding volumes
    pub min_terrain_height: f64,
    /// Highest terrain height covered by bounding volumes
    pub max_terrain_height: f64,
    /// Reference ellipsoid
    pub ellipsoid: Ellipsoid,
}

impl From<&BatchConfig> for TessellationOptions {
    fn from(config: &BatchConfig) -> Self {
        Self {
            latency_frames: config.effective_latency(),
            min_terrain_height: config.min_terrain_height,
            max_terrain_height: config.max_terrain_height,
            ellipsoid: Ellipsoid::wgs84(),
        }
    }
}

impl Default for TessellationOptions {
    fn default() -> Self {
        Self::from(&BatchConfig::default())
    }
}

/// Tessellation output for one instance
#[derive(Debug, Clone, PartialEq)]
pub struct TessellatedInstance {
    /// Entity the instance came from
    pub id: EntityId,
    /// Attribute values at creation
    pub attributes: InstanceAttributes,
    /// Vertices produced; zero when the geometry is degenerate
    pub vertex_count: usize,
    /// Bounds of the draped volume; `None` when the geometry is degenerate
    pub bounding_sphere: Option<BoundingSphere>,
}

/// Tessellation output for a whole build
#[derive(Debug, Clone, PartialEq)]
pub struct TessellatedGeometry {
    /// One entry per input instance, in input order
    pub instances: Vec<TessellatedInstance>,
}

impl TessellatedGeometry {
    /// Total vertices across instances
    pub fn vertex_count(&self) -> usize {
        self.instances.iter().map(|i| i.vertex_count).sum()
    }
}

fn nearly_equal(a: &Cartesian3, b: &Cartesian3) -> bool {
    (a - b).norm() <= EPSILON7 * a.norm().max(b.norm()).max(1.0)
}

/// Positions with consecutive duplicates removed, closed if requested
fn distinct_positions(geometry: &GroundPolylineGeometry) -> Vec<Cartesian3> {
    let mut positions: Vec<Cartesian3> = Vec::with_capacity(geometry.positions.len() + 1);
    for position in &geometry.positions {
        if positions.last().map_or(true, |last| !nearly_equal(last, position)) {
            positions.push(*position);
        }
    }
    if geometry.closed && positions.len() > 2 {
        if let Some(first) = positions.first().copied() {
            if positions.last().map_or(false, |last| !nearly_equal(last, &first)) {
                positions.push(first);
            }
        }
    }
    positions
}

/// Sample the polyline along the surface
///
/// Returns `None` when fewer than two distinct surface positions remain.
pub fn surface_samples(
    geometry: &GroundPolylineGeometry,
    ellipsoid: &Ellipsoid,
) -> Option<Vec<Cartesian3>> {
    let surface: Vec<Cartesian3> = distinct_positions(geometry)
        .iter()
        .filter_map(|p| ellipsoid.scale_to_geocentric_surface(p))
        .collect();
    if surface.len() < 2 {
        return None;
    }

    let granularity = if geometry.granularity.is_finite() && geometry.granularity > 0.0 {
        geometry.granularity
    } else {
        crate::datasource::polyline::DEFAULT_GRANULARITY
    };

    let mut samples = Vec::with_capacity(surface.len());
    samples.push(surface[0]);
    for segment in surface.windows(2) {
        let (start, end) = (segment[0], segment[1]);
        let length = (end - start).norm();
        let subdivisions = ((length / granularity).ceil() as usize).clamp(1, MAX_SEGMENT_SUBDIVISIONS);
        for step in 1..=subdivisions {
            let t = step as f64 / subdivisions as f64;
            let interpolated = start.lerp(&end, t);
            if let Some(point) = ellipsoid.scale_to_geocentric_surface(&interpolated) {
                samples.push(point);
            }
        }
    }
    Some(samples)
}

/// Tessellate one instance
pub fn tessellate_instance(
    instance: &GeometryInstance,
    options: &TessellationOptions,
) -> TessellatedInstance {
    let ellipsoid = &options.ellipsoid;
    let (vertex_count, bounding_sphere) = match surface_samples(&instance.geometry, ellipsoid) {
        Some(samples) => {
            let extruded: Vec<Cartesian3> = samples
                .iter()
                .flat_map(|point| {
                    let normal = ellipsoid.geodetic_surface_normal_at(point);
                    [
                        point + normal * options.min_terrain_height,
                        point + normal * options.max_terrain_height,
                    ]
                })
                .collect();
            let sphere = BoundingSphere::from_points(&extruded)
                .map(|sphere| sphere.expanded(instance.geometry.width * 0.5));
            (samples.len() * VERTICES_PER_POINT, sphere)
        }
        None => (0, None),
    };

    TessellatedInstance {
        id: instance.id,
        attributes: instance.attributes,
        vertex_count,
        bounding_sphere,
    }
}

/// Tessellate every instance of a build
///
/// Fails when no instance produces geometry.
pub fn tessellate(
    instances: &[GeometryInstance],
    options: &TessellationOptions,
) -> Result<TessellatedGeometry, BuildError> {
    let tessellated: Vec<TessellatedInstance> = instances
        .iter()
        .map(|instance| tessellate_instance(instance, options))
        .collect();

    if tessellated.iter().all(|instance| instance.vertex_count == 0) {
        return Err(BuildError::NoRenderableGeometry(instances.len()));
    }

    Ok(TessellatedGeometry {
        instances: tessellated,
    })
}

/// Deferred tessellation of one build
#[derive(Debug)]
pub struct TessellationTask {
    remaining_frames: u32,
    request: Option<(Vec<GeometryInstance>, TessellationOptions)>,
}

impl TessellationTask {
    /// Create a task that completes on poll number `options.latency_frames + 1`
    pub fn new(instances: Vec<GeometryInstance>, options: TessellationOptions) -> Self {
        Self {
            remaining_frames: options.latency_frames,
            request: Some((instances, options)),
        }
    }
}

impl Future for TessellationTask {
    type Output = Result<TessellatedGeometry, BuildError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.remaining_frames > 0 {
            self.remaining_frames -= 1;
            cx.waker().wake_by_ref();
            return Poll::Pending;
        }

        let Some((instances, options)) = self.request.take() else {
            return Poll::Ready(Err(BuildError::AlreadyCompleted));
        };
        Poll::Ready(tessellate(&instances, &options))
    }
}
