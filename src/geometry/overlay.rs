//! Polygon overlay used by clip and dissolve.

use geo::{BooleanOps, MultiPolygon};

use super::aoi::AoiGeometry;
use super::measure::{multi_polygon_to_rings, rings_to_multi_polygon, to_multi_polygon};
use super::EsriGeometry;

pub fn aoi_polygons(aoi: &AoiGeometry) -> MultiPolygon<f64> {
    rings_to_multi_polygon(&aoi.rings, &aoi.curve_rings)
}

/// Part of `geometry` inside `boundary`, or `None` when nothing is left.
pub fn clip(geometry: &EsriGeometry, boundary: &MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    let clipped = to_multi_polygon(geometry).intersection(boundary);
    (!clipped.0.is_empty()).then_some(clipped)
}

/// Union of every input, as a multi-part polygon.
pub fn union_all<I>(parts: I) -> MultiPolygon<f64>
where
    I: IntoIterator<Item = MultiPolygon<f64>>,
{
    parts
        .into_iter()
        .reduce(|acc, next| acc.union(&next))
        .unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

pub fn to_esri_polygon(polygons: &MultiPolygon<f64>) -> EsriGeometry {
    EsriGeometry::polygon(multi_polygon_to_rings(polygons))
}
