//! Conversions to `geo` types, Web Mercator projection and area/centroid measures.

use geo::{Area, Centroid, Coord, GeodesicArea, LineString, MapCoords, MultiPolygon, Polygon};
use serde_json::Value;

use super::{EsriGeometry, FeatureSet, Ring, SpatialReference, WEB_MERCATOR_WKID, WGS84_WKID};

const EARTH_RADIUS_M: f64 = 6_378_137.0;
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_78;
const SQUARE_METERS_PER_ACRE: f64 = 4_046.856_422_4;

/// Area units accepted by `calculate` replacements and the area fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaUnit {
    SquareMeters,
    SquareKilometers,
    Hectares,
    Acres,
    SquareMiles,
    SquareFeet,
    SquareYards,
}

impl AreaUnit {
    /// Parse unit names such as `ACRES`, `SquareMeters` or `square_kilometers`.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "SQUAREMETERS" | "SQUAREMETER" => Some(AreaUnit::SquareMeters),
            "SQUAREKILOMETERS" | "SQUAREKILOMETER" => Some(AreaUnit::SquareKilometers),
            "HECTARES" | "HECTARE" => Some(AreaUnit::Hectares),
            "ACRES" | "ACRE" => Some(AreaUnit::Acres),
            "SQUAREMILES" | "SQUAREMILE" => Some(AreaUnit::SquareMiles),
            "SQUAREFEET" | "SQUAREFOOT" => Some(AreaUnit::SquareFeet),
            "SQUAREYARDS" | "SQUAREYARD" => Some(AreaUnit::SquareYards),
            _ => None,
        }
    }

    pub fn square_meters_per_unit(self) -> f64 {
        match self {
            AreaUnit::SquareMeters => 1.0,
            AreaUnit::SquareKilometers => 1_000_000.0,
            AreaUnit::Hectares => 10_000.0,
            AreaUnit::Acres => SQUARE_METERS_PER_ACRE,
            AreaUnit::SquareMiles => 2_589_988.110_336,
            AreaUnit::SquareFeet => 0.092_903_04,
            AreaUnit::SquareYards => 0.836_127_36,
        }
    }

    pub fn from_square_meters(self, square_meters: f64) -> f64 {
        square_meters / self.square_meters_per_unit()
    }
}

pub fn is_web_mercator(wkid: i64) -> bool {
    matches!(wkid, 102100 | 102113 | 3857 | 900913)
}

/// Whether two wkids name the same reference; every Web Mercator alias counts as one.
pub fn same_spatial_reference(a: i64, b: i64) -> bool {
    a == b || (is_web_mercator(a) && is_web_mercator(b))
}

pub fn is_geographic(wkid: i64) -> bool {
    matches!(wkid, 4326 | 4269 | 4258)
}

pub fn web_mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = (y / EARTH_RADIUS_M).sinh().atan().to_degrees();
    (lon, lat)
}

pub fn lon_lat_to_web_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
    let x = EARTH_RADIUS_M * lon.to_radians();
    let y = EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Outcome of reprojecting an AOI input into Web Mercator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Unchanged,
    Projected,
    Unsupported(i64),
}

/// Reproject a WGS84 feature set into Web Mercator in place.
///
/// Web Mercator input (and input with no spatial reference) is left alone;
/// any other reference is left alone and reported as unsupported.
pub fn project_to_web_mercator(features: &mut FeatureSet) -> Projection {
    let wkid = match features.wkid() {
        Some(wkid) => wkid,
        None => return Projection::Unchanged,
    };
    if is_web_mercator(wkid) {
        return Projection::Unchanged;
    }
    if wkid != WGS84_WKID {
        return Projection::Unsupported(wkid);
    }

    let project_ring = |ring: &mut Ring| {
        for coord in ring.iter_mut().filter(|coord| coord.len() >= 2) {
            let (x, y) = lon_lat_to_web_mercator(coord[0], coord[1]);
            coord[0] = x;
            coord[1] = y;
        }
    };

    for geometry in features.features.iter_mut().filter_map(|f| f.geometry.as_mut()) {
        if let Some(rings) = geometry.rings.as_mut() {
            rings.iter_mut().for_each(project_ring);
        }
        if let Some(curve_rings) = geometry.curve_rings.as_mut() {
            curve_rings.iter_mut().for_each(project_curve_ring);
        }
        if let (Some(x), Some(y)) = (geometry.x, geometry.y) {
            let (px, py) = lon_lat_to_web_mercator(x, y);
            geometry.x = Some(px);
            geometry.y = Some(py);
        }
        if geometry.spatial_reference.is_some() {
            geometry.spatial_reference = Some(SpatialReference::from_wkid(WEB_MERCATOR_WKID));
        }
    }
    features.spatial_reference = Some(SpatialReference::from_wkid(WEB_MERCATOR_WKID));
    Projection::Projected
}

/// Project a `[lon, lat, ...]` JSON point in place; anything else is left alone.
fn project_point_value(value: &mut Value) {
    if let Some(coords) = value.as_array_mut() {
        let lon = coords.first().and_then(Value::as_f64);
        let lat = coords.get(1).and_then(Value::as_f64);
        if let (Some(lon), Some(lat)) = (lon, lat) {
            let (x, y) = lon_lat_to_web_mercator(lon, lat);
            coords[0] = Value::from(x);
            coords[1] = Value::from(y);
        }
    }
}

/// Plain vertices and every point of `c`, `a` and `b` segments; arc parameters stay as they are.
fn project_curve_ring(ring: &mut Value) {
    let segments = match ring.as_array_mut() {
        Some(segments) => segments,
        None => return,
    };
    for segment in segments.iter_mut() {
        if segment.is_array() {
            project_point_value(segment);
        } else if let Some(curve) = segment.as_object_mut() {
            for key in ["c", "a", "b"] {
                if let Some(Value::Array(parts)) = curve.get_mut(key) {
                    parts.iter_mut().for_each(project_point_value);
                }
            }
        }
    }
}

fn ring_to_line_string(ring: &Ring) -> LineString<f64> {
    ring.iter()
        .filter(|coord| coord.len() >= 2)
        .map(|coord| Coord {
            x: coord[0],
            y: coord[1],
        })
        .collect::<Vec<_>>()
        .into()
}

/// Vertices of a curve ring. Curve segments (`c`, `a`, `b`) contribute their end point.
fn curve_ring_to_line_string(ring: &Value) -> LineString<f64> {
    let point_of = |value: &Value| -> Option<Coord<f64>> {
        let coords = value.as_array()?;
        Some(Coord {
            x: coords.first()?.as_f64()?,
            y: coords.get(1)?.as_f64()?,
        })
    };

    ring.as_array()
        .map(|segments| {
            segments
                .iter()
                .filter_map(|segment| match segment {
                    Value::Array(_) => point_of(segment),
                    Value::Object(curve) => ["c", "a", "b"]
                        .iter()
                        .find_map(|key| curve.get(*key))
                        .and_then(|parts| parts.as_array()?.first().and_then(point_of)),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
        .into()
}

/// Assemble ArcGIS rings into polygons: clockwise rings open a new polygon,
/// counter-clockwise rings are holes of the polygon before them.
fn assemble_rings(rings: Vec<LineString<f64>>) -> MultiPolygon<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();

    for ring in rings.into_iter().filter(|ring| ring.0.len() >= 3) {
        let signed = Polygon::new(ring.clone(), vec![]).signed_area();
        match polygons.last_mut() {
            Some(last) if signed > 0.0 => last.interiors_push(ring),
            _ => polygons.push(Polygon::new(ring, vec![])),
        }
    }

    MultiPolygon::new(polygons)
}

pub fn rings_to_multi_polygon(rings: &[Ring], curve_rings: &[Value]) -> MultiPolygon<f64> {
    let lines = rings
        .iter()
        .map(ring_to_line_string)
        .chain(curve_rings.iter().map(curve_ring_to_line_string))
        .collect();
    assemble_rings(lines)
}

pub fn to_multi_polygon(geometry: &EsriGeometry) -> MultiPolygon<f64> {
    rings_to_multi_polygon(
        geometry.rings.as_deref().unwrap_or_default(),
        geometry.curve_rings.as_deref().unwrap_or_default(),
    )
}

/// Convert `geo` polygons back to ArcGIS rings (exteriors clockwise, holes counter-clockwise).
pub fn multi_polygon_to_rings(polygons: &MultiPolygon<f64>) -> Vec<Ring> {
    let orient = |line: &LineString<f64>, clockwise: bool| -> Ring {
        let signed = Polygon::new(line.clone(), vec![]).signed_area();
        let mut coords: Vec<Vec<f64>> = line.coords().map(|c| vec![c.x, c.y]).collect();
        if (signed > 0.0) == clockwise {
            coords.reverse();
        }
        coords
    };

    polygons
        .iter()
        .flat_map(|polygon| {
            std::iter::once(orient(polygon.exterior(), true))
                .chain(polygon.interiors().iter().map(|hole| orient(hole, false)))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Geodesic area in square meters.
///
/// Web Mercator coordinates (and coordinates with no declared reference) are
/// un-projected first; geographic coordinates are used as is; any other
/// projected reference falls back to planar area in map units.
pub fn geodesic_area(geometry: &EsriGeometry, wkid: Option<i64>) -> f64 {
    let polygons = to_multi_polygon(geometry);
    match wkid {
        Some(wkid) if is_geographic(wkid) => polygons.geodesic_area_unsigned(),
        Some(wkid) if !is_web_mercator(wkid) => polygons.unsigned_area(),
        _ => polygons
            .map_coords(|Coord { x, y }| {
                let (lon, lat) = web_mercator_to_lon_lat(x, y);
                Coord { x: lon, y: lat }
            })
            .geodesic_area_unsigned(),
    }
}

pub fn geodesic_acres(geometry: &EsriGeometry, wkid: Option<i64>) -> f64 {
    AreaUnit::Acres.from_square_meters(geodesic_area(geometry, wkid))
}

/// Centroid in the geometry's own coordinates.
pub fn centroid(geometry: &EsriGeometry) -> Option<(f64, f64)> {
    if let (Some(x), Some(y)) = (geometry.x, geometry.y) {
        return Some((x, y));
    }
    to_multi_polygon(geometry)
        .centroid()
        .map(|point| (point.x(), point.y()))
}
