//! Geographic search parameters
//!
//! Portals running the spatial extension accept either a bounding box
//! (`ext_bbox=minx,miny,maxx,maxy`) or a point with a radius
//! (`ext_spatial=lon,lat,radius`). Coordinates are WGS84 degrees.

use crate::error::{ClientError, Result};

use super::ParamValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Spatial {
    BBox {
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    },
    Around {
        lon: f64,
        lat: f64,
        radius: f64,
    },
}

fn coordinate(field: &str, value: f64, limit: f64) -> Result<f64> {
    if !value.is_finite() || value.abs() > limit {
        return Err(ClientError::validation(
            field,
            format!("{} is outside [-{}, {}]", value, limit, limit),
        ));
    }
    Ok(value)
}

impl Spatial {
    /// `[min_lon, min_lat, max_lon, max_lat]`
    pub fn bbox(coords: [f64; 4]) -> Result<Self> {
        let [min_lon, min_lat, max_lon, max_lat] = coords;
        let min_lat = coordinate("spatial_query.bbox", min_lat, 90.0)?;
        let max_lat = coordinate("spatial_query.bbox", max_lat, 90.0)?;
        if min_lat > max_lat {
            return Err(ClientError::validation(
                "spatial_query.bbox",
                "south edge is north of the north edge",
            ));
        }
        Ok(Spatial::BBox {
            min_lon: coordinate("spatial_query.bbox", min_lon, 180.0)?,
            min_lat,
            max_lon: coordinate("spatial_query.bbox", max_lon, 180.0)?,
            max_lat,
        })
    }

    /// `[lon, lat]` plus a positive radius
    pub fn around(point: [f64; 2], radius: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(ClientError::validation(
                "spatial_query.radius",
                format!("must be a positive number, got {}", radius),
            ));
        }
        Ok(Spatial::Around {
            lon: coordinate("spatial_query.point", point[0], 180.0)?,
            lat: coordinate("spatial_query.point", point[1], 90.0)?,
            radius,
        })
    }

    /// Parameter name and value for the search request
    pub fn param(&self) -> (&'static str, ParamValue) {
        let list = |values: &[f64]| ParamValue::List(values.iter().map(f64::to_string).collect());
        match *self {
            Spatial::BBox {
                min_lon,
                min_lat,
                max_lon,
                max_lat,
            } => ("ext_bbox", list(&[min_lon, min_lat, max_lon, max_lat])),
            Spatial::Around { lon, lat, radius } => ("ext_spatial", list(&[lon, lat, radius])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_and_radius() {
        let around = Spatial::around([-0.1276, 51.5072], 25.0).unwrap();
        let (name, value) = around.param();
        assert_eq!(name, "ext_spatial");
        assert_eq!(value.render(), "-0.1276,51.5072,25");
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(Spatial::bbox([-200.0, 0.0, 10.0, 10.0]).is_err());
        assert!(Spatial::bbox([0.0, 50.0, 10.0, 40.0]).is_err());
        assert!(Spatial::bbox([0.0, f64::NAN, 10.0, 40.0]).is_err());
        assert!(Spatial::around([0.0, 95.0], 1.0).is_err());
        assert!(Spatial::around([0.0, 0.0], 0.0).is_err());
    }
}
