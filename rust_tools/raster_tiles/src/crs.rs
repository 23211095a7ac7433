use gdal::spatial_ref::SpatialRef;
use log::warn;
use std::fmt;

/// The distance unit one tile spans along each axis
#[derive(Debug, Clone, PartialEq)]
pub enum GroundUnit {
    Linear { name: String, metres_per_unit: f64 },
    Degrees,
    Unknown,
}

impl fmt::Display for GroundUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroundUnit::Linear {
                name,
                metres_per_unit,
            } => write!(f, "{} ({:.6} m)", name, metres_per_unit),
            GroundUnit::Degrees => write!(f, "degree"),
            GroundUnit::Unknown => write!(f, "unknown unit"),
        }
    }
}

/// Detect the ground unit of a projection given as WKT
pub fn detect_ground_unit(projection_wkt: &str) -> GroundUnit {
    if projection_wkt.trim().is_empty() {
        return GroundUnit::Unknown;
    }

    let spatial_ref = match SpatialRef::from_wkt(projection_wkt) {
        Ok(sr) => sr,
        Err(e) => {
            warn!("Failed to parse projection WKT: {}", e);
            return GroundUnit::Unknown;
        }
    };

    if spatial_ref.is_geographic() {
        return GroundUnit::Degrees;
    }

    if spatial_ref.is_projected() || spatial_ref.is_local() {
        let metres_per_unit = spatial_ref.linear_units();
        let name = spatial_ref
            .linear_units_name()
            .unwrap_or_else(|_| "unnamed".to_string());
        return GroundUnit::Linear {
            name,
            metres_per_unit,
        };
    }

    GroundUnit::Unknown
}

/// Warn when one tile per ground unit is unlikely to be what the caller wants
pub fn check_ground_unit(unit: &GroundUnit) {
    match unit {
        GroundUnit::Degrees => warn!(
            "Geographic CRS detected, tiles will span one degree each; reproject to a metric CRS first"
        ),
        GroundUnit::Unknown => warn!("Unknown CRS, tiles will span one unit of the raster's coordinates"),
        GroundUnit::Linear {
            metres_per_unit, ..
        } if (metres_per_unit - 1.0).abs() >= 0.01 => warn!(
            "Non-metre linear unit detected ({}), tiles will span one such unit",
            unit
        ),
        GroundUnit::Linear { .. } => {}
    }
}
