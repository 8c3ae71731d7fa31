//! Rectangular canvas regions and their polygon storage form.
//!
//! # Responsibility
//! - Parse `xywh=` media fragments of canvas references.
//! - Convert regions to and from the closed five-vertex polygon stored in
//!   `curation_elements.area`.
//!
//! # Invariants
//! - Width and height are never negative.
//! - `Region::from_vertices(&region.vertices())` returns `region` unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static POLYGON_WKT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*POLYGON\s*\(\(\s*([^()]*?)\s*\)\)\s*$").expect("valid polygon regex")
});

const XYWH_PREFIX: &str = "xywh=";
const PIXEL_UNIT: &str = "pixel:";
const POLYGON_VERTEX_COUNT: usize = 5;

/// A point of a stored polygon, `(x, y)`.
pub type Vertex = (i64, i64);

/// Error raised while parsing a region from a fragment or polygon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionParseError {
    /// Canvas reference carries no `#xywh=` fragment.
    MissingFragment(String),
    /// Fragment uses a unit other than pixels (e.g. `percent:`).
    UnsupportedUnit(String),
    /// Fragment does not have exactly four comma-separated components.
    ComponentCount(usize),
    /// A component is not an integer.
    InvalidComponent(String),
    /// Width or height is negative.
    NegativeExtent { w: i64, h: i64 },
    /// Stored polygon text is not a `POLYGON((...))` literal.
    InvalidPolygon(String),
    /// Polygon does not have the five vertices of a closed rectangle.
    VertexCount(usize),
    /// Region edges computed from these two values do not fit in `i64`.
    Overflow { origin: i64, extent: i64 },
}

impl Display for RegionParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFragment(value) => write!(f, "no xywh fragment in `{value}`"),
            Self::UnsupportedUnit(value) => write!(f, "unsupported xywh unit in `{value}`"),
            Self::ComponentCount(count) => {
                write!(f, "xywh needs 4 components, got {count}")
            }
            Self::InvalidComponent(value) => write!(f, "invalid xywh component `{value}`"),
            Self::NegativeExtent { w, h } => write!(f, "negative region extent w={w} h={h}"),
            Self::InvalidPolygon(value) => write!(f, "invalid polygon `{value}`"),
            Self::VertexCount(count) => {
                write!(f, "expected {POLYGON_VERTEX_COUNT} polygon vertices, got {count}")
            }
            Self::Overflow { origin, extent } => {
                write!(f, "region bounds from {origin} and {extent} overflow i64")
            }
        }
    }
}

impl Error for RegionParseError {}

/// Axis-aligned rectangle on a canvas: top-left corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl Region {
    /// Creates a region, rejecting negative extents and far edges that
    /// do not fit in an `i64`.
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Result<Self, RegionParseError> {
        if w < 0 || h < 0 {
            return Err(RegionParseError::NegativeExtent { w, h });
        }
        for (origin, extent) in [(x, w), (y, h)] {
            if origin.checked_add(extent).is_none() {
                return Err(RegionParseError::Overflow { origin, extent });
            }
        }
        Ok(Self { x, y, w, h })
    }

    /// Parses `x,y,w,h`, optionally prefixed with `xywh=` and/or `pixel:`.
    pub fn parse_xywh(value: &str) -> Result<Self, RegionParseError> {
        let trimmed = value.trim();
        let body = trimmed.strip_prefix(XYWH_PREFIX).unwrap_or(trimmed);
        let body = body.strip_prefix(PIXEL_UNIT).unwrap_or(body);
        if body.contains(':') {
            return Err(RegionParseError::UnsupportedUnit(value.to_string()));
        }

        let components = body.split(',').map(str::trim).collect::<Vec<_>>();
        if components.len() != 4 {
            return Err(RegionParseError::ComponentCount(components.len()));
        }

        let mut numbers = [0_i64; 4];
        for (slot, component) in numbers.iter_mut().zip(components) {
            *slot = component
                .parse::<i64>()
                .map_err(|_| RegionParseError::InvalidComponent(component.to_string()))?;
        }

        Self::new(numbers[0], numbers[1], numbers[2], numbers[3])
    }

    /// Splits `<canvasUri>#xywh=x,y,w,h` into the canvas URI and its region.
    pub fn split_canvas_fragment(reference: &str) -> Result<(&str, Self), RegionParseError> {
        let (canvas_uri, fragment) = reference
            .split_once('#')
            .ok_or_else(|| RegionParseError::MissingFragment(reference.to_string()))?;
        if !fragment.trim_start().starts_with(XYWH_PREFIX) {
            return Err(RegionParseError::MissingFragment(reference.to_string()));
        }
        Ok((canvas_uri, Self::parse_xywh(fragment)?))
    }

    pub fn max_x(&self) -> i64 {
        self.x.saturating_add(self.w)
    }

    pub fn max_y(&self) -> i64 {
        self.y.saturating_add(self.h)
    }

    /// Returns whether `other` lies completely inside this region.
    ///
    /// Shared edges count as inside, matching `ST_Within` for rectangles.
    pub fn contains(&self, other: &Region) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    /// Closed ring `(x,y) (x+w,y) (x+w,y+h) (x,y+h) (x,y)`.
    pub fn vertices(&self) -> [Vertex; POLYGON_VERTEX_COUNT] {
        [
            (self.x, self.y),
            (self.max_x(), self.y),
            (self.max_x(), self.max_y()),
            (self.x, self.max_y()),
            (self.x, self.y),
        ]
    }

    /// Rebuilds a region from the first three vertices of a closed ring.
    pub fn from_vertices(vertices: &[Vertex]) -> Result<Self, RegionParseError> {
        if vertices.len() != POLYGON_VERTEX_COUNT {
            return Err(RegionParseError::VertexCount(vertices.len()));
        }
        let (p1, p2, p3) = (vertices[0], vertices[1], vertices[2]);
        let w = p2
            .0
            .checked_sub(p1.0)
            .ok_or(RegionParseError::Overflow { origin: p1.0, extent: p2.0 })?;
        let h = p3
            .1
            .checked_sub(p1.1)
            .ok_or(RegionParseError::Overflow { origin: p1.1, extent: p3.1 })?;
        Self::new(p1.0, p1.1, w, h)
    }

    /// Well-known-text polygon used as the stored `area` value.
    pub fn to_polygon_wkt(&self) -> String {
        let ring = self
            .vertices()
            .iter()
            .map(|(x, y)| format!("{x} {y}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("POLYGON(({ring}))")
    }

    /// Parses a stored `POLYGON((...))` value back into a region.
    pub fn from_polygon_wkt(wkt: &str) -> Result<Self, RegionParseError> {
        Self::from_vertices(&parse_polygon_vertices(wkt)?)
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.w, self.h)
    }
}

impl FromStr for Region {
    type Err = RegionParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse_xywh(value)
    }
}

/// Extracts the vertex ring of a WKT polygon without checking its shape.
pub fn parse_polygon_vertices(wkt: &str) -> Result<Vec<Vertex>, RegionParseError> {
    let ring = POLYGON_WKT_RE
        .captures(wkt)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| RegionParseError::InvalidPolygon(wkt.to_string()))?;

    ring.as_str()
        .split(',')
        .map(|pair| {
            let mut coords = pair.split_whitespace().map(str::parse::<i64>);
            match (coords.next(), coords.next(), coords.next()) {
                (Some(Ok(x)), Some(Ok(y)), None) => Ok((x, y)),
                _ => Err(RegionParseError::InvalidPolygon(wkt.to_string())),
            }
        })
        .collect()
}
