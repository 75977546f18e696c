//! Geometry derivation.
//!
//! Maps array indices to physical space. Two source conventions feed the same
//! result: per-axis direction vectors (magnitude encodes spacing, `null`
//! marks a non-spatial axis) straight from the header, or imaging-style
//! row/column direction cosines with pixel spacings and recorded slice
//! positions. Either way the output is an affine basis - one vector per
//! spatial axis plus an origin point.

use crate::header::Header;
use crate::util::{Error, Result};
use serde_json::Value;

pub use glam::DVec3;

/// Vectors shorter than this are treated as zero-length.
const DEGENERATE_EPSILON: f64 = 1e-12;

/// Derived voxel-to-physical mapping.
///
/// `directions[i]` is the physical displacement per unit increase of axis
/// `i`, spacing included; `None` marks a non-spatial axis. Frozen once
/// derived, like the header it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    directions: Vec<Option<DVec3>>,
    spacings: Vec<f64>,
    origin: DVec3,
}

impl Geometry {
    /// Per-axis basis vectors, spacing included.
    #[inline]
    pub fn directions(&self) -> &[Option<DVec3>] {
        &self.directions
    }

    /// Per-axis spacing (basis magnitude; 1.0 for non-spatial axes).
    #[inline]
    pub fn spacings(&self) -> &[f64] {
        &self.spacings
    }

    /// Physical position of index (0, 0, ...).
    #[inline]
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    /// Unit direction of a spatial axis, or `None` for non-spatial axes and
    /// zero-length bases.
    pub fn unit_direction(&self, axis: usize) -> Option<DVec3> {
        let v = self.directions.get(axis).copied().flatten()?;
        let len = v.length();
        (len > DEGENERATE_EPSILON).then(|| v / len)
    }

    /// Derive geometry from a parsed header.
    ///
    /// With `space_directions` alone, each vector's magnitude encodes the
    /// axis spacing. With `spacings` alongside, the vectors are unit
    /// directions scaled by the explicit spacing. With `spacings` alone the
    /// basis runs along the identity axes; with neither, unit spacing. The
    /// origin comes from `space_origin`, defaulting to zeros. A `space`
    /// naming a left-posterior-superior frame flips the x and y components of
    /// directions and origin into the right-anterior-superior convention.
    pub fn from_header(header: &Header) -> Result<Self> {
        let dimension = header.dimension()?;
        let flip = space_flips_xy(header.space());
        let explicit_spacings = explicit_spacings(header, dimension)?;

        let mut directions: Vec<Option<DVec3>> = Vec::with_capacity(dimension);
        let mut spacings: Vec<f64> = Vec::with_capacity(dimension);

        if let Some(rows) = header.field("space_directions").and_then(Value::as_array) {
            if rows.len() != dimension {
                return Err(Error::DimensionMismatch {
                    field: "space_directions",
                    expected: dimension,
                    actual: rows.len(),
                });
            }
            for (axis, row) in rows.iter().enumerate() {
                match vector_entry(row)? {
                    Some(mut v) => {
                        if flip {
                            v.x = -v.x;
                            v.y = -v.y;
                        }
                        if let Some(explicit) = &explicit_spacings {
                            v *= explicit[axis];
                        }
                        let len = v.length();
                        spacings.push(if len > DEGENERATE_EPSILON { len } else { 1.0 });
                        directions.push(Some(v));
                    }
                    None => {
                        directions.push(None);
                        spacings.push(1.0);
                    }
                }
            }
        } else if let Some(explicit) = &explicit_spacings {
            for (axis, &spacing) in explicit.iter().enumerate() {
                spacings.push(spacing);
                directions.push(identity_axis(axis).map(|e| e * spacing));
            }
        } else {
            for axis in 0..dimension {
                spacings.push(1.0);
                directions.push(identity_axis(axis));
            }
        }

        let mut origin = DVec3::ZERO;
        if let Some(entries) = header.field("space_origin").and_then(Value::as_array) {
            for (i, entry) in entries.iter().take(3).enumerate() {
                let value = entry
                    .as_f64()
                    .ok_or_else(|| Error::field("space_origin", "expected numeric entries"))?;
                origin[i] = value;
            }
            if flip {
                origin.x = -origin.x;
                origin.y = -origin.y;
            }
        }

        Ok(Self {
            directions,
            spacings,
            origin,
        })
    }
}

/// One slice position source for an imaging-style geometry.
#[derive(Clone, Debug, PartialEq)]
pub enum SlicePositions {
    /// A single slice at the given recorded position.
    Single(DVec3),
    /// A first/last recorded position pair with the total slice count.
    Range {
        first: DVec3,
        last: DVec3,
        count: usize,
    },
}

/// Imaging-convention geometry source: in-plane direction cosines and pixel
/// spacings plus recorded slice position(s).
#[derive(Clone, Debug, PartialEq)]
pub struct ImagingGeometry {
    /// Unit direction along increasing column index (across a row).
    pub row_cosine: DVec3,
    /// Unit direction along increasing row index (down a column).
    pub column_cosine: DVec3,
    /// Physical distance between columns.
    pub row_spacing: f64,
    /// Physical distance between rows.
    pub column_spacing: f64,
    /// Recorded slice position(s).
    pub positions: SlicePositions,
    /// Explicit through-plane spacing, used only for single-slice stacks.
    pub slice_spacing: Option<f64>,
}

impl ImagingGeometry {
    /// Derive the three-axis affine basis and origin.
    ///
    /// The through-plane vector is exact for multi-slice stacks:
    /// `(last - first) / (count - 1)` is the unique vector making the affine
    /// map the last slice's index to its recorded position. For a single
    /// slice it falls back to the plane normal scaled by the explicit slice
    /// spacing (1.0 when absent).
    pub fn derive(&self) -> Result<Geometry> {
        // degenerate in-plane vectors are rejected up front
        plane_normal(self.row_cosine, self.column_cosine)?;

        let row_basis = self.row_cosine * self.row_spacing;
        let column_basis = self.column_cosine * self.column_spacing;

        let (through, origin) = match self.positions {
            SlicePositions::Single(position) => {
                let spacing = self.slice_spacing.unwrap_or(1.0);
                (
                    self.row_cosine.cross(self.column_cosine) * spacing,
                    position,
                )
            }
            SlicePositions::Range { first, last, count } => match count {
                0 => {
                    return Err(Error::DegenerateGeometry(
                        "slice count is zero".to_string(),
                    ))
                }
                1 => {
                    let spacing = self.slice_spacing.unwrap_or(1.0);
                    (self.row_cosine.cross(self.column_cosine) * spacing, first)
                }
                n => ((last - first) / (n as f64 - 1.0), first),
            },
        };

        let spacings = vec![
            row_basis.length(),
            column_basis.length(),
            through.length(),
        ];
        Ok(Geometry {
            directions: vec![Some(row_basis), Some(column_basis), Some(through)],
            spacings,
            origin,
        })
    }
}

/// Slice-ordering sort key: the recorded position projected onto the plane
/// normal.
///
/// An affine function of the true slice index (slope = slice spacing), so
/// sorting by it orders any stack correctly regardless of input presentation
/// order or vendor-specific numbering fields.
pub fn slice_sort_key(position: DVec3, row_cosine: DVec3, column_cosine: DVec3) -> Result<f64> {
    let normal = plane_normal(row_cosine, column_cosine)?;
    Ok(position.dot(normal))
}

/// Unit normal of the imaging plane; degenerate row/column vectors are a
/// validation error, never silently defaulted.
fn plane_normal(row_cosine: DVec3, column_cosine: DVec3) -> Result<DVec3> {
    if row_cosine.length() < DEGENERATE_EPSILON {
        return Err(Error::DegenerateGeometry(
            "row direction has zero length".to_string(),
        ));
    }
    if column_cosine.length() < DEGENERATE_EPSILON {
        return Err(Error::DegenerateGeometry(
            "column direction has zero length".to_string(),
        ));
    }
    let cross = row_cosine.cross(column_cosine);
    let len = cross.length();
    if len < DEGENERATE_EPSILON {
        return Err(Error::DegenerateGeometry(
            "row and column directions are parallel".to_string(),
        ));
    }
    Ok(cross / len)
}

/// True when the named coordinate space requires an x/y sign flip into the
/// right-anterior-superior convention.
pub fn space_flips_xy(space: Option<&str>) -> bool {
    matches!(
        space,
        Some("left-posterior-superior") | Some("left_posterior_superior") | Some("LPS")
    )
}

/// Explicit per-axis spacings, present only when the `spacings` field is.
fn explicit_spacings(header: &Header, dimension: usize) -> Result<Option<Vec<f64>>> {
    let Some(entries) = header.field("spacings").and_then(Value::as_array) else {
        return Ok(None);
    };
    if entries.len() != dimension {
        return Err(Error::DimensionMismatch {
            field: "spacings",
            expected: dimension,
            actual: entries.len(),
        });
    }
    entries
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| Error::field("spacings", "expected numeric entries"))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn identity_axis(axis: usize) -> Option<DVec3> {
    match axis {
        0 => Some(DVec3::X),
        1 => Some(DVec3::Y),
        2 => Some(DVec3::Z),
        _ => None,
    }
}

/// Read one `space_directions` entry: a numeric array, or `null` for a
/// non-spatial axis (an empty array also counts, as some writers emit it).
fn vector_entry(value: &Value) -> Result<Option<DVec3>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(entries) if entries.is_empty() => Ok(None),
        Value::Array(entries) => {
            let mut v = DVec3::ZERO;
            for (i, entry) in entries.iter().take(3).enumerate() {
                v[i] = entry.as_f64().ok_or_else(|| {
                    Error::field("space_directions", "expected numeric entries")
                })?;
            }
            Ok(Some(v))
        }
        _ => Err(Error::field(
            "space_directions",
            "expected an array or null per axis",
        )),
    }
}
