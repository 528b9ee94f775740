//! Mask a raster by a polygon footprint and crop it to the footprint's pixel extent.
//!
//! A pixel belongs to the footprint when its centre lies inside (or on the edge of)
//! any polygon of the geometry; multi-polygons are therefore unioned. The output grid
//! is the minimal window holding every inside pixel, its transform is the input
//! transform shifted to the window origin, and outside pixels inside the window are
//! filled with the raster's nodata value (or `DEFAULT_FILL` when none is declared).
use geo::{Intersects, Point};
use ndarray::{Array2, Zip, s};
use tracing::debug;

use crate::core::geometry::Geometry;
use crate::core::raster::Raster;
use crate::error::{Error, Result};

/// Fill value for masked pixels of rasters without a nodata sentinel.
pub const DEFAULT_FILL: f64 = 0.0;

/// Pixel window (col_off, row_off, cols, rows) inside a raster grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

pub fn clip(raster: &Raster, geometry: &Geometry) -> Result<Raster> {
    let geometry = geometry.to_crs(raster.crs())?;
    if geometry.is_empty() {
        return Err(Error::EmptyClipResult);
    }

    let search = candidate_window(raster, &geometry)?.ok_or(Error::EmptyClipResult)?;
    let mask = footprint_mask(raster, &geometry, search);
    let window = tight_window(&mask, search).ok_or(Error::EmptyClipResult)?;
    debug!(
        col_off = window.col_off,
        row_off = window.row_off,
        cols = window.cols,
        rows = window.rows,
        "Clip window"
    );

    let fill = raster.nodata().unwrap_or(DEFAULT_FILL);
    let rows = window.row_off..window.row_off + window.rows;
    let cols = window.col_off..window.col_off + window.cols;
    let mut bands = raster.bands().slice(s![.., rows, cols]).to_owned();

    let inside = mask.slice(s![
        window.row_off - search.row_off..window.row_off - search.row_off + window.rows,
        window.col_off - search.col_off..window.col_off - search.col_off + window.cols
    ]);
    for mut band in bands.outer_iter_mut() {
        Zip::from(&mut band).and(&inside).for_each(|v, &keep| {
            if !keep {
                *v = fill;
            }
        });
    }

    Raster::new(
        bands,
        raster.transform().shifted(window.col_off, window.row_off),
        raster.crs(),
        Some(fill),
        raster.data_type(),
    )
}

/// Pixel window covering the geometry's bounding box, clamped to the grid.
fn candidate_window(raster: &Raster, geometry: &Geometry) -> Result<Option<Window>> {
    let Some(rect) = geometry.bounding_rect() else {
        return Ok(None);
    };
    let transform = raster.transform();
    let corners = [
        (rect.min().x, rect.min().y),
        (rect.min().x, rect.max().y),
        (rect.max().x, rect.min().y),
        (rect.max().x, rect.max().y),
    ];
    let mut min_col = f64::MAX;
    let mut max_col = f64::MIN;
    let mut min_row = f64::MAX;
    let mut max_row = f64::MIN;
    for (x, y) in corners {
        let (col, row) = transform
            .invert(x, y)
            .ok_or_else(|| Error::Processing("degenerate raster transform".to_string()))?;
        min_col = min_col.min(col);
        max_col = max_col.max(col);
        min_row = min_row.min(row);
        max_row = max_row.max(row);
    }

    let (rows, cols) = raster.shape();
    let c0 = min_col.floor().max(0.0);
    let r0 = min_row.floor().max(0.0);
    let c1 = max_col.ceil().min(cols as f64);
    let r1 = max_row.ceil().min(rows as f64);
    if c1 <= c0 || r1 <= r0 {
        return Ok(None);
    }
    Ok(Some(Window {
        col_off: c0 as usize,
        row_off: r0 as usize,
        cols: (c1 - c0) as usize,
        rows: (r1 - r0) as usize,
    }))
}

/// Inside/outside flags for every pixel of `window`.
fn footprint_mask(raster: &Raster, geometry: &Geometry, window: Window) -> Array2<bool> {
    let transform = *raster.transform();
    let polygons = geometry.polygons();
    let mut mask = Array2::<bool>::from_elem((window.rows, window.cols), false);
    Zip::indexed(&mut mask).par_for_each(|(r, c), inside| {
        let (x, y) = transform.pixel_center(window.col_off + c, window.row_off + r);
        *inside = polygons.intersects(&Point::new(x, y));
    });
    mask
}

/// Smallest window (in raster coordinates) holding every inside pixel of `mask`.
fn tight_window(mask: &Array2<bool>, search: Window) -> Option<Window> {
    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for ((r, c), &inside) in mask.indexed_iter() {
        if !inside {
            continue;
        }
        bounds = Some(match bounds {
            None => (r, r, c, c),
            Some((r0, r1, c0, c1)) => (r0.min(r), r1.max(r), c0.min(c), c1.max(c)),
        });
    }
    bounds.map(|(r0, r1, c0, c1)| Window {
        col_off: search.col_off + c0,
        row_off: search.row_off + r0,
        cols: c1 - c0 + 1,
        rows: r1 - r0 + 1,
    })
}
