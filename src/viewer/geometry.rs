//! Polygon parsing and hit-testing over text line geometry

use super::types::TextLine;

/// Text line polygon prepared for hit-testing and overlay drawing
#[derive(Clone, Debug, PartialEq)]
pub struct PolygonHit {
    /// Flattened `x0, y0, x1, y1, ...` in image pixel space
    pub points: Vec<f64>,
    /// Position of the line in the page's text layer
    pub line_index: usize,
    pub line_id: String,
}

/// Mapping from text layer coordinates to image pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerScale {
    pub x: f64,
    pub y: f64,
}

impl Default for LayerScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl LayerScale {
    pub const IDENTITY: Self = Self { x: 1.0, y: 1.0 };

    /// Scale that stretches the declared page size onto the image's natural size.
    ///
    /// Falls back to identity when either size is unknown.
    #[must_use]
    pub fn between(page_size: (u32, u32), image_size: Option<(u32, u32)>) -> Self {
        let (page_w, page_h) = page_size;
        match image_size {
            Some((img_w, img_h)) if page_w > 0 && page_h > 0 && img_w > 0 && img_h > 0 => Self {
                x: f64::from(img_w) / f64::from(page_w),
                y: f64::from(img_h) / f64::from(page_h),
            },
            _ => Self::IDENTITY,
        }
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        (self.x - 1.0).abs() < f64::EPSILON && (self.y - 1.0).abs() < f64::EPSILON
    }
}

/// Parse whitespace separated "x,y" pairs into a flat list.
///
/// Pairs that do not yield two finite numbers are dropped; parsing continues
/// with the next pair.
#[must_use]
pub fn parse_polygon_points(polygon: &str) -> Vec<f64> {
    let mut points = Vec::new();
    for pair in polygon.split_whitespace() {
        let Some((x, y)) = pair.split_once(',') else {
            continue;
        };
        match (x.parse::<f64>(), y.parse::<f64>()) {
            (Ok(x), Ok(y)) if x.is_finite() && y.is_finite() => {
                points.push(x);
                points.push(y);
            }
            _ => {}
        }
    }
    points
}

/// Even-odd ray casting over a flat point list treated as a closed ring
#[must_use]
pub fn point_in_polygon(px: f64, py: f64, points: &[f64]) -> bool {
    let n = points.len() / 2;
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (points[2 * i], points[2 * i + 1]);
        let (xj, yj) = (points[2 * j], points[2 * j + 1]);
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Build hit regions for every line with at least three vertices
#[must_use]
pub fn build_polygon_hits(lines: &[TextLine]) -> Vec<PolygonHit> {
    build_scaled_polygon_hits(lines, LayerScale::IDENTITY)
}

/// Like [`build_polygon_hits`] with points mapped into image space by `scale`
#[must_use]
pub fn build_scaled_polygon_hits(lines: &[TextLine], scale: LayerScale) -> Vec<PolygonHit> {
    let mut dropped = 0usize;
    let hits: Vec<PolygonHit> = lines
        .iter()
        .enumerate()
        .filter_map(|(line_index, line)| {
            let mut points = parse_polygon_points(&line.polygon);
            if points.len() < 6 {
                dropped += 1;
                return None;
            }
            if !scale.is_identity() {
                for pair in points.chunks_exact_mut(2) {
                    pair[0] *= scale.x;
                    pair[1] *= scale.y;
                }
            }
            Some(PolygonHit {
                points,
                line_index,
                line_id: line.id.clone(),
            })
        })
        .collect();

    if dropped > 0 {
        log::debug!("Dropped {dropped} text lines with fewer than 3 polygon vertices");
    }
    hits
}

/// First hit in list order containing the image point.
///
/// Overlapping polygons are not disambiguated by area or paint order.
#[must_use]
pub fn find_hit_at_image_coord(x: f64, y: f64, hits: &[PolygonHit]) -> Option<&PolygonHit> {
    hits.iter().find(|hit| point_in_polygon(x, y, &hit.points))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: [f64; 8] = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0];

    fn line(id: &str, polygon: &str) -> TextLine {
        TextLine::new(id, polygon, format!("text of {id}"))
    }

    #[test]
    fn parse_skips_bad_pairs() {
        assert_eq!(
            parse_polygon_points("1,2 oops 3,x 4,5 6"),
            vec![1.0, 2.0, 4.0, 5.0]
        );
        assert!(parse_polygon_points("").is_empty());
        assert!(parse_polygon_points("inf,1 NaN,2").is_empty());
    }

    #[test]
    fn parse_accepts_decimals_and_negatives() {
        assert_eq!(parse_polygon_points("-1.5,2.25"), vec![-1.5, 2.25]);
    }

    #[test]
    fn square_contains_center_not_outside() {
        assert!(point_in_polygon(5.0, 5.0, &SQUARE));
        assert!(!point_in_polygon(15.0, 15.0, &SQUARE));
        assert!(!point_in_polygon(-0.5, 5.0, &SQUARE));
    }

    #[test]
    fn degenerate_polygons_have_no_area() {
        assert!(!point_in_polygon(0.0, 0.0, &[]));
        assert!(!point_in_polygon(1.0, 1.0, &[0.0, 0.0, 2.0, 2.0]));
    }

    #[test]
    fn concave_polygon_excludes_notch() {
        // U shape: notch between x 4..6 above y 4
        let points = parse_polygon_points("0,0 10,0 10,10 6,10 6,4 4,4 4,10 0,10");
        assert!(point_in_polygon(2.0, 8.0, &points));
        assert!(!point_in_polygon(5.0, 8.0, &points));
        assert!(point_in_polygon(5.0, 2.0, &points));
    }

    #[test]
    fn build_hits_filters_short_polygons() {
        let lines = vec![
            line("two", "0,0 10,10"),
            line("three", "0,0 10,0 10,10"),
            line("broken", "0,0 a,b 10,10"),
        ];
        let hits = build_polygon_hits(&lines);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line_id, "three");
        assert_eq!(hits[0].line_index, 1);
    }

    #[test]
    fn build_hits_preserves_order() {
        let lines = vec![
            line("a", "0,0 10,0 10,10 0,10"),
            line("b", "20,0 30,0 30,10 20,10"),
        ];
        let ids: Vec<_> = build_polygon_hits(&lines)
            .into_iter()
            .map(|h| h.line_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn first_listed_polygon_wins_overlap() {
        let lines = vec![
            line("big", "0,0 100,0 100,100 0,100"),
            line("small", "40,40 60,40 60,60 40,60"),
        ];
        let hits = build_polygon_hits(&lines);
        let hit = find_hit_at_image_coord(50.0, 50.0, &hits).unwrap();
        assert_eq!(hit.line_id, "big");
        assert!(find_hit_at_image_coord(150.0, 50.0, &hits).is_none());
    }

    #[test]
    fn layer_scale_maps_to_image_size() {
        let scale = LayerScale::between((1000, 2000), Some((500, 1000)));
        assert_eq!(scale, LayerScale { x: 0.5, y: 0.5 });

        let hits = build_scaled_polygon_hits(&[line("a", "0,0 100,0 100,100")], scale);
        assert_eq!(hits[0].points, vec![0.0, 0.0, 50.0, 0.0, 50.0, 50.0]);
    }

    #[test]
    fn layer_scale_identity_when_unknown() {
        assert!(LayerScale::between((0, 0), Some((500, 1000))).is_identity());
        assert!(LayerScale::between((1000, 2000), None).is_identity());
    }
}
