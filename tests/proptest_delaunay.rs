//! Property-based tests for the Delaunay builder and its supporting pieces.
//!
//! - Empty circumcircle condition for random point sets
//! - Mesh invariants after every stage
//! - Point-location correctness from arbitrary start faces
//! - Normalize / unnormalize round trip
//! - Clustered integer font units: strictly clockwise faces covering the hull
//! - Serialization round trips of output types

#![allow(missing_docs)]

use glyphmesh::prelude::*;
use proptest::prelude::*;

// =============================================================================
// TEST CONFIGURATION
// =============================================================================

fn finite_coordinate() -> impl Strategy<Value = f64> {
    (-100.0..100.0).prop_filter("must be finite", |x: &f64| x.is_finite())
}

fn point() -> impl Strategy<Value = Point2> {
    (finite_coordinate(), finite_coordinate()).prop_map(|(x, y)| Point2::new(x, y))
}

/// Point sets with a non-degenerate bounding box.
fn point_set(max: usize) -> impl Strategy<Value = Vec<Point2>> {
    prop::collection::vec(point(), 3..max).prop_filter("needs a 2D extent", |points| {
        Aabb::from_points(points.iter().copied())
            .is_some_and(|b| b.width() > 1e-3 && b.height() > 1e-3)
    })
}

/// Integer font units clustered in a 40 x 40 block of a 2048 em.
fn clustered_font_units(ys: std::ops::Range<u32>) -> impl Strategy<Value = Vec<Point2>> {
    prop::collection::vec((1000_u32..1040, ys), 5..60).prop_map(|coords| {
        coords
            .into_iter()
            .map(|(x, y)| Point2::new(f64::from(x), f64::from(y)))
            .collect()
    })
}

fn em_square() -> Vec<Point2> {
    vec![
        Point2::new(0.0, 0.0),
        Point2::new(2048.0, 0.0),
        Point2::new(2048.0, 2048.0),
        Point2::new(0.0, 2048.0),
    ]
}

fn assert_covers_em_square(cdt: &ConstrainedTriangulation) -> Result<(), TestCaseError> {
    prop_assert!(cdt.mesh().validate().is_ok());
    prop_assert!(cdt.report().is_complete());
    let triangles = cdt.triangles().unwrap();
    for t in &triangles {
        prop_assert!(t.signed_area2() < 0.0, "{:?} is not strictly clockwise", t);
    }
    let area: f64 = triangles.iter().map(Triangle2::area).sum();
    prop_assert!(
        (area - 2048.0 * 2048.0).abs() <= 1e-6 * 2048.0 * 2048.0,
        "covered area {} differs from the em square",
        area
    );
    Ok(())
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_random_points_are_delaunay(points in point_set(40)) {
        let dt = triangulate_points(&points, TriangulationOptions::default()).unwrap();
        prop_assert!(dt.mesh().validate().is_ok());
        prop_assert!(dt.report().exhausted.is_empty());
        prop_assert!(dt.validate_delaunay().is_ok());
    }

    #[test]
    fn prop_builder_keeps_invariants_before_cleanup(points in point_set(30)) {
        let normalizer = Normalizer::new(points.iter().copied()).unwrap();
        let normalized = normalizer.normalize_all(&points);
        let dt = IncrementalDelaunay::from_points(
            &normalized,
            HintStrategy::Seeded(3),
            IterationLimits::default(),
        )
        .unwrap();
        prop_assert!(dt.mesh().validate().is_ok());
        prop_assert!(find_delaunay_violations(dt.mesh(), None).unwrap().is_empty());
        // Every input point maps to a vertex, directly or through a merge.
        for p in &normalized {
            prop_assert!(dt.resolve(*p).is_some());
        }
    }

    #[test]
    fn prop_walk_finds_containing_face(
        points in point_set(30),
        fx in 0.0..1.0_f64,
        fy in 0.0..1.0_f64,
    ) {
        let normalizer = Normalizer::new(points.iter().copied()).unwrap();
        let dt = IncrementalDelaunay::from_points(
            &normalizer.normalize_all(&points),
            HintStrategy::default(),
            IterationLimits::default(),
        )
        .unwrap();
        let mesh = dt.mesh();
        // Any point of the unit box lies inside the super triangle.
        let query = Point2::new(fx, fy);
        let expected = locate(mesh, query, None).unwrap();
        for start in mesh.face_keys() {
            let found = locate(mesh, query, Some(start)).unwrap();
            let [a, b, c] = mesh.face_positions(found).unwrap();
            prop_assert!(
                side_of_line(a, b, query) != LineSide::LEFT
                    && side_of_line(b, c, query) != LineSide::LEFT
                    && side_of_line(c, a, query) != LineSide::LEFT
            );
            // Off shared edges the containing face is unique.
            let on_edge = [(a, b), (b, c), (c, a)]
                .iter()
                .any(|&(p, q)| side_of_line(p, q, query) == LineSide::ON);
            if !on_edge {
                prop_assert_eq!(found, expected);
            }
        }
    }

    #[test]
    fn prop_normalize_round_trip(points in point_set(20), p in point()) {
        let normalizer = Normalizer::new(points.iter().copied()).unwrap();
        let back = normalizer.unnormalize(normalizer.normalize(p));
        prop_assert!((back.x - p.x).abs() <= 1e-5);
        prop_assert!((back.y - p.y).abs() <= 1e-5);
        for q in normalizer.normalize_all(&points) {
            prop_assert!(q.x >= -1e-12 && q.x <= 1.0 + 1e-12);
            prop_assert!(q.y >= -1e-12 && q.y <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn prop_convex_polygon_triangle_count(n in 3_usize..24, radius in 0.5..500.0_f64) {
        #[allow(clippy::cast_precision_loss)]
        let hull: Vec<Point2> = (0..n)
            .map(|i| {
                let angle = std::f64::consts::TAU * i as f64 / n as f64;
                Point2::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect();
        let cdt = ConstrainedTriangulation::new(&[], &hull, &[], TriangulationOptions::default())
            .unwrap();
        prop_assert_eq!(cdt.number_of_triangles(), n - 2);
        for p in &hull {
            prop_assert!(cdt.mesh().vertex_at(*p).is_some());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_clustered_font_units_stay_clockwise(points in clustered_font_units(1000..1040)) {
        let cdt = ConstrainedTriangulation::new(
            &points,
            &em_square(),
            &[],
            TriangulationOptions::default(),
        )
        .unwrap();
        assert_covers_em_square(&cdt)?;
    }

    #[test]
    fn prop_points_on_hull_edge_keep_the_outline(points in clustered_font_units(0..40)) {
        let cdt = ConstrainedTriangulation::new(
            &points,
            &em_square(),
            &[],
            TriangulationOptions::default(),
        )
        .unwrap();
        assert_covers_em_square(&cdt)?;
        for p in points.iter().filter(|p| p.y == 0.0) {
            prop_assert!(cdt.mesh().vertex_at(*p).is_some(), "hull point {} is missing", p);
        }
    }
}

// =============================================================================
// SERIALIZATION
// =============================================================================

#[test]
fn triangles_and_points_round_trip_through_json() {
    let points = [
        Point2::new(0.0, 0.0),
        Point2::new(3.0, 0.5),
        Point2::new(1.5, 2.0),
        Point2::new(1.0, 0.75),
    ];
    let dt = triangulate_points(&points, TriangulationOptions::default()).unwrap();
    let triangles = dt.triangles().unwrap();

    let json = serde_json::to_string(&triangles).unwrap();
    let back: Vec<Triangle2> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, triangles);

    let json = serde_json::to_string(&points[1]).unwrap();
    let back: Point2 = serde_json::from_str(&json).unwrap();
    assert_eq!(back, points[1]);
}

#[test]
fn outline_groups_round_trip_through_json() {
    let contours = vec![
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ],
        vec![
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 3.0),
            Point2::new(3.0, 3.0),
            Point2::new(3.0, 1.0),
        ],
    ];
    let groups = classify_contours(&contours);
    let json = serde_json::to_string(&groups).unwrap();
    let back: Vec<OutlineGroup> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, groups);
}
