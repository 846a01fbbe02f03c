//! Text form of a drawable shape, used only at persistence boundaries.
//!
//! One shape per string: a single-letter tag followed by whitespace-separated
//! coordinates. Geometry round-trips exactly; styling travels in separate
//! record fields and is not part of this format.

use crate::geometry::{EllipseShape, LineShape, Point, PolylineShape, RectShape, Shape};
use thiserror::Error;

pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty geometry path")]
    EmptyPath,
    #[error("unknown shape tag: {0}")]
    UnknownTag(String),
    #[error("malformed number in geometry path: {0}")]
    BadNumber(String),
    #[error("shape tag {tag} expects {expected} coordinates, found {found}")]
    WrongArity {
        tag: char,
        expected: &'static str,
        found: usize,
    },
}

pub fn serialize(shape: &Shape) -> String {
    match shape {
        Shape::Rectangle(rect) => {
            format!("R {} {} {} {}", rect.x, rect.y, rect.width, rect.height)
        }
        Shape::Ellipse(ellipse) => format!(
            "E {} {} {} {}",
            ellipse.center.x, ellipse.center.y, ellipse.radius_x, ellipse.radius_y
        ),
        Shape::Line(line) => format!(
            "L {} {} {} {}",
            line.start.x, line.start.y, line.end.x, line.end.y
        ),
        Shape::Polyline(polyline) => {
            let mut path = String::from("P");
            for point in &polyline.points {
                path.push_str(&format!(" {} {}", point.x, point.y));
            }
            path
        }
    }
}

pub fn deserialize(path: &str) -> CodecResult<Shape> {
    let mut tokens = path.split_whitespace();
    let tag = tokens.next().ok_or(CodecError::EmptyPath)?;

    let values = tokens
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| CodecError::BadNumber(token.to_string()))
        })
        .collect::<CodecResult<Vec<f64>>>()?;

    match tag {
        "R" => {
            let [x, y, width, height] = expect_exact::<4>('R', "4", &values)?;
            Ok(Shape::Rectangle(RectShape::new(x, y, width, height)))
        }
        "E" => {
            let [cx, cy, rx, ry] = expect_exact::<4>('E', "4", &values)?;
            Ok(Shape::Ellipse(EllipseShape {
                center: Point::new(cx, cy),
                radius_x: rx,
                radius_y: ry,
            }))
        }
        "L" => {
            let [x1, y1, x2, y2] = expect_exact::<4>('L', "4", &values)?;
            Ok(Shape::Line(LineShape::new(
                Point::new(x1, y1),
                Point::new(x2, y2),
            )))
        }
        "P" => {
            if values.len() < 4 || values.len() % 2 != 0 {
                return Err(CodecError::WrongArity {
                    tag: 'P',
                    expected: "an even count of at least 4",
                    found: values.len(),
                });
            }
            let points = values
                .chunks_exact(2)
                .map(|pair| Point::new(pair[0], pair[1]))
                .collect();
            Ok(Shape::Polyline(PolylineShape { points }))
        }
        other => Err(CodecError::UnknownTag(other.to_string())),
    }
}

fn expect_exact<const N: usize>(
    tag: char,
    expected: &'static str,
    values: &[f64],
) -> CodecResult<[f64; N]> {
    <[f64; N]>::try_from(values).map_err(|_| CodecError::WrongArity {
        tag,
        expected,
        found: values.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ShapeKind;

    fn assert_close(left: f64, right: f64) {
        assert!((left - right).abs() < 1e-9, "{left} != {right}");
    }

    #[test]
    fn rectangle_round_trips_exactly() {
        let shape = Shape::Rectangle(RectShape::new(1.5, -2.25, 30.0, 40.125));
        let decoded = deserialize(&serialize(&shape)).expect("rectangle should decode");
        assert_eq!(decoded, shape);
    }

    #[test]
    fn ellipse_round_trips_with_irrational_radii() {
        let shape = Shape::Ellipse(EllipseShape::from_drag(
            Point::new(0.0, 0.0),
            Point::new(10.0, 3.0),
        ));
        let decoded = deserialize(&serialize(&shape)).expect("ellipse should decode");
        let Shape::Ellipse(ellipse) = decoded else {
            panic!("decoded shape should stay an ellipse");
        };
        assert_close(ellipse.center.x, 5.0);
        assert_close(ellipse.center.y, 1.5);
        assert_close(ellipse.radius_x, (100.0f64 / 2.0).sqrt());
        assert_close(ellipse.radius_y, (9.0f64 / 2.0).sqrt());
    }

    #[test]
    fn line_round_trips_unnormalized() {
        let shape = Shape::Line(LineShape::new(Point::new(9.0, 9.0), Point::new(-1.0, 2.0)));
        let decoded = deserialize(&serialize(&shape)).expect("line should decode");
        assert_eq!(decoded, shape);
    }

    #[test]
    fn three_segment_polyline_round_trips() {
        let mut polyline = PolylineShape::new(Point::new(0.0, 0.0));
        polyline.extend_to(Point::new(1.0, 1.0));
        polyline.extend_to(Point::new(2.5, 0.5));
        polyline.extend_to(Point::new(4.0, 4.0));
        let shape = Shape::Polyline(polyline);

        let decoded = deserialize(&serialize(&shape)).expect("polyline should decode");
        assert_eq!(decoded.kind(), ShapeKind::Polyline);
        assert_eq!(decoded, shape);
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(matches!(deserialize(""), Err(CodecError::EmptyPath)));
        assert!(matches!(deserialize("   "), Err(CodecError::EmptyPath)));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = deserialize("Q 1 2 3 4").expect_err("unknown tag should fail");
        assert!(matches!(err, CodecError::UnknownTag(tag) if tag == "Q"));
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = deserialize("R 1 2 three 4").expect_err("bad number should fail");
        assert!(matches!(err, CodecError::BadNumber(token) if token == "three"));
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let err = deserialize("L 1 2 3").expect_err("short line should fail");
        assert!(matches!(err, CodecError::WrongArity { tag: 'L', found: 3, .. }));

        let err = deserialize("P 1 2 3").expect_err("odd polyline should fail");
        assert!(matches!(err, CodecError::WrongArity { tag: 'P', found: 3, .. }));

        let err = deserialize("P 1 2").expect_err("single point polyline should fail");
        assert!(matches!(err, CodecError::WrongArity { tag: 'P', found: 2, .. }));
    }
}
