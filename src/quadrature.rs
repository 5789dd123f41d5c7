//! Numerical quadrature over reference elements.
//!
//! A [`Quadrature`] is a plain value: weights plus reference-element points.
//! Rules are selected by the element's topological kind and a requested
//! polynomial *degree*: the returned rule integrates polynomials of at least
//! that total degree exactly on the reference domain. Requesting a degree for
//! which no table exists is a configuration error rather than a silent
//! fallback; under-integration must be an explicit user choice.
//!
//! Reference domains:
//! - segment: `[-1, 1]`
//! - triangle: unit right triangle with vertices `(0,0)`, `(1,0)`, `(0,1)`
//! - quadrilateral: `[-1, 1]^2`
//! - tetrahedron: unit right tetrahedron
//! - hexahedron: `[-1, 1]^3`

use crate::element::GeometryKind;
use crate::error::{FemError, Result};
use itertools::izip;
use nalgebra::Point3;

/// A point in reference-element coordinates.
///
/// Trailing coordinates beyond the reference dimension are zero.
pub type RefPoint = Point3<f64>;

/// A quadrature rule: weights and reference points of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Quadrature {
    weights: Vec<f64>,
    points: Vec<RefPoint>,
}

impl Quadrature {
    pub fn from_parts(weights: Vec<f64>, points: Vec<RefPoint>) -> Self {
        assert_eq!(weights.len(), points.len());
        Self { weights, points }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn points(&self) -> &[RefPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&f64, &RefPoint)> {
        izip!(&self.weights, &self.points)
    }

    /// Approximates the integral of `f` over the reference domain.
    pub fn integrate(&self, f: impl Fn(&RefPoint) -> f64) -> f64 {
        self.iter().map(|(w, p)| w * f(p)).sum()
    }

    /// Returns the rule for the given topological kind that integrates
    /// polynomials of (total) degree `degree` exactly.
    pub fn for_kind(kind: GeometryKind, degree: usize) -> Result<Self> {
        match kind {
            GeometryKind::Segment => segment_rule(degree),
            GeometryKind::Triangle => triangle_rule(degree),
            GeometryKind::Quadrilateral => tensor_rule_2d(degree, kind),
            GeometryKind::Tetrahedron => tetrahedron_rule(degree),
            GeometryKind::Hexahedron => tensor_rule_3d(degree, kind),
        }
    }
}

/// Univariate Gauss–Legendre abscissae and weights on `[-1, 1]`.
///
/// An `n`-point rule is exact for polynomials of degree `2n - 1`.
fn gauss_legendre_1d(num_points: usize) -> Option<(&'static [f64], &'static [f64])> {
    const P1: [f64; 1] = [0.0];
    const W1: [f64; 1] = [2.0];
    const P2: [f64; 2] = [-0.5773502691896257, 0.5773502691896257];
    const W2: [f64; 2] = [1.0, 1.0];
    const P3: [f64; 3] = [-0.7745966692414834, 0.0, 0.7745966692414834];
    const W3: [f64; 3] = [0.5555555555555556, 0.8888888888888888, 0.5555555555555556];
    const P4: [f64; 4] = [
        -0.8611363115940526,
        -0.3399810435848563,
        0.3399810435848563,
        0.8611363115940526,
    ];
    const W4: [f64; 4] = [
        0.3478548451374538,
        0.6521451548625461,
        0.6521451548625461,
        0.3478548451374538,
    ];
    match num_points {
        1 => Some((&P1, &W1)),
        2 => Some((&P2, &W2)),
        3 => Some((&P3, &W3)),
        4 => Some((&P4, &W4)),
        _ => None,
    }
}

fn segment_rule(degree: usize) -> Result<Quadrature> {
    // Smallest Gauss rule exact for the requested degree.
    let n = degree / 2 + 1;
    let (points, weights) = gauss_legendre_1d(n).ok_or(FemError::UnsupportedQuadratureOrder {
        kind: GeometryKind::Segment,
        degree,
    })?;
    Ok(Quadrature::from_parts(
        weights.to_vec(),
        points.iter().map(|&x| RefPoint::new(x, 0.0, 0.0)).collect(),
    ))
}

fn tensor_rule_2d(degree: usize, kind: GeometryKind) -> Result<Quadrature> {
    let n = degree / 2 + 1;
    let (points, weights) =
        gauss_legendre_1d(n).ok_or(FemError::UnsupportedQuadratureOrder { kind, degree })?;
    let mut w = Vec::with_capacity(n * n);
    let mut p = Vec::with_capacity(n * n);
    for (xi, wi) in izip!(points, weights) {
        for (xj, wj) in izip!(points, weights) {
            w.push(wi * wj);
            p.push(RefPoint::new(*xi, *xj, 0.0));
        }
    }
    Ok(Quadrature::from_parts(w, p))
}

fn tensor_rule_3d(degree: usize, kind: GeometryKind) -> Result<Quadrature> {
    let n = degree / 2 + 1;
    let (points, weights) =
        gauss_legendre_1d(n).ok_or(FemError::UnsupportedQuadratureOrder { kind, degree })?;
    let mut w = Vec::with_capacity(n * n * n);
    let mut p = Vec::with_capacity(n * n * n);
    for (xi, wi) in izip!(points, weights) {
        for (xj, wj) in izip!(points, weights) {
            for (xk, wk) in izip!(points, weights) {
                w.push(wi * wj * wk);
                p.push(RefPoint::new(*xi, *xj, *xk));
            }
        }
    }
    Ok(Quadrature::from_parts(w, p))
}

/// Symmetric rules on the unit right triangle (area 1/2).
fn triangle_rule(degree: usize) -> Result<Quadrature> {
    let (weights, points): (Vec<f64>, Vec<RefPoint>) = match degree {
        0 | 1 => (
            vec![0.5],
            vec![RefPoint::new(1.0 / 3.0, 1.0 / 3.0, 0.0)],
        ),
        2 => (
            vec![1.0 / 6.0; 3],
            vec![
                RefPoint::new(1.0 / 6.0, 1.0 / 6.0, 0.0),
                RefPoint::new(2.0 / 3.0, 1.0 / 6.0, 0.0),
                RefPoint::new(1.0 / 6.0, 2.0 / 3.0, 0.0),
            ],
        ),
        3 => (
            vec![-27.0 / 96.0, 25.0 / 96.0, 25.0 / 96.0, 25.0 / 96.0],
            vec![
                RefPoint::new(1.0 / 3.0, 1.0 / 3.0, 0.0),
                RefPoint::new(0.2, 0.2, 0.0),
                RefPoint::new(0.6, 0.2, 0.0),
                RefPoint::new(0.2, 0.6, 0.0),
            ],
        ),
        4 | 5 => {
            // Seven-point degree-5 rule (Strang–Fix).
            let sqrt15 = 15.0_f64.sqrt();
            let a = (6.0 + sqrt15) / 21.0;
            let b = (6.0 - sqrt15) / 21.0;
            let wa = (155.0 + sqrt15) / 2400.0;
            let wb = (155.0 - sqrt15) / 2400.0;
            (
                vec![9.0 / 80.0, wa, wa, wa, wb, wb, wb],
                vec![
                    RefPoint::new(1.0 / 3.0, 1.0 / 3.0, 0.0),
                    RefPoint::new(a, a, 0.0),
                    RefPoint::new(1.0 - 2.0 * a, a, 0.0),
                    RefPoint::new(a, 1.0 - 2.0 * a, 0.0),
                    RefPoint::new(b, b, 0.0),
                    RefPoint::new(1.0 - 2.0 * b, b, 0.0),
                    RefPoint::new(b, 1.0 - 2.0 * b, 0.0),
                ],
            )
        }
        _ => {
            return Err(FemError::UnsupportedQuadratureOrder {
                kind: GeometryKind::Triangle,
                degree,
            })
        }
    };
    Ok(Quadrature::from_parts(weights, points))
}

/// Symmetric rules on the unit right tetrahedron (volume 1/6).
fn tetrahedron_rule(degree: usize) -> Result<Quadrature> {
    let (weights, points): (Vec<f64>, Vec<RefPoint>) = match degree {
        0 | 1 => (
            vec![1.0 / 6.0],
            vec![RefPoint::new(0.25, 0.25, 0.25)],
        ),
        2 => {
            let a = 0.585_410_196_624_968_5;
            let b = 0.138_196_601_125_010_5;
            (
                vec![1.0 / 24.0; 4],
                vec![
                    RefPoint::new(a, b, b),
                    RefPoint::new(b, a, b),
                    RefPoint::new(b, b, a),
                    RefPoint::new(b, b, b),
                ],
            )
        }
        3 => (
            vec![-2.0 / 15.0, 3.0 / 40.0, 3.0 / 40.0, 3.0 / 40.0, 3.0 / 40.0],
            vec![
                RefPoint::new(0.25, 0.25, 0.25),
                RefPoint::new(0.5, 1.0 / 6.0, 1.0 / 6.0),
                RefPoint::new(1.0 / 6.0, 0.5, 1.0 / 6.0),
                RefPoint::new(1.0 / 6.0, 1.0 / 6.0, 0.5),
                RefPoint::new(1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0),
            ],
        ),
        _ => {
            return Err(FemError::UnsupportedQuadratureOrder {
                kind: GeometryKind::Tetrahedron,
                degree,
            })
        }
    };
    Ok(Quadrature::from_parts(weights, points))
}
