//! Weak forms: pointwise bilinear/linear form kernels evaluated per
//! quadrature point, plus the coefficient-function seam.

use crate::dof::Dof;
use crate::element::{Element, GeometryKind, JacobianData};
use crate::error::{FemError, Result};
use crate::mesh::Mesh;
use crate::quadrature::RefPoint;
use crate::shape::{FluxShapeFn, ShapeFn};
use nalgebra::{Point3, Vector2};

/// A scalar coefficient or data function over physical space.
///
/// Implemented for plain closures, so coefficients can be passed inline;
/// [`Constant`] covers the common constant-coefficient case.
pub trait MathFunc: Send + Sync {
    fn eval(&self, point: &Point3<f64>) -> f64;

    /// Partial derivative along a coordinate axis. Coefficients backed by a
    /// symbolic engine can provide this; opaque closures cannot and report
    /// an unsupported outcome.
    fn diff(&self, _axis: usize, _point: &Point3<f64>) -> Result<f64> {
        Err(FemError::Unsupported {
            operation: "derivative of an opaque coefficient function",
        })
    }
}

/// A spatially constant coefficient.
#[derive(Debug, Copy, Clone)]
pub struct Constant(pub f64);

impl MathFunc for Constant {
    fn eval(&self, _point: &Point3<f64>) -> f64 {
        self.0
    }

    fn diff(&self, _axis: usize, _point: &Point3<f64>) -> Result<f64> {
        Ok(0.0)
    }
}

impl<F> MathFunc for F
where
    F: Fn(&Point3<f64>) -> f64 + Send + Sync,
{
    fn eval(&self, point: &Point3<f64>) -> f64 {
        self(point)
    }
}

/// Whether a weak form integrates over domain elements or boundary
/// sub-elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Domain,
    Boundary,
}

/// Evaluation context at one quadrature point of one element.
///
/// Bundles the physical point and the Jacobian data so that weak forms can
/// evaluate shape-function values and physical gradients without touching
/// the mesh directly.
pub struct ElementCtx<'a> {
    pub mesh: &'a Mesh,
    pub element: &'a Element,
    pub ref_point: RefPoint,
    pub point: Point3<f64>,
    pub jacobian: JacobianData,
}

impl<'a> ElementCtx<'a> {
    pub fn at(mesh: &'a Mesh, element: &'a Element, ref_point: RefPoint) -> Result<Self> {
        let point = element.map_reference(mesh, &ref_point)?;
        let jacobian = element.jacobian(mesh, &ref_point)?;
        Ok(Self {
            mesh,
            element,
            ref_point,
            point,
            jacobian,
        })
    }

    /// Value of the DOF's scalar profile at the quadrature point.
    pub fn value(&self, dof: &Dof) -> Result<f64> {
        let profile = dof.shape.scalar_profile().ok_or(FemError::Unsupported {
            operation: "pointwise value of an edge-flux shape function",
        })?;
        Ok(profile.eval(&self.ref_point))
    }

    /// Physical gradient of the DOF's scalar profile.
    ///
    /// Not available on boundary segments, where the coordinate transform is
    /// not square.
    pub fn grad(&self, dof: &Dof) -> Result<Vector2<f64>> {
        let profile = dof.shape.scalar_profile().ok_or(FemError::Unsupported {
            operation: "reference gradient of an edge-flux shape function",
        })?;
        let inv_t = self.jacobian.inv_t.ok_or(FemError::Unsupported {
            operation: "physical gradient on a boundary segment",
        })?;
        Ok(inv_t * profile.grad_ref(&self.ref_point))
    }

    /// Vector value of an edge-flux (lowest-order Raviart-Thomas) DOF at the
    /// quadrature point.
    pub fn flux(&self, dof: &Dof) -> Result<Vector2<f64>> {
        match &dof.shape {
            ShapeFn::Flux(flux) => {
                let (coef, opposite) = self.flux_coefficient(flux)?;
                Ok(Vector2::new(self.point.x - opposite.x, self.point.y - opposite.y) * coef)
            }
            _ => Err(FemError::Unsupported {
                operation: "flux evaluation of a nodal shape function",
            }),
        }
    }

    /// Divergence of a vector DOF: the partial derivative of a
    /// single-component shape function along its active component, or the
    /// (elementwise constant) divergence of an edge-flux function.
    pub fn div(&self, dof: &Dof) -> Result<f64> {
        match &dof.shape {
            ShapeFn::Flux(flux) => {
                let (coef, _) = self.flux_coefficient(flux)?;
                Ok(2.0 * coef)
            }
            shape => {
                let component = shape.component().ok_or(FemError::Unsupported {
                    operation: "divergence of a scalar shape function",
                })?;
                Ok(self.grad(dof)?[component])
            }
        }
    }

    /// `sigma * |E| / (2 |T|)` and the vertex opposite the edge.
    fn flux_coefficient(&self, flux: &FluxShapeFn) -> Result<(f64, Point3<f64>)> {
        if self.element.kind() != GeometryKind::Triangle {
            return Err(FemError::UnsupportedTopology {
                kind: self.element.kind(),
                context: "edge-flux shape functions",
            });
        }
        let local_edge = self
            .element
            .local_edges()
            .get(flux.local_edge)
            .ok_or(FemError::EdgesNotBuilt)?;
        let nodes = self.element.node_indices();
        let a = self.mesh.node(nodes[local_edge.vertices[0]]).coords();
        let b = self.mesh.node(nodes[local_edge.vertices[1]]).coords();
        let length = (b - a).norm();
        let sign = if flux.same_orientation { 1.0 } else { -1.0 };
        // The Jacobian determinant is twice the triangle area.
        let coef = sign * length / self.jacobian.det;
        let opposite = *self.mesh.node(nodes[(flux.local_edge + 2) % 3]).coords();
        Ok((coef, opposite))
    }
}

/// A weak form: the pointwise kernels of a bilinear form (`lhs`) and a
/// linear functional (`rhs`).
///
/// Implementations are `Send + Sync` so assembly can fan element loops out
/// over a thread pool.
pub trait WeakForm: Send + Sync {
    fn item_kind(&self) -> ItemKind;

    /// Kernel of the bilinear form at the context point, for one trial/test
    /// DOF pair.
    fn lhs(&self, ctx: &ElementCtx<'_>, trial: &Dof, test: &Dof) -> Result<f64>;

    /// Kernel of the load functional at the context point.
    fn rhs(&self, ctx: &ElementCtx<'_>, test: &Dof) -> Result<f64>;
}

/// Diffusion-reaction form: `k grad(u).grad(v) + c u v = f v`.
pub struct LaplaceWeakForm {
    pub k: Box<dyn MathFunc>,
    pub c: Option<Box<dyn MathFunc>>,
    pub f: Box<dyn MathFunc>,
}

impl LaplaceWeakForm {
    /// Pure Poisson problem `-div(k grad u) = f`.
    pub fn poisson(k: Box<dyn MathFunc>, f: Box<dyn MathFunc>) -> Self {
        Self { k, c: None, f }
    }
}

impl WeakForm for LaplaceWeakForm {
    fn item_kind(&self) -> ItemKind {
        ItemKind::Domain
    }

    fn lhs(&self, ctx: &ElementCtx<'_>, trial: &Dof, test: &Dof) -> Result<f64> {
        let mut value = self.k.eval(&ctx.point) * ctx.grad(trial)?.dot(&ctx.grad(test)?);
        if let Some(c) = &self.c {
            value += c.eval(&ctx.point) * ctx.value(trial)? * ctx.value(test)?;
        }
        Ok(value)
    }

    fn rhs(&self, ctx: &ElementCtx<'_>, test: &Dof) -> Result<f64> {
        Ok(self.f.eval(&ctx.point) * ctx.value(test)?)
    }
}

/// Boundary form for Robin and Neumann conditions: `d u v = g v` integrated
/// over the border. A pure Neumann condition leaves `d` out; a pure flux-free
/// border leaves both out and contributes nothing.
pub struct LaplaceBoundaryWeakForm {
    pub d: Option<Box<dyn MathFunc>>,
    pub g: Option<Box<dyn MathFunc>>,
}

impl WeakForm for LaplaceBoundaryWeakForm {
    fn item_kind(&self) -> ItemKind {
        ItemKind::Boundary
    }

    fn lhs(&self, ctx: &ElementCtx<'_>, trial: &Dof, test: &Dof) -> Result<f64> {
        match &self.d {
            Some(d) => Ok(d.eval(&ctx.point) * ctx.value(trial)? * ctx.value(test)?),
            None => Ok(0.0),
        }
    }

    fn rhs(&self, ctx: &ElementCtx<'_>, test: &Dof) -> Result<f64> {
        match &self.g {
            Some(g) => Ok(g.eval(&ctx.point) * ctx.value(test)?),
            None => Ok(0.0),
        }
    }
}

/// Stationary Stokes form:
/// `nu grad(u).grad(v) - p div(v) + div(u) q = f.v`.
///
/// Kernel dispatch is by trial/test component: same-component velocity pairs
/// carry the viscous term, velocity/pressure pairs carry the divergence
/// coupling with opposite signs, and all remaining pairs vanish identically.
pub struct StokesWeakForm {
    pub nu: Box<dyn MathFunc>,
    pub f: [Box<dyn MathFunc>; 2],
}

impl StokesWeakForm {
    const PRESSURE: usize = 2;
}

impl WeakForm for StokesWeakForm {
    fn item_kind(&self) -> ItemKind {
        ItemKind::Domain
    }

    fn lhs(&self, ctx: &ElementCtx<'_>, trial: &Dof, test: &Dof) -> Result<f64> {
        let trial_c = trial.component.ok_or(FemError::Unsupported {
            operation: "Stokes form on a scalar trial DOF",
        })?;
        let test_c = test.component.ok_or(FemError::Unsupported {
            operation: "Stokes form on a scalar test DOF",
        })?;
        match (trial_c, test_c) {
            (u, v) if u == v && u < Self::PRESSURE => {
                Ok(self.nu.eval(&ctx.point) * ctx.grad(trial)?.dot(&ctx.grad(test)?))
            }
            // Continuity row: div(u) q.
            (u, Self::PRESSURE) if u < Self::PRESSURE => Ok(ctx.value(test)? * ctx.div(trial)?),
            // Momentum pressure term: -p div(v).
            (Self::PRESSURE, v) if v < Self::PRESSURE => Ok(-ctx.value(trial)? * ctx.div(test)?),
            // Distinct velocity components and the pressure diagonal.
            _ => Ok(0.0),
        }
    }

    fn rhs(&self, ctx: &ElementCtx<'_>, test: &Dof) -> Result<f64> {
        let test_c = test.component.ok_or(FemError::Unsupported {
            operation: "Stokes form on a scalar test DOF",
        })?;
        if test_c < Self::PRESSURE {
            Ok(self.f[test_c].eval(&ctx.point) * ctx.value(test)?)
        } else {
            Ok(0.0)
        }
    }
}

/// Mixed formulation of the Poisson problem: seek a flux `p` and a potential
/// `u` with `p = grad(u)` and `div(p) + f = 0`, discretized with edge fluxes
/// and elementwise-constant potentials. The assembled system is the
/// symmetric saddle point `[B C; C' 0]` with `B = (p, q)`, `C = (u, div q)`
/// and load `-(f, v)` on the potential rows. Dropping the boundary term of
/// the integration by parts imposes `u = 0` on the border weakly.
pub struct MixedLaplaceWeakForm {
    pub f: Box<dyn MathFunc>,
}

impl MixedLaplaceWeakForm {
    const POTENTIAL: usize = 1;
}

impl WeakForm for MixedLaplaceWeakForm {
    fn item_kind(&self) -> ItemKind {
        ItemKind::Domain
    }

    fn lhs(&self, ctx: &ElementCtx<'_>, trial: &Dof, test: &Dof) -> Result<f64> {
        let trial_c = trial.component.ok_or(FemError::Unsupported {
            operation: "mixed Laplace form on a scalar trial DOF",
        })?;
        let test_c = test.component.ok_or(FemError::Unsupported {
            operation: "mixed Laplace form on a scalar test DOF",
        })?;
        match (trial_c, test_c) {
            (0, 0) => Ok(ctx.flux(trial)?.dot(&ctx.flux(test)?)),
            // C column: (u, div q).
            (Self::POTENTIAL, 0) => Ok(ctx.value(trial)? * ctx.div(test)?),
            // C' row: (v, div p).
            (0, Self::POTENTIAL) => Ok(ctx.value(test)? * ctx.div(trial)?),
            // Zero potential diagonal.
            _ => Ok(0.0),
        }
    }

    fn rhs(&self, ctx: &ElementCtx<'_>, test: &Dof) -> Result<f64> {
        let test_c = test.component.ok_or(FemError::Unsupported {
            operation: "mixed Laplace form on a scalar test DOF",
        })?;
        if test_c == Self::POTENTIAL {
            Ok(-self.f.eval(&ctx.point) * ctx.value(test)?)
        } else {
            Ok(0.0)
        }
    }
}
