//! End-to-end Poisson solves on procedural meshes.

use felyx::assembly::Assembler;
use felyx::bc::{dirichlet_values, impose_dirichlet};
use felyx::dof::{DofGenerator, FiniteElement};
use felyx::mesh::procedural::{unit_square_quads, unit_square_triangles};
use felyx::mesh::{Mesh, NodeType};
use felyx::solver::{DenseLuSolver, LinearSolver};
use felyx::weakform::{Constant, LaplaceWeakForm, MathFunc};
use nalgebra::DVector;

fn solve_dirichlet_poisson(
    mesh: &Mesh,
    generator: &DofGenerator,
    element: FiniteElement,
    f: Box<dyn MathFunc>,
    g: &dyn MathFunc,
) -> DVector<f64> {
    let assembler = Assembler::new(element, LaplaceWeakForm::poisson(Box::new(Constant(1.0)), f));
    let mut system = assembler.assemble_global(mesh).unwrap();
    let constraints = dirichlet_values(mesh, generator, &[g]).unwrap();
    impose_dirichlet(&mut system, &constraints).unwrap();
    DenseLuSolver
        .solve(&system.to_csr(), &system.load)
        .unwrap()
}

#[test]
fn all_boundary_mesh_gives_the_zero_solution() {
    // Two triangles: every node is on the boundary, so u = 0 everywhere.
    let mut mesh = unit_square_triangles(1).unwrap();
    mesh.mark_border_nodes(&[0], &[(NodeType::Dirichlet, None)])
        .unwrap();
    let generator = DofGenerator::new(&mut mesh, FiniteElement::LinearTriangle);
    generator.generate(&mut mesh).unwrap();

    let solution = solve_dirichlet_poisson(
        &mesh,
        &generator,
        FiniteElement::LinearTriangle,
        Box::new(Constant(1.0)),
        &Constant(0.0),
    );
    for value in solution.iter() {
        assert!(value.abs() < 1e-13);
    }
}

#[test]
fn unit_load_solution_is_positive_and_bounded_inside() {
    let mut mesh = unit_square_triangles(4).unwrap();
    mesh.mark_border_nodes(&[0], &[(NodeType::Dirichlet, None)])
        .unwrap();
    let generator = DofGenerator::new(&mut mesh, FiniteElement::LinearTriangle);
    generator.generate(&mut mesh).unwrap();

    let solution = solve_dirichlet_poisson(
        &mesh,
        &generator,
        FiniteElement::LinearTriangle,
        Box::new(Constant(1.0)),
        &Constant(0.0),
    );
    let boundary = mesh.boundary_nodes().unwrap();
    // The continuous maximum is about 0.0737 at the center.
    for node in mesh.nodes() {
        let value = solution[node.index()];
        if boundary.contains(&node.index()) {
            assert!(value.abs() < 1e-13);
        } else {
            assert!(value > 0.0 && value < 0.08, "u = {value} out of range");
        }
    }
    let center = mesh
        .find_node(&nalgebra::Point3::new(0.5, 0.5, 0.0))
        .unwrap();
    assert!((solution[center] - 0.0737).abs() < 0.01);
}

#[test]
fn p1_reproduces_affine_solutions_exactly() {
    let mut mesh = unit_square_triangles(3).unwrap();
    mesh.mark_border_nodes(&[0], &[(NodeType::Dirichlet, None)])
        .unwrap();
    let generator = DofGenerator::new(&mut mesh, FiniteElement::LinearTriangle);
    generator.generate(&mut mesh).unwrap();

    let exact = |p: &nalgebra::Point3<f64>| 1.0 + 2.0 * p.x + 3.0 * p.y;
    let solution = solve_dirichlet_poisson(
        &mesh,
        &generator,
        FiniteElement::LinearTriangle,
        Box::new(Constant(0.0)),
        &exact,
    );
    for node in mesh.nodes() {
        assert!((solution[node.index()] - exact(node.coords())).abs() < 1e-11);
    }
}

#[test]
fn q1_reproduces_affine_solutions_exactly() {
    let mut mesh = unit_square_quads(3).unwrap();
    mesh.mark_border_nodes(&[0], &[(NodeType::Dirichlet, None)])
        .unwrap();
    let generator = DofGenerator::new(&mut mesh, FiniteElement::BilinearQuad);
    generator.generate(&mut mesh).unwrap();

    let exact = |p: &nalgebra::Point3<f64>| 0.5 - p.x + 2.0 * p.y;
    let solution = solve_dirichlet_poisson(
        &mesh,
        &generator,
        FiniteElement::BilinearQuad,
        Box::new(Constant(0.0)),
        &exact,
    );
    for node in mesh.nodes() {
        assert!((solution[node.index()] - exact(node.coords())).abs() < 1e-11);
    }
}

#[test]
fn p2_reproduces_harmonic_quadratics_exactly() {
    let mut mesh = unit_square_triangles(2).unwrap();
    mesh.add_quadratic_nodes().unwrap();
    mesh.mark_border_nodes(&[0], &[(NodeType::Dirichlet, None)])
        .unwrap();
    let generator = DofGenerator::new(&mut mesh, FiniteElement::QuadraticTriangle);
    generator.generate(&mut mesh).unwrap();

    // x^2 - y^2 is harmonic, so f = 0 and the P2 space contains the exact
    // solution.
    let exact = |p: &nalgebra::Point3<f64>| p.x * p.x - p.y * p.y;
    let solution = solve_dirichlet_poisson(
        &mesh,
        &generator,
        FiniteElement::QuadraticTriangle,
        Box::new(Constant(0.0)),
        &exact,
    );
    for node in mesh.nodes() {
        assert!(
            (solution[node.index()] - exact(node.coords())).abs() < 1e-10,
            "node {} off by {}",
            node.index(),
            (solution[node.index()] - exact(node.coords())).abs()
        );
    }
}
