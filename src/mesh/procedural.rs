//! Procedural construction of simple test meshes.

use crate::element::GeometryKind;
use crate::error::Result;
use crate::mesh::Mesh;
use nalgebra::Point3;

/// A uniform triangulation of the unit square with `n` cells per side, each
/// cell split along its lower-left-to-upper-right diagonal. Node adjacency
/// and shared edges are already built.
pub fn unit_square_triangles(n: usize) -> Result<Mesh> {
    assert!(n > 0, "mesh resolution must be positive");
    let mut mesh = grid_nodes(n)?;
    let stride = n + 1;
    for j in 0..n {
        for i in 0..n {
            let v00 = j * stride + i;
            let v10 = v00 + 1;
            let v01 = v00 + stride;
            let v11 = v01 + 1;
            mesh.add_element(GeometryKind::Triangle, &[v00, v10, v11])?;
            mesh.add_element(GeometryKind::Triangle, &[v00, v11, v01])?;
        }
    }
    mesh.compute_node_adjacency();
    mesh.build_edges()?;
    Ok(mesh)
}

/// A uniform quadrilateral grid over the unit square with `n` cells per
/// side, vertices in counterclockwise order. Node adjacency and shared edges
/// are already built.
pub fn unit_square_quads(n: usize) -> Result<Mesh> {
    assert!(n > 0, "mesh resolution must be positive");
    let mut mesh = grid_nodes(n)?;
    let stride = n + 1;
    for j in 0..n {
        for i in 0..n {
            let v00 = j * stride + i;
            let v10 = v00 + 1;
            let v01 = v00 + stride;
            let v11 = v01 + 1;
            mesh.add_element(GeometryKind::Quadrilateral, &[v00, v10, v11, v01])?;
        }
    }
    mesh.compute_node_adjacency();
    mesh.build_edges()?;
    Ok(mesh)
}

fn grid_nodes(n: usize) -> Result<Mesh> {
    let mut mesh = Mesh::new(2);
    let h = 1.0 / n as f64;
    for j in 0..=n {
        for i in 0..=n {
            mesh.add_node(Point3::new(i as f64 * h, j as f64 * h, 0.0))?;
        }
    }
    Ok(mesh)
}
