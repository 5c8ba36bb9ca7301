//! Shape factories
//!
//! Every factory returns a well-formed [`Shape`]; shapes are centred on
//! `position` unless stated otherwise and flat shapes lie in the XY plane.

use crate::backend::types::{PrimitiveTopology, Vertex};
use crate::geometry::shape::Shape;
use glam::Vec3;
use std::f32::consts::TAU;

/// Build from parts the factory already knows to be consistent
fn build(topology: PrimitiveTopology, vertices: Vec<Vertex>, indices: Vec<u32>) -> Shape {
    debug_assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    Shape::new(topology, vertices, indices).unwrap_or_else(|_| Shape::empty(topology))
}

/// Normal for a line segment: perpendicular to the segment in the XY plane,
/// falling back to a perpendicular around X for vertical or zero-length segments.
fn line_normal(p0: Vec3, p1: Vec3) -> Vec3 {
    let direction = p1 - p0;
    direction
        .cross(Vec3::Z)
        .try_normalize()
        .or_else(|| direction.cross(Vec3::X).try_normalize())
        .unwrap_or(Vec3::Z)
}

/// An empty triangle shape
pub fn blank() -> Shape {
    Shape::empty(PrimitiveTopology::TriangleList)
}

pub fn point(position: Vec3, colour: Vec3) -> Shape {
    points(&[position], colour)
}

pub fn points(positions: &[Vec3], colour: Vec3) -> Shape {
    let vertices = positions
        .iter()
        .map(|&p| Vertex::new(p, colour, Vec3::Z))
        .collect();
    Shape::sequential(PrimitiveTopology::PointList, vertices)
}

/// A single segment. Coincident endpoints still yield a finite normal.
pub fn line(p0: Vec3, p1: Vec3, colour: Vec3) -> Shape {
    let normal = line_normal(p0, p1);
    Shape::sequential(
        PrimitiveTopology::LineList,
        vec![Vertex::new(p0, colour, normal), Vertex::new(p1, colour, normal)],
    )
}

/// Connected segments through `points`, as a line list sharing vertices.
/// Fewer than two points give an empty shape.
pub fn linestring(points: &[Vec3], colour: Vec3) -> Shape {
    if points.len() < 2 {
        return Shape::empty(PrimitiveTopology::LineList);
    }
    let mut vertices = Vec::with_capacity(points.len());
    let mut indices = Vec::with_capacity((points.len() - 1) * 2);
    for (i, pair) in points.windows(2).enumerate() {
        let normal = line_normal(pair[0], pair[1]);
        if i == 0 {
            vertices.push(Vertex::new(pair[0], colour, normal));
        }
        vertices.push(Vertex::new(pair[1], colour, normal));
        indices.extend_from_slice(&[i as u32, i as u32 + 1]);
    }
    build(PrimitiveTopology::LineList, vertices, indices)
}

pub fn triangle(p1: Vec3, p2: Vec3, p3: Vec3, colour: Vec3) -> Shape {
    let normal = (p2 - p1).cross(p3 - p1).try_normalize().unwrap_or(Vec3::Z);
    Shape::sequential(
        PrimitiveTopology::TriangleList,
        vec![
            Vertex::new(p1, colour, normal),
            Vertex::new(p2, colour, normal),
            Vertex::new(p3, colour, normal),
        ],
    )
}

pub fn triangle_wireframe(p1: Vec3, p2: Vec3, p3: Vec3, colour: Vec3) -> Shape {
    let mut shape = line(p1, p2, colour);
    for edge in [line(p2, p3, colour), line(p3, p1, colour)] {
        // Same topology by construction
        let _ = shape.append(&edge);
    }
    shape
}

fn rectangle_corners(position: Vec3, width: f32, height: f32) -> [Vec3; 4] {
    let (hw, hh) = (width / 2.0, height / 2.0);
    [
        position + Vec3::new(-hw, -hh, 0.0),
        position + Vec3::new(hw, -hh, 0.0),
        position + Vec3::new(hw, hh, 0.0),
        position + Vec3::new(-hw, hh, 0.0),
    ]
}

pub fn rectangle(position: Vec3, width: f32, height: f32, colour: Vec3) -> Shape {
    let vertices = rectangle_corners(position, width, height)
        .into_iter()
        .map(|p| Vertex::new(p, colour, Vec3::Z))
        .collect();
    build(PrimitiveTopology::TriangleList, vertices, vec![0, 1, 2, 2, 3, 0])
}

pub fn rectangle_wireframe(position: Vec3, width: f32, height: f32, colour: Vec3) -> Shape {
    let vertices = rectangle_corners(position, width, height)
        .into_iter()
        .map(|p| Vertex::new(p, colour, Vec3::Z))
        .collect();
    build(
        PrimitiveTopology::LineList,
        vertices,
        vec![0, 1, 1, 2, 2, 3, 3, 0],
    )
}

/// Corner brackets around a rectangle: two edges of `edge_length` at each
/// corner, pointing along the sides.
pub fn rectangle_target(
    position: Vec3,
    width: f32,
    height: f32,
    edge_length: f32,
    colour: Vec3,
) -> Shape {
    let mut vertices = Vec::with_capacity(12);
    let mut indices = Vec::with_capacity(16);
    for (i, corner) in rectangle_corners(position, width, height).into_iter().enumerate() {
        let h = if matches!(i, 1 | 2) { -1.0 } else { 1.0 };
        let v = if matches!(i, 2 | 3) { -1.0 } else { 1.0 };
        vertices.push(Vertex::new(corner, colour, Vec3::Z));
        vertices.push(Vertex::new(corner + Vec3::X * h * edge_length, colour, Vec3::Z));
        vertices.push(Vertex::new(corner + Vec3::Y * v * edge_length, colour, Vec3::Z));
        let base = i as u32 * 3;
        indices.extend_from_slice(&[base, base + 1, base, base + 2]);
    }
    build(PrimitiveTopology::LineList, vertices, indices)
}

/// Filled disc as a triangle list around a centre vertex
pub fn circle(position: Vec3, radius: f32, segments: u32, colour: Vec3) -> Shape {
    let segments = segments.max(3);
    let mut vertices = Vec::with_capacity(segments as usize + 1);
    vertices.push(Vertex::new(position, colour, Vec3::Z));
    for p in ring(position, radius, segments) {
        vertices.push(Vertex::new(p, colour, Vec3::Z));
    }
    let mut indices = Vec::with_capacity(segments as usize * 3);
    for i in 1..segments {
        indices.extend_from_slice(&[0, i, i + 1]);
    }
    indices.extend_from_slice(&[0, segments, 1]);
    build(PrimitiveTopology::TriangleList, vertices, indices)
}

pub fn circle_wireframe(position: Vec3, radius: f32, segments: u32, colour: Vec3) -> Shape {
    let segments = segments.max(3);
    let vertices = ring(position, radius, segments)
        .map(|p| Vertex::new(p, colour, Vec3::Z))
        .collect();
    let indices = (0..segments)
        .flat_map(|i| [i, (i + 1) % segments])
        .collect();
    build(PrimitiveTopology::LineList, vertices, indices)
}

fn ring(centre: Vec3, radius: f32, segments: u32) -> impl Iterator<Item = Vec3> {
    (0..segments).map(move |i| {
        let angle = TAU * i as f32 / segments as f32;
        centre + Vec3::new(radius * angle.cos(), radius * angle.sin(), 0.0)
    })
}

/// Axis-aligned cube with per-face normals
pub fn cube(position: Vec3, size: f32, colour: Vec3) -> Shape {
    let s = size / 2.0;
    let faces = [
        // Front
        (Vec3::Z, [(-s, -s, s), (s, -s, s), (s, s, s), (-s, s, s)]),
        // Back
        (Vec3::NEG_Z, [(s, -s, -s), (-s, -s, -s), (-s, s, -s), (s, s, -s)]),
        // Left
        (Vec3::NEG_X, [(-s, -s, -s), (-s, -s, s), (-s, s, s), (-s, s, -s)]),
        // Right
        (Vec3::X, [(s, -s, s), (s, -s, -s), (s, s, -s), (s, s, s)]),
        // Top
        (Vec3::Y, [(-s, s, s), (s, s, s), (s, s, -s), (-s, s, -s)]),
        // Bottom
        (Vec3::NEG_Y, [(-s, -s, -s), (s, -s, -s), (s, -s, s), (-s, -s, s)]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (face, (normal, corners)) in faces.into_iter().enumerate() {
        for (x, y, z) in corners {
            vertices.push(Vertex::new(position + Vec3::new(x, y, z), colour, normal));
        }
        let base = face as u32 * 4;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    build(PrimitiveTopology::TriangleList, vertices, indices)
}

/// Twelve cube edges over eight shared corners
pub fn cube_wireframe(position: Vec3, size: f32, colour: Vec3) -> Shape {
    let s = size / 2.0;
    let corners = [
        (-s, -s, -s),
        (s, -s, -s),
        (s, s, -s),
        (-s, s, -s),
        (-s, -s, s),
        (s, -s, s),
        (s, s, s),
        (-s, s, s),
    ];
    let vertices = corners
        .into_iter()
        .map(|(x, y, z)| Vertex::new(position + Vec3::new(x, y, z), colour, Vec3::Z))
        .collect();
    let indices = vec![
        0, 1, 1, 2, 2, 3, 3, 0, // back
        4, 5, 5, 6, 6, 7, 7, 4, // front
        0, 4, 1, 5, 2, 6, 3, 7, // sides
    ];
    build(PrimitiveTopology::LineList, vertices, indices)
}

/// Square grid in the XY plane centred on the origin
pub fn grid(size: f32, increment: f32, colour: Vec3) -> Shape {
    if size <= 0.0 || increment <= 0.0 {
        return Shape::empty(PrimitiveTopology::LineList);
    }
    let half = size / 2.0;
    let lines = (size / increment) as u32 + 1;
    let mut vertices = Vec::with_capacity(lines as usize * 4);
    for i in 0..lines {
        let t = i as f32 * increment - half;
        vertices.push(Vertex::new(Vec3::new(t, -half, 0.0), colour, Vec3::Z));
        vertices.push(Vertex::new(Vec3::new(t, half, 0.0), colour, Vec3::Z));
        vertices.push(Vertex::new(Vec3::new(-half, t, 0.0), colour, Vec3::Z));
        vertices.push(Vertex::new(Vec3::new(half, t, 0.0), colour, Vec3::Z));
    }
    Shape::sequential(PrimitiveTopology::LineList, vertices)
}

/// Translation, Euler rotation and scale that map the unit segment
/// `(0,0,0)..(0,0,1)` onto `p0..p1` with the given XY cross-section.
pub fn calculate_transform(p0: Vec3, p1: Vec3, cross_section: (f32, f32)) -> (Vec3, Vec3, Vec3) {
    let direction = p1 - p0;
    let length = direction.length();
    let rotation = match direction.try_normalize() {
        Some(d) => {
            let rz = d.y.atan2(d.x);
            let ry = (d.x * rz.cos() + d.y * rz.sin()).atan2(d.z);
            Vec3::new(0.0, ry, rz)
        }
        None => Vec3::ZERO,
    };
    (p0, rotation, Vec3::new(cross_section.0, cross_section.1, length))
}

/// Rectangular beam from `p0` to `p1` as `[body, wireframe]`.
///
/// Coincident endpoints give two empty shapes.
pub fn beam(
    p0: Vec3,
    p1: Vec3,
    width: f32,
    height: f32,
    colour: Vec3,
    wireframe_colour: Vec3,
) -> [Shape; 2] {
    let direction = p1 - p0;
    if direction.length_squared() == 0.0 {
        return [
            Shape::empty(PrimitiveTopology::TriangleList),
            Shape::empty(PrimitiveTopology::LineList),
        ];
    }
    // Vertical beams swap the cross-section axes
    let section = if direction.x == 0.0 && direction.y == 0.0 {
        (width, height)
    } else {
        (height, width)
    };
    let (translate, rotate, scale) = calculate_transform(p0, p1, section);
    let lift = Vec3::new(0.0, 0.0, 0.5);

    let mut body = cube(lift, 1.0, colour);
    body.transform(translate, rotate, scale);
    let mut wireframe = cube_wireframe(lift, 1.0, wireframe_colour);
    wireframe.transform(translate, rotate, scale);
    [body, wireframe]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_line_gets_finite_normal() {
        let shape = line(Vec3::ZERO, Vec3::Z, Vec3::ONE);
        let n = shape.vertices()[0].normal;
        assert!((n.length() - 1.0).abs() < 1e-5);
        assert!(n.dot(Vec3::Z).abs() < 1e-5);
    }

    #[test]
    fn coincident_line_does_not_divide_by_zero() {
        let shape = line(Vec3::ONE, Vec3::ONE, Vec3::ONE);
        assert!(shape.vertices().iter().all(|v| v.normal.is_finite()));
    }

    #[test]
    fn linestring_shares_vertices() {
        let shape = linestring(&[Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0)], Vec3::ONE);
        assert_eq!(shape.vertex_count(), 3);
        assert_eq!(shape.indices(), &[0, 1, 1, 2]);
    }

    #[test]
    fn cube_spans_its_size() {
        let shape = cube(Vec3::ZERO, 2.0, Vec3::ONE);
        assert_eq!(shape.vertex_count(), 24);
        assert_eq!(shape.index_count(), 36);
        let max = shape.positions().fold(Vec3::splat(f32::MIN), Vec3::max);
        assert!((max - Vec3::ONE).length() < 1e-6);
    }

    #[test]
    fn circle_closes_the_fan() {
        let shape = circle(Vec3::ZERO, 1.0, 8, Vec3::ONE);
        assert_eq!(shape.vertex_count(), 9);
        assert_eq!(shape.index_count(), 24);
        assert_eq!(&shape.indices()[21..], &[0, 8, 1]);
    }

    #[test]
    fn calculate_transform_aligns_unit_z_with_segment() {
        let p0 = Vec3::new(1.0, 2.0, 3.0);
        let p1 = Vec3::new(4.0, -2.0, 3.0);
        let (t, r, s) = calculate_transform(p0, p1, (1.0, 1.0));
        let rotation = glam::Quat::from_euler(glam::EulerRot::ZYX, r.z, r.y, r.x);
        let tip = t + rotation * (Vec3::Z * s.z);
        assert!((tip - p1).length() < 1e-4);
        assert!((s.z - 5.0).abs() < 1e-5);
    }

    #[test]
    fn beam_between_coincident_points_is_empty() {
        let [body, wire] = beam(Vec3::X, Vec3::X, 1.0, 1.0, Vec3::ONE, Vec3::ONE);
        assert!(body.is_empty());
        assert!(wire.is_empty());
    }

    #[test]
    fn beam_runs_from_start_to_end() {
        let [body, _] = beam(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 0.2, 0.4, Vec3::ONE, Vec3::ONE);
        let min = body.positions().fold(Vec3::splat(f32::MAX), Vec3::min);
        let max = body.positions().fold(Vec3::splat(f32::MIN), Vec3::max);
        assert!(min.x.abs() < 1e-4);
        assert!((max.x - 10.0).abs() < 1e-4);
    }

    #[test]
    fn target_has_two_edges_per_corner() {
        let shape = rectangle_target(Vec3::ZERO, 2.0, 2.0, 0.25, Vec3::ONE);
        assert_eq!(shape.vertex_count(), 12);
        assert_eq!(shape.index_count(), 16);
        assert_eq!(shape.topology(), PrimitiveTopology::LineList);
    }
}
