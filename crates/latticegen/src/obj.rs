//! Wavefront OBJ export of a committed triangle soup.

use lattice::{unpack_normal, Vertex};
use std::io::{self, Write};

/// Writes one `v` line per vertex, one `vn` per triangle and one face per
/// triangle referencing both (1-based, `f v//vn`).
pub fn write_obj<W: Write>(mut out: W, vertices: &[Vertex]) -> io::Result<()> {
    if vertices.len() % 3 != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} vertices is not a whole number of triangles", vertices.len()),
        ));
    }

    writeln!(out, "# lattice: {} triangles", vertices.len() / 3)?;
    for v in vertices {
        let [x, y, z] = v.position;
        writeln!(out, "v {x} {y} {z}")?;
    }
    for tri in vertices.chunks_exact(3) {
        let n = unpack_normal(tri[0].normal);
        writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
    }
    for t in 0..vertices.len() / 3 {
        let (a, n) = (3 * t + 1, t + 1);
        writeln!(out, "f {a}//{n} {}//{n} {}//{n}", a + 1, a + 2)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice::PackedNormal;

    fn tri(z: f32) -> [Vertex; 3] {
        let normal = PackedNormal([0, 0, 32767, 0]);
        [
            Vertex { position: [0.0, 0.0, z], normal },
            Vertex { position: [1.0, 0.0, z], normal },
            Vertex { position: [0.0, 1.0, z], normal },
        ]
    }

    #[test]
    fn test_two_triangles() {
        let verts: Vec<Vertex> = tri(0.0).into_iter().chain(tri(0.5)).collect();
        let mut buf = Vec::new();
        write_obj(&mut buf, &verts).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 6);
        assert_eq!(text.lines().filter(|l| l.starts_with("vn ")).count(), 2);
        assert!(text.contains("vn 0 0 1\n"));
        assert!(text.contains("f 1//1 2//1 3//1\n"));
        assert!(text.contains("f 4//2 5//2 6//2\n"));
        assert!(text.contains("v 1 0 0.5\n"));
    }

    #[test]
    fn test_partial_triangle_rejected() {
        let verts = vec![Vertex { position: [0.0; 3], normal: PackedNormal::default() }; 4];
        assert!(write_obj(Vec::new(), &verts).is_err());
    }
}
