//! Mesh geometry files read by the presolver.
//!
//! Node and element indices are 1-based everywhere except in the adjacency
//! file, where the presolver expects 0-based element ids.

use std::collections::BTreeSet;
use std::io::{self, Write};

use super::faces::{FaceIndex, ALL_EXTERIOR_FACES_ID};
use super::SUPRE_FILE;
use crate::manifest::FileManifest;
use crate::mesh::{FaceIdentifier, FaceType, MeshData, SolidModel};

const ADJACENCY_RESERVED: usize = 50;

/// Sorted unique nodes of `faces`, one per line.
pub(crate) fn write_nbc<'i, W: Write>(
    mesh: &dyn MeshData,
    faces: impl IntoIterator<Item = &'i FaceIdentifier>,
    mut out: W,
) -> io::Result<()> {
    let nodes: BTreeSet<usize> = faces.into_iter().flat_map(|f| mesh.face_nodes(f)).collect();
    for node in nodes {
        writeln!(out, "{}", node + 1)?;
    }
    Ok(())
}

/// `element face n0 n1 n2` per boundary triangle of `faces`.
pub(crate) fn write_ebc<'i, W: Write>(
    mesh: &dyn MeshData,
    faces: impl IntoIterator<Item = &'i FaceIdentifier>,
    mut out: W,
) -> io::Result<()> {
    for face in faces {
        for tri in mesh.face_triangles(face) {
            let [a, b, c] = tri.nodes;
            writeln!(out, "{} {} {} {} {}", tri.element + 1, tri.face + 1, a + 1, b + 1, c + 1)?;
        }
    }
    Ok(())
}

pub(crate) fn write_supre_header(mesh: &dyn MeshData, manifest: &mut FileManifest) -> io::Result<()> {
    let supre = manifest.file(SUPRE_FILE);
    writeln!(supre, "number_of_variables 5")?;
    writeln!(supre, "number_of_nodes {}", mesh.node_count())?;
    writeln!(supre, "number_of_elements {}", mesh.element_count())?;
    writeln!(supre, "number_of_mesh_edges {}", mesh.edge_count())?;
    writeln!(supre, "number_of_mesh_faces {}", mesh.face_count())?;
    writeln!(supre)?;
    writeln!(supre, "phasta_node_order")?;
    writeln!(supre)?;
    writeln!(supre, "nodes the.coordinates")?;
    writeln!(supre, "elements the.connectivity")?;
    writeln!(supre, "boundary_faces all_exterior_faces.ebc")?;
    writeln!(supre, "adjacency the.xadj")?;
    writeln!(supre)
}

pub(crate) fn write_surface_ids(faces: &FaceIndex, manifest: &mut FileManifest) -> io::Result<()> {
    let supre = manifest.file(SUPRE_FILE);
    writeln!(supre, "set_surface_id all_exterior_faces.ebc {ALL_EXTERIOR_FACES_ID}")?;
    for surface in faces.iter() {
        writeln!(supre, "set_surface_id {}.ebc {}", surface.name, surface.id)?;
    }
    writeln!(supre)
}

/// `wall.nbc`, `all_exterior_faces.ebc` and one `.nbc`/`.ebc` pair per surface.
pub(crate) fn write_nbc_ebc(
    mesh: &dyn MeshData,
    model: &dyn SolidModel,
    faces: &FaceIndex,
    manifest: &mut FileManifest,
) -> io::Result<()> {
    let all = model.face_identifiers();
    let walls = all.iter().filter(|f| f.face_type == FaceType::Wall);
    write_nbc(mesh, walls, manifest.file("presolver/wall.nbc"))?;
    write_ebc(mesh, all, manifest.file("presolver/all_exterior_faces.ebc"))?;

    for surface in faces.iter() {
        let base = format!("presolver/{}", surface.name);
        write_nbc(mesh, [&surface.identifier], manifest.file(format!("{base}.nbc")))?;
        write_ebc(mesh, [&surface.identifier], manifest.file(format!("{base}.ebc")))?;
    }
    Ok(())
}

pub(crate) fn write_coordinates(mesh: &dyn MeshData, manifest: &mut FileManifest) -> io::Result<()> {
    let out = manifest.file("presolver/the.coordinates");
    for i in 0..mesh.node_count() {
        let [x, y, z] = mesh.node_coordinates(i);
        writeln!(out, "{} {x:?} {y:?} {z:?}", i + 1)?;
    }
    Ok(())
}

pub(crate) fn write_connectivity(mesh: &dyn MeshData, manifest: &mut FileManifest) -> io::Result<()> {
    let out = manifest.file("presolver/the.connectivity");
    for i in 0..mesh.element_count() {
        let [a, b, c, d] = mesh.element_nodes(i);
        writeln!(out, "{} {} {} {} {}", i + 1, a + 1, b + 1, c + 1, d + 1)?;
    }
    Ok(())
}

/// CSR adjacency: offsets then neighbour ids. The second line is reserved
/// and filled with the total neighbour count at the end.
pub(crate) fn write_adjacency(mesh: &dyn MeshData, manifest: &mut FileManifest) -> io::Result<()> {
    let out = manifest.file("presolver/the.xadj");
    let header = format!("xadj: {}\n", mesh.element_count() + 1);
    out.write_all(header.as_bytes())?;
    writeln!(out, "{}", " ".repeat(ADJACENCY_RESERVED))?;

    let mut offset = 0;
    writeln!(out, "0")?;
    for i in 0..mesh.element_count() {
        offset += mesh.adjacent_elements(i).len();
        writeln!(out, "{offset}")?;
    }
    for i in 0..mesh.element_count() {
        for adjacent in mesh.adjacent_elements(i) {
            writeln!(out, "{adjacent}")?;
        }
    }

    out.patch(header.len(), format!("adjncy: {offset}").as_bytes());
    Ok(())
}
