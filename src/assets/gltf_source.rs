//! glTF/GLB mesh source backed by the file system

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use glam::{Quat, Vec2, Vec3};
use parking_lot::Mutex;

use crate::backend::types::Vertex;
use crate::resources::{compute_vertex_normals, Geometry, Material, SharedMaterial, Texture};
use crate::scene::{Node, Transform};

use super::{sanitize_log_message, AssetError, MeshSource};

/// Loads `.gltf`/`.glb` files relative to a root directory.
///
/// Each load parses the file on its own worker thread; the returned future
/// resolves when the worker is done. Buffers and images referenced by
/// relative URIs are resolved against the model's directory.
#[derive(Debug, Clone)]
pub struct GltfSource {
    root: PathBuf,
}

impl GltfSource {
    /// Create a source rooted at the given directory.
    ///
    /// The directory does not need to exist yet; it is checked at load time.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an identifier to a full filesystem path.
    fn resolve(&self, identifier: &str) -> PathBuf {
        self.root.join(identifier)
    }
}

impl MeshSource for GltfSource {
    fn load(&self, identifier: &str) -> impl Future<Output = Result<Node, AssetError>> {
        LoadTask::spawn(self.resolve(identifier))
    }
}

struct Slot {
    result: Option<Result<Node, AssetError>>,
    waker: Option<Waker>,
}

/// Future resolving to the node parsed by a loader thread
pub struct LoadTask {
    slot: Arc<Mutex<Slot>>,
}

impl LoadTask {
    fn spawn(path: PathBuf) -> Self {
        let slot = Arc::new(Mutex::new(Slot {
            result: None,
            waker: None,
        }));
        let completion = Completion {
            slot: slot.clone(),
            result: None,
        };

        let spawned = std::thread::Builder::new()
            .name("gltf-loader".to_string())
            .spawn(move || {
                let mut completion = completion;
                completion.result = Some(load_file(&path));
            });

        if let Err(source) = spawned {
            slot.lock().result = Some(Err(AssetError::Io {
                path: "<loader thread>".to_string(),
                source,
            }));
        }

        Self { slot }
    }
}

impl Future for LoadTask {
    type Output = Result<Node, AssetError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.lock();
        match slot.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Publishes the worker's result when dropped, so a panicking parser still
/// resolves the future (with [`AssetError::WorkerLost`])
struct Completion {
    slot: Arc<Mutex<Slot>>,
    result: Option<Result<Node, AssetError>>,
}

impl Drop for Completion {
    fn drop(&mut self) {
        let result = self.result.take().unwrap_or(Err(AssetError::WorkerLost));
        let waker = {
            let mut slot = self.slot.lock();
            slot.result = Some(result);
            slot.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

fn load_file(path: &Path) -> Result<Node, AssetError> {
    if !path.is_file() {
        return Err(AssetError::NotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let ::gltf::Gltf { document, blob } = ::gltf::Gltf::from_slice(&bytes)?;
    let base = path.parent();
    let buffers = ::gltf::import_buffers(&document, base, blob)?;

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model");
    let node = SceneBuilder::new(&document, &buffers, base).build(name)?;
    log::info!("parsed {} ({} meshes)", path.display(), node.mesh_count());
    Ok(node)
}

/// Converts a parsed document into a node tree, sharing geometry between
/// nodes instancing the same mesh and materials between primitives using
/// the same glTF material
struct SceneBuilder<'a> {
    document: &'a ::gltf::Document,
    buffers: &'a [::gltf::buffer::Data],
    images: Vec<Option<Arc<Texture>>>,
    materials: HashMap<Option<usize>, SharedMaterial>,
    geometries: HashMap<(usize, usize), Arc<Geometry>>,
}

impl<'a> SceneBuilder<'a> {
    fn new(
        document: &'a ::gltf::Document,
        buffers: &'a [::gltf::buffer::Data],
        base: Option<&Path>,
    ) -> Self {
        Self {
            document,
            buffers,
            images: decode_images(document, buffers, base),
            materials: HashMap::new(),
            geometries: HashMap::new(),
        }
    }

    fn build(mut self, name: &str) -> Result<Node, AssetError> {
        let scene = self
            .document
            .default_scene()
            .or_else(|| self.document.scenes().next())
            .ok_or(AssetError::NoScene)?;

        let mut root = Node::group(name);
        for node in scene.nodes() {
            let child = self.node(&node)?;
            root.add_child(child);
        }
        Ok(root)
    }

    fn node(&mut self, node: &::gltf::Node<'_>) -> Result<Node, AssetError> {
        let (translation, rotation, scale) = node.transform().decomposed();
        let name = node
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("node_{}", node.index()));
        let mut out = Node::group(&name).with_transform(Transform::from_position_rotation_scale(
            Vec3::from(translation),
            Quat::from_array(rotation),
            Vec3::from(scale),
        ));

        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                if !matches!(primitive.mode(), ::gltf::mesh::Mode::Triangles) {
                    log::debug!(
                        "skipping mesh {} primitive {}: {:?} topology",
                        mesh.index(),
                        primitive.index(),
                        primitive.mode()
                    );
                    continue;
                }
                let geometry = self.geometry(&mesh, &primitive)?;
                let material = self.material(primitive.material());
                let label = format!("{}_{}", mesh.name().unwrap_or("mesh"), primitive.index());
                out.add_child(Node::mesh(&label, geometry, material));
            }
        }

        for child in node.children() {
            let child = self.node(&child)?;
            out.add_child(child);
        }
        Ok(out)
    }

    fn geometry(
        &mut self,
        mesh: &::gltf::Mesh<'_>,
        primitive: &::gltf::Primitive<'_>,
    ) -> Result<Arc<Geometry>, AssetError> {
        let key = (mesh.index(), primitive.index());
        if let Some(geometry) = self.geometries.get(&key) {
            return Ok(geometry.clone());
        }

        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .ok_or(AssetError::MissingPositions {
                mesh: key.0,
                primitive: key.1,
            })?
            .map(Vec3::from)
            .collect();

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let normals: Vec<Vec3> = match reader.read_normals() {
            Some(normals) => normals.map(Vec3::from).collect(),
            None => compute_vertex_normals(&positions, &indices),
        };
        let uvs: Vec<Vec2> = reader
            .read_tex_coords(0)
            .map(|uvs| uvs.into_f32().map(Vec2::from).collect())
            .unwrap_or_default();

        let vertices = positions
            .iter()
            .enumerate()
            .map(|(i, position)| {
                Vertex::new(
                    *position,
                    normals.get(i).copied().unwrap_or(Vec3::Y),
                    uvs.get(i).copied().unwrap_or(Vec2::ZERO),
                )
            })
            .collect();

        let name = format!("{}_{}", mesh.name().unwrap_or("mesh"), key.1);
        let geometry = Arc::new(Geometry::new(&name, vertices, indices));
        self.geometries.insert(key, geometry.clone());
        Ok(geometry)
    }

    fn material(&mut self, material: ::gltf::Material<'_>) -> SharedMaterial {
        let key = material.index();
        if let Some(shared) = self.materials.get(&key) {
            return shared.clone();
        }

        let pbr = material.pbr_metallic_roughness();
        let [r, g, b, a] = pbr.base_color_factor();
        let mut out = Material::standard(material.name().unwrap_or("default"), Vec3::new(r, g, b))
            .with_opacity(a)
            .with_metalness(pbr.metallic_factor())
            .with_roughness(pbr.roughness_factor());

        if let Some(info) = pbr.base_color_texture() {
            let image = info.texture().source().index();
            if let Some(Some(texture)) = self.images.get(image) {
                out = out.with_map(texture.clone());
            }
        }

        let shared = out.into_shared();
        self.materials.insert(key, shared.clone());
        shared
    }
}

/// Decode every image of the document. Images that cannot be decoded are
/// logged and left out; materials referencing them render untextured.
fn decode_images(
    document: &::gltf::Document,
    buffers: &[::gltf::buffer::Data],
    base: Option<&Path>,
) -> Vec<Option<Arc<Texture>>> {
    document
        .images()
        .map(|image| {
            let name = image
                .name()
                .map(String::from)
                .unwrap_or_else(|| format!("image_{}", image.index()));
            let decoded = image_bytes(&image, buffers, base).and_then(|bytes| {
                Texture::from_bytes(&bytes, &name).map_err(|err| err.to_string())
            });
            match decoded {
                Ok(texture) => Some(Arc::new(texture)),
                Err(message) => {
                    log::warn!(
                        "skipping image {}: {}",
                        name,
                        sanitize_log_message(&message)
                    );
                    None
                }
            }
        })
        .collect()
}

fn image_bytes(
    image: &::gltf::Image<'_>,
    buffers: &[::gltf::buffer::Data],
    base: Option<&Path>,
) -> Result<Vec<u8>, String> {
    match image.source() {
        ::gltf::image::Source::View { view, .. } => {
            let buffer = buffers
                .get(view.buffer().index())
                .ok_or_else(|| format!("buffer {} out of range", view.buffer().index()))?;
            let start = view.offset();
            let end = start + view.length();
            buffer
                .0
                .get(start..end)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| "buffer view out of range".to_string())
        }
        ::gltf::image::Source::Uri { uri, .. } => {
            if let Some(data) = decode_data_uri(uri) {
                return Ok(data);
            }
            if uri.starts_with("data:") {
                return Err("malformed data URI".to_string());
            }
            let path = base.map(|dir| dir.join(uri)).unwrap_or_else(|| PathBuf::from(uri));
            std::fs::read(&path).map_err(|err| format!("{}: {}", path.display(), err))
        }
    }
}

/// Payload of a `data:<mime>;base64,<payload>` URI
fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (_, payload) = rest.split_once(";base64,")?;
    decode_base64(payload)
}

fn decode_base64(input: &str) -> Option<Vec<u8>> {
    fn sextet(c: u8) -> Option<u32> {
        match c {
            b'A'..=b'Z' => Some((c - b'A') as u32),
            b'a'..=b'z' => Some((c - b'a' + 26) as u32),
            b'0'..=b'9' => Some((c - b'0' + 52) as u32),
            b'+' | b'-' => Some(62),
            b'/' | b'_' => Some(63),
            _ => None,
        }
    }

    let digits: Vec<u8> = input
        .bytes()
        .filter(|c| !c.is_ascii_whitespace() && *c != b'=')
        .collect();
    let mut out = Vec::with_capacity(digits.len() * 3 / 4);
    for chunk in digits.chunks(4) {
        if chunk.len() == 1 {
            return None;
        }
        let mut bits = 0u32;
        for (i, &c) in chunk.iter().enumerate() {
            bits |= sextet(c)? << (18 - 6 * i);
        }
        let bytes = bits.to_be_bytes();
        out.extend_from_slice(&bytes[1..chunk.len()]);
    }
    Some(out)
}
