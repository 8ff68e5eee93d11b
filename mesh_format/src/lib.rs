use std::{
    fs,
    path::Path,
    thread::{self, JoinHandle},
};

use common::progress::Progress;
use nalgebra::Vector3;
use tracing::{debug, info};

mod dae;
mod error;
mod gts;
mod obj;
pub mod stl;
mod util;

pub use error::{ImportError, ImportErrorKind};

/// Indexed triangle mesh as read from a file. Vertices closer than
/// `common::math::EPSILON` on every axis have already been merged.
#[derive(Debug, Default, Clone)]
pub struct Mesh {
    pub verts: Vec<Vector3<f64>>,
    pub faces: Vec<[u32; 3]>,
}

pub trait FormatPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    /// Checks if the bytes look like this format. Must be cheap.
    fn sniff(&self, bytes: &[u8]) -> bool;
    fn decode(&self, bytes: &[u8], progress: &Progress) -> Result<Mesh, ImportError>;
}

/// Set of format plugins, tried in registration order.
pub struct Registry {
    plugins: Vec<Box<dyn FormatPlugin>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn FormatPlugin>) {
        self.plugins.push(plugin);
    }

    pub fn formats(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugins.iter().map(|x| x.name())
    }

    /// Decodes the bytes with the first plugin whose sniff accepts them.
    pub fn decode(&self, bytes: &[u8], progress: &Progress) -> Result<Mesh, ImportError> {
        if bytes.is_empty() {
            return Err(ImportError::UnknownFormat);
        }

        let plugin = (self.plugins.iter())
            .find(|x| x.sniff(bytes))
            .ok_or(ImportError::UnknownFormat)?;
        debug!(format = plugin.name(), bytes = bytes.len(), "Decoding mesh");

        let mesh = plugin.decode(bytes, progress);
        progress.set_finished();

        let mesh = mesh?;
        for face in mesh.faces.iter() {
            if face.iter().any(|&x| x as usize >= mesh.verts.len()) {
                return Err(ImportError::malformed(plugin.name(), "face index out of range"));
            }
        }

        info!(
            format = plugin.name(),
            vertices = mesh.verts.len(),
            faces = mesh.faces.len(),
            "Loaded mesh"
        );
        Ok(mesh)
    }
}

impl Default for Registry {
    /// Plugins with the most specific sniffers go first.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(dae::DaePlugin));
        registry.register(Box::new(gts::GtsPlugin));
        registry.register(Box::new(obj::ObjPlugin));
        registry.register(Box::new(stl::StlPlugin));
        registry
    }
}

pub fn load_mesh_bytes(bytes: &[u8]) -> Result<Mesh, ImportError> {
    Registry::default().decode(bytes, &Progress::new())
}

pub fn load_mesh(path: impl AsRef<Path>) -> Result<Mesh, ImportError> {
    let bytes = fs::read(path)?;
    load_mesh_bytes(&bytes)
}

/// Reads and decodes the file on a background thread so the caller can
/// poll the returned progress.
pub fn spawn_load(path: impl AsRef<Path>) -> (Progress, JoinHandle<Result<Mesh, ImportError>>) {
    let progress = Progress::new();
    let path = path.as_ref().to_path_buf();

    let join = thread::spawn({
        let progress = progress.clone();
        move || -> Result<Mesh, ImportError> {
            let bytes = fs::read(&path).inspect_err(|_| progress.set_finished())?;
            Registry::default().decode(&bytes, &progress)
        }
    });

    (progress, join)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_empty_input() {
        let registry = Registry::default();
        let progress = Progress::new();

        let empty = registry.decode(&[], &progress).unwrap_err();
        assert_eq!(empty.kind(), ImportErrorKind::UnknownFormat);

        let noise = registry.decode(&[0xFF, 0x00, 0x12], &progress).unwrap_err();
        assert_eq!(noise.kind(), ImportErrorKind::UnknownFormat);
    }

    #[test]
    fn sniffs_each_format() {
        let obj = load_mesh_bytes(b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert_eq!(obj.faces.len(), 1);

        let gts = load_mesh_bytes(b"3 3 1\n0 0 0\n1 0 0\n0 1 0\n1 2\n2 3\n3 1\n1 2 3\n").unwrap();
        assert_eq!(gts.faces.len(), 1);

        let mesh = Mesh {
            verts: obj.verts.clone(),
            faces: obj.faces.clone(),
        };
        let stl = load_mesh_bytes(&stl::encode_binary(&mesh)).unwrap();
        assert_eq!(stl.faces.len(), 1);
    }

    #[test]
    fn background_load() {
        let path = std::env::temp_dir().join(format!("mesh-load-{}.obj", std::process::id()));
        fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let (progress, join) = spawn_load(&path);
        let mesh = join.join().unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(mesh.unwrap().faces.len(), 1);
        assert!(progress.complete());

        let (_, join) = spawn_load("/definitely/not/here.stl");
        assert_eq!(join.join().unwrap().unwrap_err().kind(), ImportErrorKind::Io);
    }

    #[test]
    fn registered_formats() {
        let formats = Registry::default().formats().collect::<Vec<_>>();
        assert_eq!(formats.len(), 4);
        assert!(["stl", "obj"].iter().all(|x| formats.contains(x)));
        assert_eq!(Registry::new().formats().count(), 0);
    }

    #[test]
    fn missing_file_is_io() {
        let err = load_mesh("/definitely/not/here.stl").unwrap_err();
        assert_eq!(err.kind(), ImportErrorKind::Io);
    }
}
