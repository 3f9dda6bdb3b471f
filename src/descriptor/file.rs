use std::fs;
use std::path::{Path, PathBuf};

use crate::descriptor::InterfaceDescriptor;
use crate::error::{MapperError, Result};

/// Produces the current descriptor set of one interface.
///
/// The store calls [`load`](DescriptorSource::load) once at registration and,
/// in refresh-on-access mode, again on every lookup.
pub trait DescriptorSource: Send + Sync {
    /// Reads and parses the interface's descriptors.
    fn load(&self) -> Result<InterfaceDescriptor>;
}

/// TOML mapper file on disk.
#[derive(Clone, Debug)]
pub struct MapperFile {
    path: PathBuf,
}

impl MapperFile {
    /// Points at a mapper file without reading it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the mapper file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses mapper TOML text.
    pub fn parse(text: &str) -> Result<InterfaceDescriptor> {
        let iface: InterfaceDescriptor = toml::from_str(text)?;
        Ok(iface)
    }
}

impl DescriptorSource for MapperFile {
    fn load(&self) -> Result<InterfaceDescriptor> {
        let text = fs::read_to_string(&self.path).map_err(|err| {
            MapperError::Configuration(format!(
                "failed to read mapper {}: {err}",
                self.path.display()
            ))
        })?;
        Self::parse(&text).map_err(|err| match err {
            MapperError::Decode(msg) => {
                MapperError::Decode(format!("{}: {msg}", self.path.display()))
            }
            other => other,
        })
    }
}

/// In-memory source returning a fixed descriptor set.
#[derive(Clone, Debug)]
pub struct StaticSource(pub InterfaceDescriptor);

impl DescriptorSource for StaticSource {
    fn load(&self) -> Result<InterfaceDescriptor> {
        Ok(self.0.clone())
    }
}
