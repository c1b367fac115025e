//! Program images, either read from a file or out of a zip archive of roms.
use std::{
    io::{Cursor, Read, Seek},
    path::Path,
};

use zip::read::ZipArchive;

use crate::error::ResourceError;

/// Represents an archive of roms
/// it contains all kind of information about the information of the archives
pub struct RomArchive<R> {
    archive: ZipArchive<R>,
}

impl<R> RomArchive<R>
where
    R: Read + Seek,
{
    /// Will open the archive read from the given reader.
    pub fn new(reader: R) -> Result<Self, ResourceError> {
        let archive = ZipArchive::new(reader)?;
        log::debug!("Opened a rom archive with {} entries", archive.len());
        Ok(Self { archive })
    }

    /// Will return all the rom names available to be chosen
    pub fn file_names(&self) -> Vec<&str> {
        self.archive.file_names().collect()
    }

    /// Will decompress the information from the zip archive
    pub fn get_file_data(&mut self, name: &str) -> Result<Rom, ResourceError> {
        let mut file = self.archive.by_name(name)?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)?;
        Ok(Rom::new(name, data))
    }
}

impl<'a> RomArchive<Cursor<&'a [u8]>> {
    /// Will open an archive that is already in memory.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, ResourceError> {
        Self::new(Cursor::new(bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Represents a single rom with it's information
pub struct Rom {
    /// The rom name
    name: String,
    /// The raw program bytes, loaded verbatim at the program start
    data: Box<[u8]>,
}

impl Rom {
    /// Will generate a new rom based of the given data
    pub fn new<T>(name: &str, data: T) -> Self
    where
        T: Into<Box<[u8]>>,
    {
        Rom {
            name: name.to_string(),
            data: data.into(),
        }
    }

    /// Will read the rom from the given file, the file stem is used as
    /// the name.
    pub fn from_path<P>(path: P) -> Result<Self, ResourceError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        log::debug!("Read the rom {} with {} bytes", name, data.len());
        Ok(Rom::new(&name, data))
    }

    /// Will return a slice internal values of the given data
    pub fn get_data(&self) -> &[u8] {
        &self.data
    }

    /// Will return the name of the rom.
    pub fn get_name(&self) -> &str {
        &self.name
    }
}
