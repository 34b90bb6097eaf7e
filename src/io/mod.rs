use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{self, format_err};
use bincode;
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml;

pub(crate) mod format;


/// An enumerated type for `lassi` file types.
pub enum LassiFileType {
    /// Variant for binary files containing built Hamiltonian, $`\hat{S}^2`$, and overlap
    /// matrices.
    Mat,

    /// Variant for binary files containing local-root vectors.
    Ci,

    /// Variant for binary files containing active-space integrals.
    Int,
}

impl LassiFileType {
    /// Returns the extension of the file type.
    pub fn ext(&self) -> String {
        match self {
            LassiFileType::Mat => "lassi.mat".to_string(),
            LassiFileType::Ci => "lassi.ci".to_string(),
            LassiFileType::Int => "lassi.int".to_string(),
        }
    }
}

/// Reads a `lassi` binary file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the file to be read in (without `lassi`-specific extensions).
/// * `file_type` - The type of the `lassi` file to be read in.
///
/// # Returns
///
/// A `Result` containing the structure deserialised from the read-in file.
pub fn read_lassi_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: LassiFileType,
) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let mut path = name.as_ref().to_path_buf();
    path.set_extension(file_type.ext());
    let mut reader = BufReader::new(File::open(path).map_err(|err| format_err!(err))?);
    bincode::deserialize_from(&mut reader).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into a `lassi` binary file.
///
/// # Arguments
///
/// * `name` - The name of the file to be written (without `lassi`-specific extensions).
/// * `file_type` - The type of the `lassi` file to be written.
/// * `value` - The structure to be written.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_lassi_binary<T, P: AsRef<Path>>(
    name: P,
    file_type: LassiFileType,
    value: &T,
) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let mut path = name.as_ref().to_path_buf();
    path.set_extension(file_type.ext());
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, value).map_err(|err| format_err!(err))
}

/// Reads a `lassi` configuration YAML file and deserialises it into an appropriate structure.
///
/// # Arguments
///
/// * `name` - The name of the YAML file to be read in (with its `.yml` or `.yaml` extension).
///
/// # Returns
///
/// The deserialised structure.
pub fn read_lassi_yaml<T, P: AsRef<Path>>(name: P) -> Result<T, anyhow::Error>
where
    T: DeserializeOwned,
{
    let mut reader = BufReader::new(File::open(name).map_err(|err| format_err!(err))?);
    serde_yaml::from_reader(&mut reader).map_err(|err| format_err!(err))
}

/// Serialises a structure and writes into a `lassi` configuration YAML file.
///
/// # Arguments
///
/// * `name` - The name of the YAML file to be written (without extensions). The resulting file
/// will have the `.yml` extension.
///
/// # Returns
///
/// A `Result` indicating if the serialisation and writing processes have been successful.
pub fn write_lassi_yaml<T, P: AsRef<Path>>(name: P, value: &T) -> Result<(), anyhow::Error>
where
    T: Serialize,
{
    let mut path = name.as_ref().to_path_buf();
    path.set_extension("yml");
    let mut writer = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(&mut writer, value).map_err(|err| format_err!(err))
}
