//! Loading of compiled contract artifacts

use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::{hex, json_abi::JsonAbi, primitives::Bytes};
use serde::Deserialize;

use crate::{
    constants::{ARTIFACT_EXTENSION, BUILD_INFO_DIR, DEBUG_ARTIFACT_SUFFIX},
    errors::ScriptError,
};

/// The ABI and creation bytecode of a compiled contract
#[derive(Debug, Clone)]
pub struct Artifact {
    /// The name of the contract
    pub contract_name: String,
    /// The contract's ABI
    pub abi: JsonAbi,
    /// The contract's creation bytecode, without constructor arguments
    pub bytecode: Bytes,
}

/// The subset of a Hardhat artifact file we care about
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFile {
    /// The name of the contract
    contract_name: String,
    /// The contract's ABI
    abi: JsonAbi,
    /// The hex-encoded creation bytecode
    bytecode: String,
}

impl Artifact {
    /// Parse an artifact from the contents of a Hardhat artifact file
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        let ArtifactFile {
            contract_name,
            abi,
            bytecode,
        } = serde_json::from_str(json).map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;

        let bytecode = hex::decode(&bytecode)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{contract_name}: {e}")))?;

        Ok(Self {
            contract_name,
            abi,
            bytecode: bytecode.into(),
        })
    }
}

/// A source of compiled contract artifacts
pub trait ArtifactProvider {
    /// Fetch the artifact for the given identifier
    fn artifact(&self, id: &str) -> Result<Artifact, ScriptError>;
}

/// Reads artifacts out of a Hardhat `artifacts` directory.
///
/// An identifier is either a fully-qualified name (`contracts/Foo.sol:Foo`),
/// a bare contract name, which must be unique across the directory, or the
/// path of an artifact file outside the directory.
pub struct HardhatArtifacts {
    /// The root of the artifacts directory
    root: PathBuf,
}

impl HardhatArtifacts {
    /// Read artifacts from the directory at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an identifier to the path of its artifact file
    fn resolve(&self, id: &str) -> Result<PathBuf, ScriptError> {
        let as_path = Path::new(id);
        if as_path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION) {
            return if as_path.is_file() {
                Ok(as_path.to_path_buf())
            } else {
                Err(ScriptError::ArtifactNotFound(id.to_string()))
            };
        }

        if let Some((source, name)) = id.split_once(':') {
            let path = self
                .root
                .join(source)
                .join(format!("{name}.{ARTIFACT_EXTENSION}"));
            return if path.is_file() {
                Ok(path)
            } else {
                Err(ScriptError::ArtifactNotFound(id.to_string()))
            };
        }

        let file_name = format!("{id}.{ARTIFACT_EXTENSION}");
        let mut matches = Vec::new();
        find_files(&self.root, &file_name, &mut matches)?;

        match matches.len() {
            0 => Err(ScriptError::ArtifactNotFound(id.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(ScriptError::ArtifactParsing(format!(
                "{id} is ambiguous, use a fully-qualified name: {}",
                matches
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

impl ArtifactProvider for HardhatArtifacts {
    fn artifact(&self, id: &str) -> Result<Artifact, ScriptError> {
        let path = self.resolve(id)?;
        let contents =
            fs::read_to_string(&path).map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?;
        Artifact::from_json(&contents)
    }
}

/// Recursively collect every file named `file_name` under `dir`
fn find_files(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> Result<(), ScriptError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ScriptError::ArtifactNotFound(format!("{}: {e}", dir.display())))?;

    for entry in entries {
        let path = entry
            .map_err(|e| ScriptError::ArtifactParsing(e.to_string()))?
            .path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();

        if path.is_dir() {
            if name != BUILD_INFO_DIR {
                find_files(&path, file_name, found)?;
            }
        } else if name == file_name && !name.ends_with(DEBUG_ARTIFACT_SUFFIX) {
            found.push(path);
        }
    }

    Ok(())
}
