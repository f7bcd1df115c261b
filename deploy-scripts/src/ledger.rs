//! The deployments file, recording the address of every contract deployed to
//! the target network.
//!
//! The file is a flat JSON object mapping a contract key to its address. It is
//! rewritten in full after every recorded deployment, so a crash part way
//! through a run never loses a previously recorded address.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs::{self, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::primitives::Address;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::debug;

use crate::errors::ScriptError;

/// The indentation used when writing the deployments file
const LEDGER_INDENT: &[u8] = b" ";

/// The suffix of the scratch file written before replacing the deployments file
const TMP_SUFFIX: &str = ".tmp";

/// The in-memory view of the deployments file for one network
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Where the ledger is persisted
    path: PathBuf,
    /// Contract key -> deployed address.
    ///
    /// `None` marks a key present in the file without an address (`""` or `null`),
    /// which is kept on rewrite but treated as not deployed.
    records: BTreeMap<String, Option<Address>>,
}

impl Ledger {
    /// Load the ledger at `path`, starting empty if no file exists there
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref().to_path_buf();
        let display_path = path.display().to_string();
        let corrupt = |reason: String| ScriptError::CorruptLedger {
            path: display_path.clone(),
            reason,
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no deployments file, starting empty");
                return Ok(Self {
                    path,
                    records: BTreeMap::new(),
                });
            }
            Err(e) => return Err(corrupt(e.to_string())),
        };

        let raw: BTreeMap<String, Option<String>> =
            serde_json::from_str(&contents).map_err(|e| corrupt(e.to_string()))?;

        let mut records = BTreeMap::new();
        for (key, value) in raw {
            let address = match value.as_deref() {
                None | Some("") => None,
                Some(s) => Some(
                    Address::from_str(s)
                        .map_err(|e| corrupt(format!("invalid address for {key}: {e}")))?,
                ),
            };
            records.insert(key, address);
        }

        Ok(Self { path, records })
    }

    /// The path the ledger is persisted to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The recorded address of `name`, if it has been deployed
    pub fn get(&self, name: &str) -> Option<Address> {
        self.records.get(name).copied().flatten()
    }

    /// Iterate over all deployed contracts
    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.records
            .iter()
            .filter_map(|(key, addr)| addr.map(|addr| (key.as_str(), addr)))
    }

    /// Record `address` for `name` and flush the whole ledger to disk
    pub fn put(&mut self, name: &str, address: Address) -> Result<(), ScriptError> {
        self.records.insert(name.to_string(), Some(address));
        self.flush().map_err(|reason| ScriptError::PersistLedger {
            contract: name.to_string(),
            address,
            reason,
        })
    }

    /// Serialize the ledger to JSON, addresses as lowercase hex
    fn to_json(&self) -> Result<Vec<u8>, String> {
        let entries: BTreeMap<&str, String> = self
            .records
            .iter()
            .map(|(key, addr)| {
                let value = addr.map(|addr| format!("{addr:#x}")).unwrap_or_default();
                (key.as_str(), value)
            })
            .collect();

        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(LEDGER_INDENT);
        let mut ser = Serializer::with_formatter(&mut buf, formatter);
        entries.serialize(&mut ser).map_err(|e| e.to_string())?;
        Ok(buf)
    }

    /// Write the ledger to a scratch file and move it over the deployments file.
    ///
    /// The scratch file is removed if any step fails.
    fn flush(&self) -> Result<(), String> {
        let json = self.to_json()?;

        let tmp_path = self.tmp_path();
        if let Err(e) = replace_file(&tmp_path, &self.path, &json) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        debug!(path = %self.path.display(), "deployments file written");
        Ok(())
    }

    /// The path of the scratch file written before replacing the deployments file
    fn tmp_path(&self) -> PathBuf {
        let mut tmp_path = OsString::from(self.path.as_os_str());
        tmp_path.push(TMP_SUFFIX);
        PathBuf::from(tmp_path)
    }
}

/// Write `contents` to `tmp_path`, sync it, and rename it over `path`
fn replace_file(tmp_path: &Path, path: &Path, contents: &[u8]) -> Result<(), String> {
    let mut file = File::create(tmp_path).map_err(|e| e.to_string())?;
    file.write_all(contents).map_err(|e| e.to_string())?;
    file.sync_all().map_err(|e| e.to_string())?;
    fs::rename(tmp_path, path).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, fs};

    use alloy::primitives::{address, Address};

    use super::Ledger;
    use crate::{errors::ScriptError, test_helpers::ScratchDir};

    #[test]
    fn test_missing_file_is_empty() {
        let dir = ScratchDir::new();
        let ledger = Ledger::load(dir.join("deployments.json")).unwrap();
        assert_eq!(ledger.iter().count(), 0);
        assert_eq!(ledger.get("Token"), None);
    }

    #[test]
    fn test_unparseable_file_is_corrupt() {
        let dir = ScratchDir::new();
        let path = dir.join("deployments.json");
        fs::write(&path, "{ not json").unwrap();

        let res = Ledger::load(&path);
        assert!(matches!(res, Err(ScriptError::CorruptLedger { .. })));
    }

    #[test]
    fn test_invalid_address_is_corrupt() {
        let dir = ScratchDir::new();
        let path = dir.join("deployments.json");
        fs::write(&path, r#"{"Token": "0x1234"}"#).unwrap();

        let res = Ledger::load(&path);
        assert!(matches!(res, Err(ScriptError::CorruptLedger { .. })));
    }

    #[test]
    fn test_empty_and_null_entries_are_not_deployed() {
        let dir = ScratchDir::new();
        let path = dir.join("deployments.json");
        fs::write(&path, r#"{"Token": "", "Staking": null}"#).unwrap();

        let ledger = Ledger::load(&path).unwrap();
        assert_eq!(ledger.get("Token"), None);
        assert_eq!(ledger.get("Staking"), None);
    }

    #[test]
    fn test_put_persists() {
        let dir = ScratchDir::new();
        let path = dir.join("deployments.json");
        let addr = address!("00000000000000000000000000000000000000aa");

        let mut ledger = Ledger::load(&path).unwrap();
        ledger.put("Token", addr).unwrap();

        let reloaded = Ledger::load(&path).unwrap();
        assert_eq!(reloaded.get("Token"), Some(addr));
        assert!(!ledger.tmp_path().exists());
    }

    #[test]
    fn test_put_keeps_other_keys() {
        let dir = ScratchDir::new();
        let path = dir.join("deployments.json");
        fs::write(
            &path,
            r#"{"Token": "0x00000000000000000000000000000000000000aa", "Old": ""}"#,
        )
        .unwrap();

        let mut ledger = Ledger::load(&path).unwrap();
        ledger.put("Staking", Address::repeat_byte(0xbb)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "{\n \"Old\": \"\",\n \"Staking\": \"0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\",\n \
             \"Token\": \"0x00000000000000000000000000000000000000aa\"\n}"
        );
    }

    #[test]
    fn test_failed_write_reports_address() {
        let dir = ScratchDir::new();
        let path = dir.join("missing-dir").join("deployments.json");
        let addr = Address::repeat_byte(0xcc);

        let mut ledger = Ledger::load(&path).unwrap();
        let err = ledger.put("Token", addr).unwrap_err();

        assert!(matches!(err, ScriptError::PersistLedger { address, .. } if address == addr));
        assert!(err.to_string().contains(&format!("{addr:#x}")));
    }

    #[test]
    fn test_failed_rename_removes_scratch_file() {
        let dir = ScratchDir::new();
        // A directory cannot be replaced by a file, so the final rename fails
        let path = dir.join("deployments.json");
        fs::create_dir(&path).unwrap();

        let mut ledger = Ledger {
            path,
            records: BTreeMap::new(),
        };
        let err = ledger.put("Token", Address::repeat_byte(0xcc)).unwrap_err();

        assert!(matches!(err, ScriptError::PersistLedger { .. }));
        assert!(!ledger.tmp_path().exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
