//! Compiled contract artifacts.
//!
//! Handles both layouts the contracts may be built with:
//! - Foundry: `<dir>/<Name>.sol/<Name>.json` with `bytecode.object`
//! - Hardhat: `<dir>/**/<Name>.sol/<Name>.json` with `bytecode` as a string

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::HarnessError;

#[derive(Deserialize)]
struct ArtifactFile {
    #[serde(default)]
    abi: Vec<AbiItem>,
    bytecode: Bytecode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Bytecode {
    Foundry { object: String },
    Hardhat(String),
}

#[derive(Deserialize)]
struct AbiItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    inputs: Vec<AbiParam>,
}

#[derive(Deserialize)]
struct AbiParam {
    #[serde(rename = "type")]
    kind: String,
}

/// Creation bytecode plus the constructor's parameter types.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub bytecode: Vec<u8>,
    pub constructor_inputs: Vec<String>,
}

impl Artifact {
    pub fn load(dir: &Path, name: &str) -> Result<Self, HarnessError> {
        let path = find_artifact(dir, name)?;
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| HarnessError::Artifact(format!("reading {}: {e}", path.display())))?;
        Self::parse(name, &raw)
    }

    pub fn parse(name: &str, raw: &str) -> Result<Self, HarnessError> {
        let file: ArtifactFile = serde_json::from_str(raw)?;

        let bytecode_hex = match &file.bytecode {
            Bytecode::Foundry { object } => object.as_str(),
            Bytecode::Hardhat(hex) => hex.as_str(),
        };
        let bytecode_hex = bytecode_hex.strip_prefix("0x").unwrap_or(bytecode_hex);
        if bytecode_hex.is_empty() {
            return Err(HarnessError::Artifact(format!(
                "{name}: empty bytecode (abstract contract or interface?)"
            )));
        }
        let bytecode = hex::decode(bytecode_hex)
            .map_err(|e| HarnessError::Artifact(format!("{name}: invalid bytecode hex: {e}")))?;

        let constructor_inputs = file
            .abi
            .into_iter()
            .find(|item| item.kind == "constructor")
            .map(|ctor| ctor.inputs.into_iter().map(|input| input.kind).collect())
            .unwrap_or_default();

        Ok(Self {
            name: name.to_string(),
            bytecode,
            constructor_inputs,
        })
    }

    /// Reject an argument list that does not match the constructor arity.
    pub fn check_arity(&self, argument_count: usize) -> Result<(), HarnessError> {
        if self.constructor_inputs.len() != argument_count {
            return Err(HarnessError::ParameterMismatch {
                contract: self.name.clone(),
                expected: self.constructor_inputs.len(),
                actual: argument_count,
            });
        }
        Ok(())
    }

    /// Creation code with ABI-encoded constructor arguments appended.
    pub fn deploy_data(&self, constructor_args: &[u8]) -> Vec<u8> {
        let mut data = self.bytecode.clone();
        data.extend_from_slice(constructor_args);
        data
    }
}

fn find_artifact(dir: &Path, name: &str) -> Result<PathBuf, HarnessError> {
    let file = format!("{name}.json");
    let sol_dir = format!("{name}.sol");

    let direct = dir.join(&sol_dir).join(&file);
    if direct.exists() {
        return Ok(direct);
    }

    search(dir, &sol_dir, &file)?.ok_or_else(|| {
        HarnessError::Artifact(format!(
            "cannot find artifact for {name} in {}; compile the contracts first",
            dir.display()
        ))
    })
}

fn search(dir: &Path, sol_dir: &str, file: &str) -> Result<Option<PathBuf>, HarnessError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(HarnessError::Artifact(format!("reading {}: {e}", dir.display()))),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path.file_name().is_some_and(|n| n == sol_dir) && path.join(file).exists() {
            return Ok(Some(path.join(file)));
        }
        if let Some(found) = search(&path, sol_dir, file)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDHAT_ARTIFACT: &str = r#"{
        "contractName": "VaultStorage",
        "abi": [
            {"type": "constructor", "inputs": [
                {"name": "_cap", "type": "uint256"},
                {"name": "_governance", "type": "address"}
            ]},
            {"type": "function", "name": "governance", "inputs": []}
        ],
        "bytecode": "0x6080"
    }"#;

    const FOUNDRY_ARTIFACT: &str = r#"{
        "abi": [],
        "bytecode": {"object": "0x60806040"}
    }"#;

    #[test]
    fn test_parse_hardhat_layout() {
        let artifact = Artifact::parse("VaultStorage", HARDHAT_ARTIFACT).unwrap();
        assert_eq!(artifact.bytecode, vec![0x60, 0x80]);
        assert_eq!(artifact.constructor_inputs, vec!["uint256", "address"]);
        assert!(artifact.check_arity(2).is_ok());
        assert!(matches!(
            artifact.check_arity(3),
            Err(HarnessError::ParameterMismatch { expected: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn test_parse_foundry_layout() {
        let artifact = Artifact::parse("Vault", FOUNDRY_ARTIFACT).unwrap();
        assert_eq!(artifact.bytecode, vec![0x60, 0x80, 0x60, 0x40]);
        assert!(artifact.constructor_inputs.is_empty());
        assert_eq!(artifact.deploy_data(&[0xaa]), vec![0x60, 0x80, 0x60, 0x40, 0xaa]);
    }

    #[test]
    fn test_empty_bytecode_rejected() {
        let err = Artifact::parse("IVault", r#"{"abi": [], "bytecode": "0x"}"#).unwrap_err();
        assert!(matches!(err, HarnessError::Artifact(_)));
    }

    #[test]
    fn test_load_finds_nested_hardhat_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("contracts").join("core").join("VaultStorage.sol");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("VaultStorage.json"), HARDHAT_ARTIFACT).unwrap();

        let artifact = Artifact::load(dir.path(), "VaultStorage").unwrap();
        assert_eq!(artifact.name, "VaultStorage");
        assert_eq!(artifact.constructor_inputs.len(), 2);
    }

    #[test]
    fn test_load_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = Artifact::load(dir.path(), "Vault").unwrap_err();
        assert!(err.to_string().contains("cannot find artifact for Vault"));
    }
}
