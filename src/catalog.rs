//! Catalogue of read commands.
//!
//! Entries are keyed by register key and hold the request payload without its checksum. The
//! catalogue renders each request ready to send, and interprets the meter's base64 reply with
//! the rule of the entry's register.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    crc,
    error::Result,
    response::{self, ParsedFrame},
    scaling::{self, DisplayValue},
    transcode,
};

/// A read request as listed in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadCommand {
    /// Register as shown to the operator.
    #[serde(default)]
    pub register: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Request payload without checksum, e.g. `"01 03 00 80 00 01"`.
    pub command: String,
    #[serde(default)]
    pub unit: String,
}

impl ReadCommand {
    /// The request including its checksum.
    pub fn frame(&self) -> Result<Vec<u8>> {
        Ok(crc::append_checksum(&transcode::parse_hex(&self.command)?))
    }

    pub fn hex(&self) -> Result<String> {
        Ok(transcode::format_hex(&self.frame()?))
    }

    pub fn base64(&self) -> Result<String> {
        Ok(transcode::to_base64(&self.frame()?))
    }
}

/// Outcome of analysing a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// The reply in canonical hex.
    pub hex: String,
    /// `None` when the frame could not be analysed automatically.
    pub frame: Option<ParsedFrame>,
    /// The value interpreted with the register's rule.
    pub value: Option<DisplayValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadCatalog {
    commands: BTreeMap<String, ReadCommand>,
}

impl ReadCatalog {
    pub fn from_json(json: &str) -> Result<Self> {
        let commands = serde_json::from_str(json)?;
        Ok(Self { commands })
    }

    pub fn try_load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load the catalogue, starting empty if the file is missing or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No read command catalogue, starting empty");
            return Self::default();
        }
        match Self::try_load(path) {
            Ok(catalog) => {
                info!(path = %path.display(), count = catalog.len(), "Loaded read commands");
                catalog
            }
            Err(err) => {
                warn!(path = %path.display(), "Failed to load read commands: {}", err);
                Self::default()
            }
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, command: ReadCommand) {
        self.commands.insert(key.into(), command);
    }

    pub fn get(&self, key: &str) -> Option<&ReadCommand> {
        self.commands.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReadCommand)> {
        self.commands.iter().map(|(key, command)| (key.as_str(), command))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Decode and interpret the base64 reply to the command filed under `key`.
    ///
    /// Replies to commands missing from the catalogue are parsed but not interpreted.
    pub fn analyze(&self, key: &str, reply: &str) -> Result<Analysis> {
        let bytes = transcode::from_base64(reply)?;
        let frame = response::parse_frame(&bytes)?;

        let value = match (&frame, self.commands.contains_key(key)) {
            (Some(ParsedFrame::Read(read)), true) => {
                Some(scaling::rule_for_key(key).decode_bytes(&read.data))
            }
            (Some(ParsedFrame::Write(write)), true) => Some(write.interpret()),
            _ => None,
        };

        Ok(Analysis {
            hex: transcode::format_hex(&bytes),
            frame,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    const CATALOG: &str = r#"{
        "128": {
            "register": "0x0080",
            "name": "Relay status",
            "description": "Relay position and fault bit",
            "command": "01 03 00 80 00 01",
            "unit": ""
        },
        "137": {
            "name": "Signal strength",
            "command": "010300890001"
        }
    }"#;

    #[test]
    fn test_command_rendering() {
        let catalog = ReadCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let relay = catalog.get("128").unwrap();
        assert_eq!(relay.hex().unwrap(), "01 03 00 80 00 01 85 E2");
        assert_eq!(
            relay.base64().unwrap(),
            transcode::hex_to_base64("01 03 00 80 00 01 85 E2").unwrap()
        );

        let keys: Vec<&str> = catalog.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["128", "137"]);
        assert_eq!(catalog.get("137").unwrap().description, "");
    }

    #[test]
    fn test_analyze_reply() {
        let mut catalog = ReadCatalog::from_json(CATALOG).unwrap();
        let reply = transcode::hex_to_base64("01 03 02 00 03 F8 45").unwrap();

        let analysis = catalog.analyze("128", &reply).unwrap();
        assert_eq!(analysis.hex, "01 03 02 00 03 F8 45");
        assert!(matches!(analysis.frame, Some(ParsedFrame::Read(_))));
        assert_eq!(analysis.value.unwrap().to_string(), "Closed (Fault)");

        // Same reply read as a signal strength.
        let analysis = catalog.analyze("137", &reply).unwrap();
        assert_eq!(analysis.value.unwrap().to_string(), "3 %");

        let off = transcode::hex_to_base64("01 03 04 00 00 0E 10 FF 9F").unwrap();
        catalog.insert(
            "167",
            ReadCommand {
                register: "167".into(),
                name: "Switch-off timer".into(),
                description: String::new(),
                command: "01 03 00 A7 00 02".into(),
                unit: "s".into(),
            },
        );
        let analysis = catalog.analyze("167", &off).unwrap();
        assert_eq!(analysis.value.unwrap().to_string(), "Off, 3600 s remaining");

        // Not in the catalogue, no interpretation.
        let analysis = catalog.analyze("999", &reply).unwrap();
        assert!(analysis.frame.is_some());
        assert_eq!(analysis.value, None);
    }

    #[test]
    fn test_analyze_unrecognised_and_bad_replies() {
        let catalog = ReadCatalog::from_json(CATALOG).unwrap();

        let echo = transcode::to_base64(&crc::append_checksum(&[0x01, 0x10, 0x00, 0xA7, 0x00, 0x02]));
        let analysis = catalog.analyze("128", &echo).unwrap();
        assert_eq!(analysis.frame, None);
        assert_eq!(analysis.value, None);

        assert!(matches!(catalog.analyze("128", "not base64!"), Err(Error::InvalidBase64(_))));
        let tampered = transcode::hex_to_base64("01 03 02 00 03 F8 46").unwrap();
        assert!(matches!(
            catalog.analyze("128", &tampered),
            Err(Error::ChecksumError { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let catalog = ReadCatalog::load(file.path());
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_load_missing_or_corrupt_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ReadCatalog::load(dir.path().join("read-commands.json")).is_empty());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{ not json").unwrap();
        assert!(ReadCatalog::load(&corrupt).is_empty());
        assert!(matches!(ReadCatalog::try_load(&corrupt), Err(Error::Json(_))));
    }

    #[test]
    fn test_insert_and_bad_command() {
        let mut catalog = ReadCatalog::default();
        catalog.insert(
            "124",
            ReadCommand {
                register: "124".into(),
                name: "Voltage".into(),
                description: String::new(),
                command: "01 03 00 7C 0".into(),
                unit: "V".into(),
            },
        );
        assert!(matches!(catalog.get("124").unwrap().hex(), Err(Error::InvalidHex(_))));
    }
}
