//! Report rendering.

use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::AppResult;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// Write `value` followed by a newline.
pub fn write<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T, format: OutputFormat) -> AppResult<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, value)?;
            writeln!(out)?;
        }
        OutputFormat::Yaml => {
            // serde_yaml already terminates the document with a newline.
            out.write_all(serde_yaml::to_string(value)?.as_bytes())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcon_vsphere::types::{Snapshot, VirtualMachineConfiguration, VirtualMachineInfo};

    fn info() -> VirtualMachineInfo {
        VirtualMachineInfo {
            configuration: VirtualMachineConfiguration {
                cpus: Some(2),
                memory: Some(4096),
                network: Some("VM Network".into()),
            },
            ips: vec!["10.0.0.5".into()],
            is_running: true,
            path: "Folder/VM1".into(),
            reference: "vm-42".into(),
        }
    }

    #[test]
    fn json_uses_report_field_names() {
        let mut out = Vec::new();
        write(&mut out, &info(), OutputFormat::Json).unwrap();
        let text = String::from_utf8(out).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["ref"], "vm-42");
        assert_eq!(parsed["isRunning"], true);
        assert_eq!(parsed["configuration"]["memory"], 4096);
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn yaml_output() {
        let snapshots = vec![Snapshot {
            name: "base".into(),
            reference: "snapshot-1".into(),
            children: vec![],
        }];
        let mut out = Vec::new();
        write(&mut out, &snapshots, OutputFormat::Yaml).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("name: base"));
        assert!(text.contains("ref: snapshot-1"));
    }
}
