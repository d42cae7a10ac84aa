use std::fs;
use std::io::Write;
use std::path::Path;

use crate::domain::{Flow, MAX_IMPORT_BYTES, PoseCatalog, ShareCodec};

const FLOW_EXTENSIONS: [&str; 2] = ["flow", "json"];

/// Flow documents and practice sheets on disk.
pub struct FileRepository;

impl FileRepository {
    pub fn export_flow(flow: &Flow, filename: &str) -> Result<String, String> {
        match ShareCodec::to_json(flow) {
            Ok(json) => match fs::write(filename, &json) {
                Ok(_) => Ok(filename.to_string()),
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(format!("Serialization failed: {}", e)),
        }
    }

    pub fn import_flow(filename: &str, catalog: &PoseCatalog) -> Result<Flow, String> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        if !extension.is_some_and(|ext| FLOW_EXTENSIONS.contains(&ext.as_str())) {
            return Err("Only .flow and .json files can be imported".to_string());
        }

        let size = fs::metadata(filename).map_err(|e| e.to_string())?.len();
        if size > MAX_IMPORT_BYTES as u64 {
            return Err(format!(
                "File is {} bytes, limit is {}",
                size, MAX_IMPORT_BYTES
            ));
        }

        match fs::read_to_string(filename) {
            Ok(content) => ShareCodec::from_json(&content, catalog).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn export_csv(flow: &Flow, filename: &str) -> Result<String, String> {
        let file = fs::File::create(filename).map_err(|e| e.to_string())?;
        match Self::write_csv(flow, file) {
            Ok(_) => Ok(filename.to_string()),
            Err(e) => Err(format!("CSV export failed: {}", e)),
        }
    }

    /// One row per pose in flow order, with the owning section's name.
    pub fn write_csv<W: Write>(flow: &Flow, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(["position", "name", "sanskrit", "side", "duration", "section"])?;
        for (position, pose) in flow.poses().iter().enumerate() {
            let section = flow.section_of(position).map(|s| s.name.as_str()).unwrap_or("");
            writer.write_record([
                (position + 1).to_string().as_str(),
                pose.name.as_str(),
                pose.sanskrit.as_str(),
                pose.side.label(),
                pose.duration.to_string().as_str(),
                section,
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}
