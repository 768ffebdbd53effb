use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One persisted block: its name, whether it replayed a prior block's
/// raw data (`mock_previous`), and every named dataset recorded during
/// it (`raw_data`, `signals_data`, `timestamp_data`, `reward_data`,
/// `mark_data`, `choice_data`, `answer_data`, `probe_data`, `cue_data`,
/// `posner_stim_data`, `posner_stim_time`, `response_data`,
/// `chunk_data`, `raw_other_data`, ...).
pub struct BlockRecord {
    pub name: String,
    pub mock_previous: Option<usize>,
    /// Free-form scalar bookkeeping recorded alongside the block's
    /// datasets (percent score, eye-movement median, Posner valid/invalid
    /// trial counts, ...) — anything that boils down to one value per
    /// block rather than one value per sample.
    pub attrs: HashMap<String, String>,
    pub datasets: HashMap<String, Vec<f64>>,
}

#[derive(Serialize, Deserialize)]
struct BlockAttributes {
    name: String,
    mock_previous: Option<usize>,
    #[serde(default)]
    attrs: HashMap<String, String>,
    datasets: HashMap<String, usize>,
}

/// Grouped append-only binary store: one directory per session, one
/// subdirectory per block named `protocol{i}` (1-indexed; `protocol0` is
/// the initial calibration block saved before the sequence proper
/// starts), each holding its datasets as flat little-endian `f64`
/// binaries plus a small JSON attributes sidecar. Root-level files carry
/// `stream_info.xml`, `settings.xml`, the channel list, and the sample
/// rate, mirroring the file layout this lineage's experiment runner
/// writes per session.
pub struct GroupedStore {
    root: PathBuf,
}

impl GroupedStore {
    pub fn create(
        root: impl AsRef<Path>,
        channels: &[String],
        sample_rate: f64,
        stream_info_xml: &str,
        settings_xml: &str,
    ) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        fs::write(root.join("stream_info.xml"), stream_info_xml)?;
        fs::write(root.join("settings.xml"), settings_xml)?;
        let channels_json = serde_json::to_string_pretty(&channels)?;
        fs::write(root.join("channels.json"), channels_json)?;
        fs::write(root.join("fs.txt"), sample_rate.to_string())?;
        Ok(Self { root })
    }

    /// Writes block `index` (0 = initial calibration, 1.. = the
    /// sequence's blocks in order) to `protocol{index}/`.
    pub fn write_block(&self, index: usize, block: &BlockRecord) -> Result<(), StoreError> {
        let dir = self.root.join(format!("protocol{index}"));
        fs::create_dir_all(&dir)?;

        let mut shapes = HashMap::new();
        for (dataset_name, values) in &block.datasets {
            let path = dir.join(format!("{dataset_name}.bin"));
            let mut file = fs::File::create(&path)?;
            let mut bytes = Vec::with_capacity(values.len() * 8);
            for v in values {
                bytes.write_f64::<LittleEndian>(*v)?;
            }
            file.write_all(&bytes)?;
            shapes.insert(dataset_name.clone(), values.len());
        }

        let attrs = BlockAttributes {
            name: block.name.clone(),
            mock_previous: block.mock_previous,
            attrs: block.attrs.clone(),
            datasets: shapes,
        };
        let attrs_json = serde_json::to_string_pretty(&attrs)?;
        fs::write(dir.join("attributes.json"), attrs_json)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_root_level_files_and_block_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let store = GroupedStore::create(
            dir.path(),
            &["Cz".to_string(), "Pz".to_string()],
            250.0,
            "<stream/>",
            "<settings/>",
        )
        .unwrap();

        let mut datasets = HashMap::new();
        datasets.insert("raw_data".to_string(), vec![1.0, 2.0, 3.0]);
        store
            .write_block(
                1,
                &BlockRecord {
                    name: "Baseline".to_string(),
                    mock_previous: None,
                    attrs: HashMap::new(),
                    datasets,
                },
            )
            .unwrap();

        assert!(dir.path().join("protocol1/raw_data.bin").exists());
        assert!(dir.path().join("protocol1/attributes.json").exists());
        assert!(dir.path().join("stream_info.xml").exists());

        let bytes = fs::read(dir.path().join("protocol1/raw_data.bin")).unwrap();
        assert_eq!(bytes.len(), 3 * 8);
    }
}
