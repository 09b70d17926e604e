use std::{fmt::Debug, io::BufReader, path::PathBuf};

use anyhow::{bail, Context};
use fs_err::File;
use hashbrown::HashSet;
use ingredient_scraping_utils::fs_json_util::replace_json_pretty;
use log::{info, warn};

use crate::schema::{IngredientRecord, IngredientRecordRaw};

/// Loads the dataset, or an empty one if the file does not exist yet.
///
/// Legacy rows with a repairable violation are fixed and reported;
/// anything else that fails to parse is an error.
pub fn load_or_create<P: Into<PathBuf> + Debug>(path: P) -> anyhow::Result<Vec<IngredientRecord>> {
    let path = path.into();
    let rows: Vec<IngredientRecordRaw> = match File::open(&path) {
        Ok(file) => serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("While trying to parse {path:?} as the dataset"))?,
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => {
                info!("{path:?} was not found.");
                info!("We will start from an empty dataset and save it there.");
                return Ok(vec![]);
            }
            _ => bail!("Unexpected I/O Error: {:?}", e),
        },
    };

    let mut ids = HashSet::new();
    let mut records = Vec::with_capacity(rows.len());
    for mut row in rows {
        for repaired in row.repair() {
            warn!("Repaired a legacy row: {repaired}");
        }
        if !ids.insert(row.id.clone()) {
            bail!("Duplicating id in {path:?}: {}", row.id);
        }
        records.push(IngredientRecord::try_from(row).with_context(|| format!("In {path:?}"))?);
    }
    info!("Successfully loaded {} records from {:?}.", records.len(), &path);
    Ok(records)
}

pub fn save<P: Into<PathBuf> + Debug>(path: P, records: &[IngredientRecord]) -> anyhow::Result<()> {
    let path = path.into();
    if let Some(parent) = path.parent().filter(|x| !x.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    replace_json_pretty(&path, &records)?;
    info!("Successfully saved {} records to {:?}.", records.len(), &path);
    Ok(())
}
