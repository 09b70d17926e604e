use std::{
    ffi::OsString,
    fmt::Debug,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::Context;
use fs_err::File;
use serde::{Deserialize, Serialize};

/// Writes `value` as 2-space indented JSON with a trailing newline.
///
/// The document is first written next to `path` and then renamed over it,
/// so an interrupted run leaves the previous file untouched.
pub fn replace_json_pretty<P: Into<PathBuf>, T: Serialize>(
    path: P,
    value: &T,
) -> anyhow::Result<()> {
    let path = path.into();
    let mut temp_name = path
        .file_name()
        .map(|x| x.to_owned())
        .unwrap_or_else(|| OsString::from("data"));
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    (|| {
        let mut writer = BufWriter::new(File::create(&temp_path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.write_all(b"\n")?;
        writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        fs_err::rename(&temp_path, &path)?;
        anyhow::Ok(())
    })()
    .with_context(|| format!("While trying to write {path:?}"))
}

pub fn read_toml<P: Into<PathBuf> + Debug, T: for<'de> Deserialize<'de>>(
    path: P,
) -> anyhow::Result<T> {
    let path = path.into();
    (|| toml::from_str(&fs_err::read_to_string(&path)?).map_err(anyhow::Error::new))().with_context(
        || {
            format!(
                "While trying to parse {path:?} as {}",
                std::any::type_name::<T>()
            )
        },
    )
}
