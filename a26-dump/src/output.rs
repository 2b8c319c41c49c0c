// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use anyhow::{Result, bail};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use a26_common::RomSink;

/// Writes the finished ROM image to a file.  The file isn't created until
/// the image is complete, so an aborted dump leaves nothing behind.
pub struct FileSink {
    path: PathBuf,
    overwrite: bool,
}

impl FileSink {
    pub fn new(path: PathBuf, overwrite: bool) -> Self {
        Self { path, overwrite }
    }

    /// Checks up front that the output can be written, so a long dump
    /// isn't wasted.
    pub fn check(&self) -> Result<()> {
        check_output(&self.path, self.overwrite)
    }
}

impl RomSink for FileSink {
    fn finalize(&mut self, image: &[u8]) -> io::Result<()> {
        let mut file = if self.overwrite {
            File::create(&self.path)?
        } else {
            OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.path)?
        };
        file.write_all(image)?;
        file.sync_all()
    }
}

fn check_output(path: &Path, overwrite: bool) -> Result<()> {
    if path.is_dir() {
        bail!("Output '{}' is a directory", path.display());
    }
    if !overwrite && path.exists() {
        bail!(
            "Output file '{}' already exists. Use --overwrite to overwrite.",
            path.display()
        );
    }
    Ok(())
}
