use crate::config::Config;
use crate::frame::Frame;
use crate::types::{PlateCandidate, PlateRegion};
use image::ImageFormat;
use log::{debug, warn};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use uuid::Uuid;

/// Plate recognizer. Calls may block for a long time; the recognition cycle
/// runs them on the blocking pool.
pub trait Recognizer: Send + Sync {
    /// Candidates for each detected plate, at most `top_n` per plate.
    fn recognize(&self, frame: &Frame, top_n: usize) -> Result<Vec<PlateRegion>, failure::Error>;

    /// Confirms the recognizer can run at all. Called once before capture.
    fn check(&self) -> Result<(), failure::Error> {
        Ok(())
    }
}

/// Runs the OpenALPR command line tool on each frame.
#[derive(Debug, Clone)]
pub struct AlprCli {
    binary: String,
    country: String,
    config: Option<PathBuf>,
    scratch_dir: PathBuf,
}

impl AlprCli {
    pub fn new(binary: &str, country: &str, config: Option<PathBuf>) -> Self {
        AlprCli {
            binary: binary.to_string(),
            country: country.to_string(),
            config,
            scratch_dir: env::temp_dir(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.alpr_binary,
            &config.alpr_country,
            config.alpr_config.clone(),
        )
    }

    fn command(&self, top_n: usize, image: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("-j")
            .arg("-n")
            .arg(top_n.to_string())
            .arg("-c")
            .arg(&self.country);
        if let Some(config) = &self.config {
            command.arg("--config").arg(config);
        }
        command.arg(image);
        command
    }
}

impl Recognizer for AlprCli {
    fn recognize(&self, frame: &Frame, top_n: usize) -> Result<Vec<PlateRegion>, failure::Error> {
        let path = self
            .scratch_dir
            .join(format!("{}.jpeg", Uuid::new_v4().simple()));
        frame.image.save_with_format(&path, ImageFormat::Jpeg)?;
        let output = self.command(top_n, &path).output();
        if let Err(e) = fs::remove_file(&path) {
            warn!("Unable to remove scratch frame {:?}: {}", path, e);
        }

        let output = output?;
        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let regions = parse_results(&output.stdout)?;
        debug!("Frame {}: {} plate regions", frame.seq, regions.len());
        Ok(regions)
    }

    fn check(&self) -> Result<(), failure::Error> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| format_err!("Unable to run {}: {}", self.binary, e))?;
        if !output.status.success() {
            bail!("{} --version exited with {}", self.binary, output.status);
        }
        Ok(())
    }
}

/// Parses `alpr -j` output into plate regions.
pub fn parse_results(json: &[u8]) -> Result<Vec<PlateRegion>, failure::Error> {
    let json: Value = serde_json::from_slice(json)?;
    let results = json["results"]
        .as_array()
        .ok_or_else(|| format_err!("Missing results in recognizer output"))?;

    results
        .iter()
        .enumerate()
        .map(|(region_id, result)| {
            let candidates = result["candidates"]
                .as_array()
                .ok_or_else(|| format_err!("Missing candidates for region {}", region_id))?
                .iter()
                .enumerate()
                .map(|(rank, candidate)| {
                    Ok(PlateCandidate {
                        characters: candidate["plate"]
                            .as_str()
                            .ok_or_else(|| format_err!("Missing plate field"))?
                            .to_ascii_uppercase(),
                        confidence: candidate["confidence"]
                            .as_f64()
                            .ok_or_else(|| format_err!("Missing confidence field"))?
                            as f32,
                        rank,
                    })
                })
                .collect::<Result<Vec<_>, failure::Error>>()?;
            Ok(PlateRegion {
                region_id,
                candidates,
            })
        })
        .collect()
}
