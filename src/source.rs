//! Frame sources. Each one pushes decoded frames into a [`FrameSink`] from
//! its own task, at its own rate.

use crate::config::period_for;
use crate::error::SessionError;
use crate::frame::FrameSink;
use image::{ImageFormat, RgbImage};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use url::Url;

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);

pub trait FrameSource: Send {
    fn describe(&self) -> String;

    /// Begins pushing frames. Errors here mean the source cannot be used.
    fn start(&mut self, sink: FrameSink) -> Result<(), failure::Error>;

    /// Stops pushing frames and releases the underlying device or stream.
    fn stop(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Directory(PathBuf),
    Snapshot(Url),
}

impl SourceSpec {
    /// `http(s)://` addresses are camera snapshot URLs; bare paths are
    /// directories of stills. Any other URL scheme is unsupported.
    pub fn parse(address: &str) -> Result<Self, SessionError> {
        match Url::parse(address) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(SourceSpec::Snapshot(url)),
                "file" => url
                    .to_file_path()
                    .map(SourceSpec::Directory)
                    .map_err(|_| SessionError::UnsupportedSource(address.to_string())),
                _ => Err(SessionError::UnsupportedSource(address.to_string())),
            },
            Err(_) => Ok(SourceSpec::Directory(PathBuf::from(address))),
        }
    }

    pub fn open(self, fps: u32) -> Result<Box<dyn FrameSource>, failure::Error> {
        let period = period_for(fps);
        let source: Box<dyn FrameSource> = match self {
            SourceSpec::Directory(dir) => Box::new(DirectorySource::new(dir, period)),
            SourceSpec::Snapshot(url) => Box::new(SnapshotSource::new(url, period)?),
        };
        Ok(source)
    }
}

/// Replays the JPEG and PNG files of a directory in name order, looping.
pub struct DirectorySource {
    dir: PathBuf,
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl DirectorySource {
    pub fn new(dir: PathBuf, period: Duration) -> Self {
        DirectorySource {
            dir,
            period,
            task: None,
        }
    }
}

impl FrameSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }

    fn start(&mut self, sink: FrameSink) -> Result<(), failure::Error> {
        if self.task.is_some() {
            bail!("{} is already started", self.describe());
        }
        let files = list_images(&self.dir)?;
        if files.is_empty() {
            bail!("No JPEG or PNG files in {}", self.dir.display());
        }
        info!("Replaying {} stills from {}", files.len(), self.dir.display());

        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            for path in files.iter().cycle() {
                ticker.tick().await;
                match load_image(path).await {
                    Ok(image) => {
                        if !sink.push(image) {
                            break;
                        }
                    }
                    Err(e) => warn!("Skipping unreadable frame {:?}: {}", path, e),
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Polls a camera's still-image endpoint.
pub struct SnapshotSource {
    url: Url,
    period: Duration,
    client: reqwest::Client,
    task: Option<JoinHandle<()>>,
}

impl SnapshotSource {
    pub fn new(url: Url, period: Duration) -> Result<Self, failure::Error> {
        let client = reqwest::Client::builder()
            .timeout(SNAPSHOT_TIMEOUT)
            .build()?;
        Ok(SnapshotSource {
            url,
            period,
            client,
            task: None,
        })
    }
}

impl FrameSource for SnapshotSource {
    fn describe(&self) -> String {
        format!("snapshot {}", self.url)
    }

    fn start(&mut self, sink: FrameSink) -> Result<(), failure::Error> {
        if self.task.is_some() {
            bail!("{} is already started", self.describe());
        }
        let url = self.url.clone();
        let client = self.client.clone();
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match fetch_snapshot(&client, &url).await {
                    Ok(image) => {
                        if !sink.push(image) {
                            break;
                        }
                    }
                    Err(e) => warn!("Snapshot from {} failed: {}", url, e),
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, failure::Error> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(ImageFormat::from_extension)
            .map(|format| format == ImageFormat::Jpeg || format == ImageFormat::Png)
            .unwrap_or(false);
        if path.is_file() && is_image {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn load_image(path: &Path) -> Result<RgbImage, failure::Error> {
    let data = tokio::fs::read(path).await?;
    Ok(image::load_from_memory(&data)?.to_rgb8())
}

async fn fetch_snapshot(client: &reqwest::Client, url: &Url) -> Result<RgbImage, failure::Error> {
    let data = client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    Ok(image::load_from_memory(&data)?.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuffer;
    use image::Rgb;
    use std::sync::Arc;

    #[test]
    fn parses_source_addresses() {
        assert_eq!(
            SourceSpec::parse("frames").unwrap(),
            SourceSpec::Directory(PathBuf::from("frames"))
        );
        assert_eq!(
            SourceSpec::parse("/var/lib/plates/frames").unwrap(),
            SourceSpec::Directory(PathBuf::from("/var/lib/plates/frames"))
        );
        assert!(matches!(
            SourceSpec::parse("http://192.168.0.24/snapshot.jpg").unwrap(),
            SourceSpec::Snapshot(_)
        ));
        assert!(SourceSpec::parse("rtsp://192.168.0.24").is_err());
    }

    #[tokio::test]
    async fn empty_directory_cannot_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DirectorySource::new(dir.path().to_path_buf(), Duration::from_millis(10));
        let sink = FrameSink::new(Arc::new(FrameBuffer::new()));
        assert!(source.start(sink).is_err());
    }

    #[tokio::test]
    async fn directory_source_pushes_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in &[("a.png", 10u8), ("b.png", 20u8)] {
            RgbImage::from_pixel(8, 8, Rgb([*value; 3]))
                .save(dir.path().join(name))
                .unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let buffer = Arc::new(FrameBuffer::new());
        let sink = FrameSink::new(buffer.clone());
        let mut source = DirectorySource::new(dir.path().to_path_buf(), Duration::from_millis(5));
        source.start(sink.clone()).unwrap();
        assert!(source.start(sink.clone()).is_err());

        for _ in 0..200 {
            if sink.frames_pushed() >= 3 {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        source.stop();
        assert!(sink.frames_pushed() >= 3);
        let frame = buffer.current().unwrap();
        assert_eq!(frame.image.dimensions(), (8, 8));
    }
}
