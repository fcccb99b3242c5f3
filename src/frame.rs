//! Latest-frame hand-off between a frame source and the recognition cycle.

use chrono::{DateTime, Local};
use image::RgbImage;
use log::debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct Frame {
    pub seq: u64,
    pub captured_at: DateTime<Local>,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(seq: u64, image: RgbImage) -> Self {
        Frame {
            seq,
            captured_at: Local::now(),
            image,
        }
    }
}

/// Single-slot buffer holding the most recent frame.
///
/// Frames are complete before they are published and are swapped in as a
/// whole `Arc`, so `current()` never sees a frame that is still being
/// written. Superseded frames are dropped once their last reader is done.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    slot: Mutex<Option<Arc<Frame>>>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, frame: Frame) {
        let frame = Arc::new(frame);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(frame);
    }

    pub fn current(&self) -> Option<Arc<Frame>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

/// Push side of a [`FrameBuffer`], handed to a frame source.
///
/// Once disconnected every push is ignored, so a source that is still
/// winding down cannot touch the buffer.
#[derive(Debug, Clone)]
pub struct FrameSink {
    buffer: Arc<FrameBuffer>,
    connected: Arc<AtomicBool>,
    next_seq: Arc<AtomicU64>,
}

impl FrameSink {
    pub fn new(buffer: Arc<FrameBuffer>) -> Self {
        FrameSink {
            buffer,
            connected: Arc::new(AtomicBool::new(true)),
            next_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Returns false if the sink has been disconnected.
    pub fn push(&self, image: RgbImage) -> bool {
        if !self.is_connected() {
            debug!("Dropping frame pushed after disconnect");
            return false;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.buffer.store(Frame::new(seq, image));
        true
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn frames_pushed(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::thread;

    fn uniform(seq: u64) -> Frame {
        let value = (seq % 256) as u8;
        Frame::new(seq, RgbImage::from_pixel(32, 24, Rgb([value, value, value])))
    }

    #[test]
    fn current_is_empty_until_stored() {
        let buffer = FrameBuffer::new();
        assert!(buffer.current().is_none());
        buffer.store(uniform(1));
        buffer.store(uniform(2));
        assert_eq!(buffer.current().map(|f| f.seq), Some(2));
        buffer.clear();
        assert!(buffer.current().is_none());
    }

    #[test]
    fn concurrent_reads_never_see_torn_frames() {
        let buffer = Arc::new(FrameBuffer::new());

        let writer = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                for seq in 0..1000 {
                    buffer.store(uniform(seq));
                }
            })
        };
        let reader = {
            let buffer = buffer.clone();
            thread::spawn(move || {
                let mut seen = 0;
                for _ in 0..1000 {
                    if let Some(frame) = buffer.current() {
                        let expected = (frame.seq % 256) as u8;
                        assert!(frame.image.pixels().all(|p| p.0 == [expected; 3]));
                        seen += 1;
                    }
                }
                seen
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(buffer.current().map(|f| f.seq), Some(999));
    }

    #[test]
    fn disconnected_sink_drops_frames() {
        let buffer = Arc::new(FrameBuffer::new());
        let sink = FrameSink::new(buffer.clone());

        assert!(sink.push(RgbImage::new(4, 4)));
        assert_eq!(sink.frames_pushed(), 1);

        sink.clone().disconnect();
        assert!(!sink.push(RgbImage::new(4, 4)));
        assert_eq!(buffer.current().map(|f| f.seq), Some(1));
    }
}
