// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Clip loading and caching.
//!
//! Clips are decoded entirely into memory and converted to the format of the output
//! they will be played on, so the output callback only has to copy samples.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::decode::decode_file;
use super::PlaybackError;

/// Default number of clips kept in memory.
pub const DEFAULT_CACHE_ENTRIES: usize = 32;

/// A clip ready for playback. The sample data is shared between every player that
/// plays it.
#[derive(Clone)]
pub struct LoadedClip {
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
}

impl LoadedClip {
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> LoadedClip {
        LoadedClip {
            data: Arc::new(data),
            channel_count,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> u64 {
        (self.data.len() / self.channel_count.max(1) as usize) as u64
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate.max(1) as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// The cache key: the same file converted for two different outputs is two entries.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ClipKey {
    path: PathBuf,
    sample_rate: u32,
    channel_count: u16,
}

/// Loads clips and keeps the most recently loaded ones in memory.
pub struct ClipLoader {
    cache: HashMap<ClipKey, LoadedClip>,
    /// Insertion order, oldest first.
    order: VecDeque<ClipKey>,
    max_entries: usize,
}

impl ClipLoader {
    /// Creates a new clip loader holding at most `max_entries` clips.
    pub fn new(max_entries: usize) -> ClipLoader {
        ClipLoader {
            cache: HashMap::new(),
            order: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Loads a clip converted to the given output format. Returns a cached version if
    /// already loaded.
    pub fn load(
        &mut self,
        path: &Path,
        sample_rate: u32,
        channel_count: u16,
    ) -> Result<LoadedClip, PlaybackError> {
        let key = ClipKey {
            path: path.to_path_buf(),
            sample_rate,
            channel_count,
        };
        if let Some(clip) = self.cache.get(&key) {
            debug!(path = ?path, "Using cached clip");
            return Ok(clip.clone());
        }

        info!(path = ?path, "Loading clip into memory");
        let decoded = decode_file(path)?;

        let samples = if decoded.sample_rate != sample_rate {
            debug!(
                source_rate = decoded.sample_rate,
                target_rate = sample_rate,
                "Transcoding clip"
            );
            transcode_samples(
                &decoded.samples,
                decoded.channels,
                decoded.sample_rate,
                sample_rate,
            )
        } else {
            decoded.samples
        };
        let samples = remap_channels(&samples, decoded.channels, channel_count);

        let clip = LoadedClip::new(samples, channel_count, sample_rate);
        info!(
            path = ?path,
            channels = channel_count,
            sample_rate,
            duration_ms = clip.duration().as_millis(),
            memory_kb = clip.memory_size() / 1024,
            "Clip loaded"
        );

        self.insert(key, clip.clone());
        Ok(clip)
    }

    /// Number of cached clips.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Returns the total memory used by cached clips.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|c| c.memory_size()).sum()
    }

    fn insert(&mut self, key: ClipKey, clip: LoadedClip) {
        while self.cache.len() >= self.max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.cache.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.cache.insert(key, clip);
    }
}

impl Default for ClipLoader {
    fn default() -> Self {
        ClipLoader::new(DEFAULT_CACHE_ENTRIES)
    }
}

impl std::fmt::Debug for ClipLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipLoader")
            .field("cached_clips", &self.cache.len())
            .field("max_entries", &self.max_entries)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Transcodes samples from one sample rate to another using linear interpolation.
/// Good enough for short one-shot clips.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count.max(1) as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);
    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let s0 = samples
                .get(source_frame * channels + channel)
                .copied()
                .unwrap_or(0.0);
            let s1 = samples
                .get((source_frame + 1) * channels + channel)
                .copied()
                .unwrap_or(s0);
            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

/// Converts interleaved samples between channel layouts. Mono is spread to every
/// output channel, anything going to mono is averaged, and otherwise channels are
/// matched by index with silence for the extras.
fn remap_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let from = from as usize;
    let to = to as usize;
    let frames = samples.len() / from;
    let mut output = Vec::with_capacity(frames * to);

    for frame in samples.chunks_exact(from) {
        if from == 1 {
            output.extend(std::iter::repeat(frame[0]).take(to));
        } else if to == 1 {
            output.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            for channel in 0..to {
                output.push(frame.get(channel).copied().unwrap_or(0.0));
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use crate::testutil::write_wav;

    use super::*;

    #[test]
    fn test_transcode_samples() {
        // Simple mono sine wave at 44100Hz
        let source_rate = 44100;
        let target_rate = 48000;
        let source_samples: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / source_rate as f32).sin())
            .collect();

        let result = transcode_samples(&source_samples, 1, source_rate, target_rate);

        let expected_len = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(result.len(), expected_len);
    }

    #[test]
    fn test_transcode_stereo() {
        let source_samples = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];

        let result = transcode_samples(&source_samples, 2, 44100, 48000);

        assert!(result.len() >= 8);
        assert!((result[0] - 1.0).abs() < 0.1);
        assert!((result[1] - (-1.0)).abs() < 0.1);
    }

    #[test]
    fn test_remap_channels() {
        assert_eq!(vec![0.5, 0.5, -0.5, -0.5], remap_channels(&[0.5, -0.5], 1, 2));
        assert_eq!(vec![0.0, 1.0], remap_channels(&[1.0, -1.0, 1.0, 1.0], 2, 1));
        assert_eq!(
            vec![1.0, 2.0, 0.0, 3.0, 4.0, 0.0],
            remap_channels(&[1.0, 2.0, 3.0, 4.0], 2, 3)
        );
        assert_eq!(
            vec![1.0, 2.0, 4.0, 5.0],
            remap_channels(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2)
        );
    }

    #[test]
    fn test_load_converts_and_caches() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("mono.wav");
        write_wav(&path, &[vec![0.25f32; 22050]], 22050)?;

        let mut loader = ClipLoader::new(4);
        let clip = loader.load(&path, 44100, 2)?;
        assert_eq!(2, clip.channel_count());
        assert_eq!(44100, clip.sample_rate());
        assert_eq!(44100, clip.frames());
        assert_eq!(1, clip.duration().as_secs());
        assert_eq!(1, loader.len());

        // Same file, same output format: served from the cache.
        let again = loader.load(&path, 44100, 2)?;
        assert!(Arc::ptr_eq(&clip.data, &again.data));
        assert_eq!(1, loader.len());

        // A different output format is a separate entry.
        loader.load(&path, 22050, 1)?;
        assert_eq!(2, loader.len());
        Ok(())
    }

    #[test]
    fn test_cache_evicts_oldest() -> Result<(), Box<dyn Error>> {
        let tempdir = tempfile::tempdir()?;
        let mut paths = Vec::new();
        for i in 0..3 {
            let path = tempdir.path().join(format!("{}.wav", i));
            write_wav(&path, &[vec![0.1f32; 64]], 44100)?;
            paths.push(path);
        }

        let mut loader = ClipLoader::new(2);
        let first = loader.load(&paths[0], 44100, 1)?;
        loader.load(&paths[1], 44100, 1)?;
        loader.load(&paths[2], 44100, 1)?;
        assert_eq!(2, loader.len());

        // The first clip was evicted, so loading it again decodes a fresh copy.
        let reloaded = loader.load(&paths[0], 44100, 1)?;
        assert!(!Arc::ptr_eq(&first.data, &reloaded.data));
        Ok(())
    }

    #[test]
    fn test_load_unsupported() {
        let mut loader = ClipLoader::default();
        assert!(matches!(
            loader.load(Path::new("/no/such/clip.mp3"), 44100, 2),
            Err(PlaybackError::UnsupportedSource { .. })
        ));
        assert!(loader.is_empty());
    }
}
