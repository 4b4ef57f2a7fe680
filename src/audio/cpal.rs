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
use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use super::clip::{ClipLoader, LoadedClip};
use super::{DeviceId, OutputDevice, PlaybackError, PlayerState};
use crate::playsync::PlaybackSignal;

/// Lists the output devices of every available host, deduplicated by name. The device
/// name doubles as the device identifier.
fn list_cpal_devices() -> Result<Vec<(OutputDevice, cpal::Device)>, PlaybackError> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout().map_err(|e| PlaybackError::Host(e.to_string()))?;
    let _shh_stderr = shh::stderr().map_err(|e| PlaybackError::Host(e.to_string()))?;

    let mut devices: Vec<(OutputDevice, cpal::Device)> = Vec::new();
    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(host) => host,
            Err(e) => {
                error!(err = e.to_string(), host = host_id.name(), "Unable to open host");
                continue;
            }
        };
        let host_devices = match host.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            #[allow(deprecated)]
            let name = match device.name() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if devices.iter().any(|(known, _)| known.id().as_str() == name) {
                continue;
            }
            devices.push((
                OutputDevice::new(name.clone(), DeviceId::new(name)),
                device,
            ));
        }
    }

    devices.sort_by(|(a, _), (b, _)| a.display_name().cmp(b.display_name()));
    Ok(devices)
}

/// Finds the cpal device with the given identifier.
fn find_device(id: &DeviceId) -> Result<cpal::Device, PlaybackError> {
    list_cpal_devices()?
        .into_iter()
        .find(|(device, _)| device.id().as_str().trim() == id.as_str().trim())
        .map(|(_, device)| device)
        .ok_or_else(|| PlaybackError::DeviceNotFound(id.to_string()))
}

/// Real audio output through cpal. Clips are decoded once and shared between every
/// player the backend creates.
pub struct Backend {
    clips: Arc<Mutex<ClipLoader>>,
}

impl Backend {
    pub fn new() -> Backend {
        Backend {
            clips: Arc::new(Mutex::new(ClipLoader::default())),
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::new()
    }
}

impl super::Backend for Backend {
    fn create_player(&self, device: &DeviceId) -> Box<dyn super::Player> {
        Box::new(Player {
            output: Mutex::new(Output::new(device.clone())),
            clips: self.clips.clone(),
            playback: Mutex::new(None),
        })
    }

    fn output_devices(&self) -> Result<Vec<OutputDevice>, PlaybackError> {
        Ok(list_cpal_devices()?
            .into_iter()
            .map(|(device, _)| device)
            .collect())
    }

    fn default_output(&self) -> Result<DeviceId, PlaybackError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| PlaybackError::DeviceNotFound("default".to_string()))?;
        #[allow(deprecated)]
        let name = device
            .name()
            .map_err(|e| PlaybackError::Host(e.to_string()))?;
        Ok(DeviceId::new(name))
    }
}

/// The device a player is bound to. The cpal device is looked up on first use and kept
/// until the target changes or the device fails, so starting a clip does not have to
/// walk every host.
struct Output<D> {
    id: DeviceId,
    device: Option<D>,
}

impl<D: Clone> Output<D> {
    fn new(id: DeviceId) -> Output<D> {
        Output { id, device: None }
    }

    fn resolve(
        &mut self,
        lookup: impl FnOnce(&DeviceId) -> Result<D, PlaybackError>,
    ) -> Result<D, PlaybackError> {
        if let Some(device) = &self.device {
            return Ok(device.clone());
        }
        let device = lookup(&self.id)?;
        self.device = Some(device.clone());
        Ok(device)
    }

    fn retarget(&mut self, id: &DeviceId) {
        if self.id != *id {
            self.id = id.clone();
            self.device = None;
        }
    }

    fn forget(&mut self) {
        self.device = None;
    }
}

/// Progress shared between a player and its output callback.
struct Progress {
    frames_played: AtomicU64,
    stream_failed: AtomicBool,
}

impl Progress {
    fn new() -> Progress {
        Progress {
            frames_played: AtomicU64::new(0),
            stream_failed: AtomicBool::new(false),
        }
    }
}

/// A clip that is currently on its way to an output.
struct Playback {
    signal: PlaybackSignal,
    progress: Arc<Progress>,
    clip: LoadedClip,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl Playback {
    /// Stops playback and waits for the stream to be torn down.
    fn halt(mut self) {
        self.signal.stop();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("Playback thread panicked");
            }
        }
    }
}

/// Walks a clip from the output callback.
struct ClipCursor {
    clip: LoadedClip,
    position: usize,
    progress: Arc<Progress>,
    signal: PlaybackSignal,
}

impl ClipCursor {
    /// Copies the next chunk of the clip into the output, zero-filling once it runs out.
    fn fill(&mut self, data: &mut [f32]) {
        let samples = self.clip.samples();
        let remaining = samples.len().saturating_sub(self.position);
        let to_copy = remaining.min(data.len());
        data[..to_copy].copy_from_slice(&samples[self.position..self.position + to_copy]);
        data[to_copy..].fill(0.0);
        self.position += to_copy;

        let channels = self.clip.channel_count().max(1) as usize;
        self.progress
            .frames_played
            .store((self.position / channels) as u64, Ordering::Relaxed);

        if self.position >= samples.len() {
            self.signal.finish();
        }
    }
}

/// f32 callback: copy directly into the cpal buffer.
fn create_f32_callback(
    mut cursor: ClipCursor,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        cursor.fill(data);
    }
}

/// Integer callback: fill a scratch buffer and convert.
fn create_converting_callback<T: cpal::Sample + cpal::FromSample<f32> + Send + 'static>(
    mut cursor: ClipCursor,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static {
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        scratch.resize(data.len(), 0.0);
        cursor.fill(&mut scratch);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

/// Error callback. Underruns only glitch; any other stream error ends the clip so the
/// player goes idle, and the next start looks the device up again.
fn create_error_callback(
    progress: Arc<Progress>,
    signal: PlaybackSignal,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err: cpal::StreamError| match err {
        cpal::StreamError::BufferUnderrun => warn!("cpal output stream underrun"),
        err => {
            error!("cpal output stream error: {}", err);
            progress.stream_failed.store(true, Ordering::Release);
            signal.finish();
        }
    }
}

/// Builds and starts an output stream for the cursor.
fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    cursor: ClipCursor,
) -> Result<cpal::Stream, PlaybackError> {
    let err_fn = create_error_callback(cursor.progress.clone(), cursor.signal.clone());
    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            device.build_output_stream(config, create_f32_callback(cursor), err_fn, None)
        }
        cpal::SampleFormat::I16 => device.build_output_stream(
            config,
            create_converting_callback::<i16>(cursor),
            err_fn,
            None,
        ),
        cpal::SampleFormat::I32 => device.build_output_stream(
            config,
            create_converting_callback::<i32>(cursor),
            err_fn,
            None,
        ),
        other => {
            return Err(PlaybackError::Stream(format!(
                "unsupported output sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| PlaybackError::Stream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| PlaybackError::Stream(e.to_string()))?;
    Ok(stream)
}

/// A cpal player. Each start opens its own output stream on the bound device; the
/// stream lives on a dedicated thread until the clip ends or the player is stopped.
pub struct Player {
    output: Mutex<Output<cpal::Device>>,
    clips: Arc<Mutex<ClipLoader>>,
    playback: Mutex<Option<Playback>>,
}

impl Player {
    /// Runs a fallible step against the bound device. A failure drops the cached
    /// device so that the next start looks it up again.
    fn on_device<T>(
        &self,
        step: impl FnOnce() -> Result<T, PlaybackError>,
    ) -> Result<T, PlaybackError> {
        let result = step();
        if result.is_err() {
            self.output.lock().forget();
        }
        result
    }
}

impl super::Player for Player {
    fn start(&self, file: &Path) -> Result<(), PlaybackError> {
        let previous = self.playback.lock().take();
        if let Some(previous) = previous {
            if previous.progress.stream_failed.load(Ordering::Acquire) {
                self.output.lock().forget();
            }
            previous.halt();
        }

        let (device_id, device) = {
            let mut output = self.output.lock();
            let device = output.resolve(find_device)?;
            (output.id.clone(), device)
        };
        let supported = self.on_device(|| {
            device
                .default_output_config()
                .map_err(|e| PlaybackError::Stream(e.to_string()))
        })?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.config();

        let clip = self
            .clips
            .lock()
            .load(file, config.sample_rate, config.channels)?;

        let signal = PlaybackSignal::new();
        let progress = Arc::new(Progress::new());
        let cursor = ClipCursor {
            clip: clip.clone(),
            position: 0,
            progress: progress.clone(),
            signal: signal.clone(),
        };

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), PlaybackError>>(1);
        let join_handle = {
            let signal = signal.clone();
            let device_id = device_id.clone();
            // The stream has to stay on the thread that built it.
            thread::spawn(move || {
                let span = span!(Level::INFO, "clip playback", device = %device_id);
                let _enter = span.enter();

                let stream = match build_stream(&device, &config, sample_format, cursor) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                signal.wait();
                drop(stream);
                debug!("Output stream closed");
            })
        };

        let ready = self.on_device(|| match ready_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(PlaybackError::Stream(
                "playback thread exited before the stream started".to_string(),
            )),
        });
        if let Err(e) = ready {
            let _ = join_handle.join();
            return Err(e);
        }

        info!(
            device = %device_id,
            file = ?file,
            duration_ms = clip.duration().as_millis(),
            "Playing clip."
        );
        *self.playback.lock() = Some(Playback {
            signal,
            progress,
            clip,
            join_handle: Some(join_handle),
        });
        Ok(())
    }

    fn stop(&self) {
        let playback = self.playback.lock().take();
        if let Some(playback) = playback {
            if playback.progress.stream_failed.load(Ordering::Acquire) {
                self.output.lock().forget();
            }
            playback.halt();
        }
    }

    fn state(&self) -> PlayerState {
        match self.playback.lock().as_ref() {
            Some(playback) if !playback.signal.is_over() => PlayerState::Playing,
            _ => PlayerState::Idle,
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.playback
            .lock()
            .as_ref()
            .map(|playback| playback.clip.duration())
    }

    fn position(&self) -> Duration {
        match self.playback.lock().as_ref() {
            Some(playback) => {
                let frames = playback.progress.frames_played.load(Ordering::Relaxed);
                Duration::from_secs_f64(frames as f64 / playback.clip.sample_rate().max(1) as f64)
            }
            None => Duration::ZERO,
        }
    }

    fn set_output(&self, device: &DeviceId) {
        // The running stream stays where it is; the next start opens the new device.
        self.output.lock().retarget(device);
    }

    fn output(&self) -> DeviceId {
        self.output.lock().id.clone()
    }

    fn available_outputs(&self) -> Result<Vec<OutputDevice>, PlaybackError> {
        Ok(list_cpal_devices()?
            .into_iter()
            .map(|(device, _)| device)
            .collect())
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if let Some(playback) = self.playback.get_mut().take() {
            playback.halt();
        }
    }
}

#[cfg(test)]
mod test {
    use std::{cell::Cell, thread};

    use super::*;

    fn cursor(samples: Vec<f32>, channels: u16) -> (ClipCursor, Arc<Progress>, PlaybackSignal) {
        let progress = Arc::new(Progress::new());
        let signal = PlaybackSignal::new();
        (
            ClipCursor {
                clip: LoadedClip::new(samples, channels, 48000),
                position: 0,
                progress: progress.clone(),
                signal: signal.clone(),
            },
            progress,
            signal,
        )
    }

    #[test]
    fn test_cursor_fill_tracks_progress() {
        let (mut cursor, progress, signal) = cursor(vec![0.5; 12], 2);

        let mut data = [1.0f32; 8];
        cursor.fill(&mut data);
        assert_eq!([0.5; 8], data);
        assert_eq!(4, progress.frames_played.load(Ordering::Relaxed));
        assert!(!signal.is_finished());

        cursor.fill(&mut data);
        assert_eq!([0.5, 0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0], data);
        assert_eq!(6, progress.frames_played.load(Ordering::Relaxed));
        assert!(signal.is_finished());

        // Past the end it only produces silence.
        cursor.fill(&mut data);
        assert_eq!([0.0; 8], data);
    }

    #[test]
    fn test_cursor_short_clip_into_large_buffer() {
        let (mut cursor, progress, signal) = cursor(vec![1.0, -1.0], 1);

        let mut data = [0.25f32; 4];
        cursor.fill(&mut data);
        assert_eq!([1.0, -1.0, 0.0, 0.0], data);
        assert_eq!(2, progress.frames_played.load(Ordering::Relaxed));
        assert!(signal.is_finished());
        assert!(!progress.stream_failed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_lost_device_ends_playback() {
        let (_cursor, progress, signal) = cursor(vec![0.0; 48000], 1);
        let mut on_error = create_error_callback(progress.clone(), signal.clone());

        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait())
        };

        on_error(cpal::StreamError::BufferUnderrun);
        assert!(!signal.is_over());
        assert!(!progress.stream_failed.load(Ordering::Acquire));

        on_error(cpal::StreamError::DeviceNotAvailable);
        assert!(waiter.join().is_ok());
        assert!(signal.is_over());
        assert!(!signal.is_stopped());
        assert!(progress.stream_failed.load(Ordering::Acquire));
    }

    #[test]
    fn test_output_device_lookup_is_cached() -> Result<(), PlaybackError> {
        let lookups = Cell::new(0);
        let lookup = |id: &DeviceId| -> Result<String, PlaybackError> {
            lookups.set(lookups.get() + 1);
            Ok(format!("{}#{}", id, lookups.get()))
        };

        let mut output = Output::new(DeviceId::new("virtual"));
        assert_eq!("virtual#1", output.resolve(lookup)?);
        assert_eq!("virtual#1", output.resolve(lookup)?);
        assert_eq!(1, lookups.get());

        // Retargeting to the same device keeps the cached one.
        output.retarget(&DeviceId::new("virtual"));
        assert_eq!("virtual#1", output.resolve(lookup)?);

        output.retarget(&DeviceId::new("monitor"));
        assert_eq!("monitor#2", output.resolve(lookup)?);

        output.forget();
        assert_eq!("monitor#3", output.resolve(lookup)?);
        assert_eq!(3, lookups.get());
        Ok(())
    }

    #[test]
    fn test_failed_lookup_is_retried() {
        let mut output: Output<String> = Output::new(DeviceId::new("cable"));
        assert!(matches!(
            output.resolve(|id| Err(PlaybackError::DeviceNotFound(id.to_string()))),
            Err(PlaybackError::DeviceNotFound(_))
        ));
        assert!(matches!(
            output.resolve(|id| Ok(id.to_string())),
            Ok(device) if device == "cable"
        ));
    }
}
