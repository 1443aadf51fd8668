//! Real-time audio output stream for the playback engine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("no audio output devices found")]
    NoDevices,
    #[error("failed to get default output config: {0}")]
    Config(String),
    #[error("failed to build output stream: {0}")]
    Stream(String),
}

/// Real-time output stream that pulls samples from a render callback.
///
/// Backend errors raised after startup are forwarded from the cpal error
/// callback over a bounded channel and can be polled with [`take_error`].
///
/// [`take_error`]: OutputStream::take_error
pub struct OutputStream {
    stop_flag: Arc<AtomicBool>,
    error_rx: Receiver<String>,
    sample_rate: u32,
    channels: u16,
    _stream: cpal::Stream,
}

impl OutputStream {
    /// Open the default output device and start rendering.
    ///
    /// The callback receives `(buffer, sample_rate, channels)` on the audio
    /// thread with an interleaved f32 buffer to fill.
    pub fn start<F>(render: F) -> Result<Self, AudioOutputError>
    where
        F: FnMut(&mut [f32], u32, u16) + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioOutputError::NoDevices)?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioOutputError::Config(e.to_string()))?;

        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels();

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let (error_tx, error_rx) = bounded(16);

        let config: StreamConfig = supported_config.into();
        let render = Arc::new(Mutex::new(render));

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if stop_clone.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }
                    let Ok(mut cb) = render.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    cb(data, sample_rate, channels);
                },
                move |err| {
                    error!("Output stream error: {}", err);
                    let _ = error_tx.try_send(err.to_string());
                },
                None,
            )
            .map_err(|e| AudioOutputError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioOutputError::Stream(e.to_string()))?;

        info!(sample_rate, channels, "Started realtime output stream");

        Ok(Self {
            stop_flag,
            error_rx,
            sample_rate,
            channels,
            _stream: stream,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Oldest unread backend error, if the stream has reported any
    pub fn take_error(&self) -> Option<String> {
        self.error_rx.try_recv().ok()
    }

    /// Silence the stream; it keeps running but renders zeros
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}
