//! Audio output - runs the engine inside the cpal callback

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::Consumer;

use morphsynth::{synth::SynthMessage, Synth, SynthError, MAX_BLOCK_SIZE};

/// The default output device and its preferred stream config.
pub struct AudioOutput {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl AudioOutput {
    pub fn open() -> Result<Self, SynthError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SynthError::AudioUnavailable("no default output device".into()))?;
        let config = device
            .default_output_config()
            .map_err(|err| SynthError::AudioUnavailable(err.to_string()))?;
        Ok(Self { device, config })
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate().0 as f32
    }

    pub fn channels(&self) -> usize {
        self.config.channels() as usize
    }

    /// Move the engine onto the audio thread and start playback.
    ///
    /// Control reaches the engine only through `rx`, drained at the start
    /// of every callback.
    pub fn start(
        self,
        mut synth: Synth,
        mut rx: Consumer<SynthMessage>,
    ) -> Result<cpal::Stream, SynthError> {
        let channels = self.channels();
        let Self { device, config } = self;
        let stream_config: cpal::StreamConfig = config.into();
        let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
        let mut right = vec![0.0f32; MAX_BLOCK_SIZE];

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| {
                    synth.process_messages(&mut rx);

                    let total_frames = data.len() / channels;
                    let mut frames_written = 0;
                    while frames_written < total_frames {
                        let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                        let (l, r) = (&mut left[..frames], &mut right[..frames]);
                        synth.render(l, r);

                        let out = &mut data[frames_written * channels..];
                        for (i, frame) in out.chunks_mut(channels).take(frames).enumerate() {
                            match frame {
                                [mono] => *mono = (l[i] + r[i]) * 0.5,
                                [fl, fr, rest @ ..] => {
                                    *fl = l[i];
                                    *fr = r[i];
                                    rest.fill(0.0);
                                }
                                [] => {}
                            }
                        }
                        frames_written += frames;
                    }
                },
                |err| log::error!("audio stream error: {err}"),
                None,
            )
            .map_err(|err| SynthError::AudioUnavailable(err.to_string()))?;

        stream
            .play()
            .map_err(|err| SynthError::AudioUnavailable(err.to_string()))?;
        Ok(stream)
    }
}
