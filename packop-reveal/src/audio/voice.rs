//! Cue voices: short enveloped tones rendered into the cue context
//!
//! Each cue is a handful of oscillator partials with an attack ramp and a
//! linear or exponential release, sampled at the device rate.

use packop_common::CueKind;
use std::f32::consts::PI;

/// Release floor for exponential envelopes (an exponential ramp cannot reach zero)
const EXP_FLOOR: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Waveform {
    Sine,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Sample at normalized phase (0.0-1.0)
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Release {
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy)]
struct Envelope {
    peak: f32,
    attack_secs: f32,
    end_secs: f32,
    release: Release,
}

impl Envelope {
    /// Gain at `t` seconds after the cue started
    fn gain(&self, t: f32) -> f32 {
        if t < 0.0 || t >= self.end_secs {
            return 0.0;
        }
        if t < self.attack_secs {
            return self.peak * t / self.attack_secs;
        }
        let progress = (t - self.attack_secs) / (self.end_secs - self.attack_secs);
        match self.release {
            Release::Linear => self.peak * (1.0 - progress),
            Release::Exponential => self.peak * (EXP_FLOOR / self.peak).powf(progress),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Partial {
    waveform: Waveform,
    frequency: f32,
    envelope: Envelope,
}

/// One playing cue
#[derive(Debug, Clone)]
pub struct CueVoice {
    kind: CueKind,
    partials: Vec<Partial>,
    sample_rate: u32,
    position: u64,
    total_frames: u64,
}

impl CueVoice {
    pub fn new(kind: CueKind, sample_rate: u32) -> Self {
        let partials = match kind {
            // Deep atmosphere: 40 Hz sine swelling in over 1 s, gone by 4 s
            CueKind::Ambient => vec![Partial {
                waveform: Waveform::Sine,
                frequency: 40.0,
                envelope: Envelope {
                    peak: 0.2,
                    attack_secs: 1.0,
                    end_secs: 4.0,
                    release: Release::Linear,
                },
            }],
            // Low rasp under the growing vines
            CueKind::Entangle => vec![Partial {
                waveform: Waveform::Sawtooth,
                frequency: 60.0,
                envelope: Envelope {
                    peak: 0.15,
                    attack_secs: 1.0,
                    end_secs: 3.0,
                    release: Release::Linear,
                },
            }],
            // C major chord chime
            CueKind::Reveal => [523.25, 659.25, 783.99]
                .into_iter()
                .map(|frequency| Partial {
                    waveform: Waveform::Triangle,
                    frequency,
                    envelope: Envelope {
                        peak: 0.1,
                        attack_secs: 0.1,
                        end_secs: 3.0,
                        release: Release::Exponential,
                    },
                })
                .collect(),
        };

        let longest = partials
            .iter()
            .map(|p| p.envelope.end_secs)
            .fold(0.0_f32, f32::max);
        let total_frames = (longest * sample_rate as f32).ceil() as u64;

        Self {
            kind,
            partials,
            sample_rate,
            position: 0,
            total_frames,
        }
    }

    pub fn kind(&self) -> CueKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.total_frames
    }

    pub fn duration_secs(&self) -> f32 {
        self.total_frames as f32 / self.sample_rate as f32
    }

    /// Next mono sample, or None once the voice has finished
    pub fn next_sample(&mut self) -> Option<f32> {
        if self.is_finished() {
            return None;
        }
        let t = self.position as f32 / self.sample_rate as f32;
        self.position += 1;

        let value = self
            .partials
            .iter()
            .map(|p| {
                let phase = (p.frequency * t).fract();
                p.waveform.sample(phase) * p.envelope.gain(t)
            })
            .sum();
        Some(value)
    }
}
