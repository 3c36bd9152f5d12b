use mixer::{Mixer, LoopType};
use mixer::interpolator::Interpolator;
use module::Sample;

/// The command surface the sequencer talks to. It hides the mixer's voice
/// representation behind per-track channel numbers; out-of-range channels
/// are ignored, so the effect interpreter never needs to bounds-check.
pub struct Virtual<'a> {
    num_tracks: usize,
    mixer     : Mixer<'a>,
}

impl<'a> Virtual<'a> {
    pub fn new(num_tracks: usize, sample: &'a Vec<Sample>) -> Self {
        Virtual {
            num_tracks,
            mixer: Mixer::new(num_tracks, sample),
        }
    }

    pub fn num_tracks(&self) -> usize {
        self.num_tracks
    }

    pub fn set_rate(&mut self, rate: u32) {
        self.mixer.rate = rate;
    }

    pub fn set_tempo(&mut self, tempo: usize) {
        self.mixer.set_tempo(tempo);
    }

    pub fn set_tempo_factor(&mut self, factor: f64) {
        if factor > 0.0 {
            self.mixer.factor = factor;
        }
    }

    pub fn tempo_factor(&self) -> f64 {
        self.mixer.factor
    }

    pub fn set_interpolator(&mut self, interp: Interpolator) {
        self.mixer.set_interpolator(interp);
    }

    pub fn set_mastervol(&mut self, vol: usize) {
        self.mixer.set_mastervol(vol);
    }

    pub fn enable_boost(&mut self, boost: bool) {
        self.mixer.enable_boost(boost);
    }

    pub fn trigger(&mut self, chn: usize, smp: usize, offset: usize) {
        self.mixer.trigger(chn, smp, offset);
    }

    pub fn set_sample(&mut self, chn: usize, smp: usize) {
        self.mixer.set_sample(chn, smp);
    }

    pub fn set_loop(&mut self, chn: usize, start: usize, len: usize, loop_type: LoopType) {
        self.mixer.set_loop(chn, start, len, loop_type);
    }

    pub fn set_release(&mut self, chn: usize, start: usize, len: usize) {
        self.mixer.set_release(chn, start, len);
    }

    pub fn set_freq(&mut self, chn: usize, freq: f64) {
        self.mixer.set_freq(chn, freq);
    }

    pub fn set_volume(&mut self, chn: usize, vol: usize) {
        self.mixer.set_volume(chn, vol);
    }

    pub fn set_speaker_volume(&mut self, chn: usize, left: usize, right: usize) {
        self.mixer.set_speaker_volume(chn, left, right);
    }

    pub fn set_pan(&mut self, chn: usize, pan: isize) {
        self.mixer.set_pan(chn, pan);
    }

    pub fn set_surround(&mut self, chn: usize, surround: bool) {
        self.mixer.set_surround(chn, surround);
    }

    pub fn set_mute(&mut self, chn: usize, mute: bool) {
        self.mixer.set_mute(chn, mute);
    }

    pub fn set_reverse(&mut self, chn: usize, reverse: bool) {
        self.mixer.set_reverse(chn, reverse);
    }

    pub fn set_voicepos(&mut self, chn: usize, frames: usize) {
        self.mixer.set_voicepos(chn, frames);
    }

    pub fn voicepos(&self, chn: usize) -> usize {
        self.mixer.voicepos(chn)
    }

    pub fn frequency(&self, chn: usize) -> f64 {
        self.mixer.frequency(chn)
    }

    pub fn release(&mut self, chn: usize) {
        self.mixer.release(chn);
    }

    pub fn stop(&mut self, chn: usize) {
        self.mixer.stop(chn);
    }

    pub fn is_active(&self, chn: usize) -> bool {
        self.mixer.is_active(chn)
    }

    /// Stop every voice, e.g. before a seek or after a scan pass.
    pub fn reset(&mut self) {
        for chn in 0..self.num_tracks {
            self.mixer.stop(chn);
        }
    }

    pub fn mix(&mut self) {
        self.mixer.mix();
    }

    pub fn buffer(&self) -> &[i16] {
        self.mixer.buffer()
    }
}
