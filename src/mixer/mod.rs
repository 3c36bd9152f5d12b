use std::cmp;
use module::sample::{Sample, SampleType};
use mixer::interpolator::{Interpolate, Interpolator, Nearest, Linear};
use ::*;

pub mod interpolator;

pub const FRAC_BITS: usize = 14;

const FRAC_MASK    : i64 = (1 << FRAC_BITS) - 1;
const PAL_RATE     : f64 = 250.0;
const LIM16_HI     : i32 = 32767;
const LIM16_LO     : i32 = -32768;
const RAMP_LEN     : i32 = 64;    // declick window in frames
const DOWNMIX_SHIFT: usize = 10;
const BOOST_SHIFT  : usize = 8;

macro_rules! try_voice {
    ( $a:expr, $b: expr ) => {
        if $a >= $b.len() {
            return
        }
    };
    ( $a:expr, $b:expr, $c:expr ) => {
        if $a >= $b.len() {
            return $c
        }
    };
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum LoopType {
    None,
    Normal,
    PingPong,
    OneShot,
}

impl Default for LoopType {
    fn default() -> Self {
        LoopType::None
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PanMode {
    Curve,
    Speaker,
    Surround,
}

impl Default for PanMode {
    fn default() -> Self {
        PanMode::Curve
    }
}


pub struct Mixer<'a> {
    pub rate  : u32,
    pub factor: f64,  // tempo factor multiplier
    interp    : Interpolator,
    voices    : Vec<Voice>,
    framesize : usize,
    buf32     : [i32; MAX_FRAMESIZE],
    buffer    : [i16; MAX_FRAMESIZE],
    mastervol : usize,  // 0..=64
    bitshift  : usize,
    sample    : &'a Vec<Sample>,
}

impl<'a> Mixer<'a> {

    pub fn new(num: usize, sample: &'a Vec<Sample>) -> Self {
        let mut mixer = Mixer {
            rate     : 44100,
            factor   : 1.0,
            interp   : Interpolator::Linear,
            voices   : vec![Voice::new(); num],
            framesize: 0,
            buf32    : [0; MAX_FRAMESIZE],
            buffer   : [0; MAX_FRAMESIZE],
            mastervol: 64,
            bitshift : DOWNMIX_SHIFT,
            sample,
        };

        for i in 0..num {
            mixer.voices[i].num = i;
        }

        mixer
    }

    pub fn num_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn set_interpolator(&mut self, interp: Interpolator) {
        self.interp = interp;
    }

    pub fn set_mastervol(&mut self, vol: usize) {
        self.mastervol = if vol > 64 { 64 } else { vol };
    }

    pub fn enable_boost(&mut self, boost: bool) {
        self.bitshift = if boost { BOOST_SHIFT } else { DOWNMIX_SHIFT };
    }

    pub fn set_tempo(&mut self, tempo: usize) {
        let tempo = cmp::max(tempo, 1);
        let size = ((self.rate as f64 * PAL_RATE) / (self.factor * tempo as f64 * 100.0)) as usize;
        self.framesize = cmp::min(size, MAX_FRAMESIZE / 2);
    }

    /// Schedule a (re)trigger of `smp` (1-based sample number) at the
    /// given frame offset. The cursor reset happens at the next mix pass.
    pub fn trigger(&mut self, voice: usize, smp: usize, offset: usize) {
        try_voice!(voice, self.voices);

        let v = &mut self.voices[voice];
        if smp == 0 || smp > self.sample.len() {
            v.active = false;
            return
        }
        v.smp = smp;
        v.start = offset;
        v.end = self.sample[smp - 1].size;
        v.kick = true;
        v.released = false;
        v.reverse = false;
        v.release_len = 0;
        v.loop_type = LoopType::None;
    }

    /// Swap the source sample without retriggering; the cursor keeps
    /// running modulo the new length. Used for synth waveform changes.
    pub fn set_sample(&mut self, voice: usize, smp: usize) {
        try_voice!(voice, self.voices);

        if smp == 0 || smp > self.sample.len() {
            return
        }
        let size = self.sample[smp - 1].size;
        let v = &mut self.voices[voice];
        v.smp = smp;
        v.end = size;
        if size > 0 {
            v.pos %= (size as i64) << FRAC_BITS;
        }
    }

    pub fn stop(&mut self, voice: usize) {
        try_voice!(voice, self.voices);
        self.voices[voice].active = false;
    }

    /// Break the sustain loop so playback runs through to the sample end
    /// or the configured release segment.
    pub fn release(&mut self, voice: usize) {
        try_voice!(voice, self.voices);
        self.voices[voice].released = true;
    }

    pub fn set_loop(&mut self, voice: usize, start: usize, len: usize, loop_type: LoopType) {
        try_voice!(voice, self.voices);

        let v = &mut self.voices[voice];
        let mut end = start + len;
        if v.smp != 0 {
            let size = self.sample[v.smp - 1].size;
            // oversized regions end at the last frame, never out of bounds
            if size > 0 && end >= size {
                end = size - 1;
            }
        }

        v.loop_start = start;
        v.loop_end = end;
        v.loop_type = if len == 0 || end <= start { LoopType::None } else { loop_type };
        if v.loop_type == LoopType::OneShot {
            // a retrigger restarts from the loop region
            v.start = start;
        }
    }

    pub fn set_release(&mut self, voice: usize, start: usize, len: usize) {
        try_voice!(voice, self.voices);
        let v = &mut self.voices[voice];
        v.release_start = start;
        v.release_len = len;
    }

    pub fn set_freq(&mut self, voice: usize, freq: f64) {
        try_voice!(voice, self.voices);
        self.voices[voice].freq = freq;
    }

    pub fn set_volume(&mut self, voice: usize, vol: usize) {
        try_voice!(voice, self.voices);
        let v = &mut self.voices[voice];
        v.vol = if vol > 127 { 127 } else { vol };
        if v.pan_mode == PanMode::Speaker {
            v.pan_mode = PanMode::Curve;
        }
    }

    pub fn set_speaker_volume(&mut self, voice: usize, left: usize, right: usize) {
        try_voice!(voice, self.voices);
        let v = &mut self.voices[voice];
        v.spk_l = if left > 127 { 127 } else { left };
        v.spk_r = if right > 127 { 127 } else { right };
        v.pan_mode = PanMode::Speaker;
    }

    pub fn set_pan(&mut self, voice: usize, pan: isize) {
        try_voice!(voice, self.voices);
        let v = &mut self.voices[voice];
        v.pan = cmp::max(-16, cmp::min(16, pan));
        if v.pan_mode == PanMode::Speaker {
            v.pan_mode = PanMode::Curve;
        }
    }

    pub fn set_surround(&mut self, voice: usize, surround: bool) {
        try_voice!(voice, self.voices);
        let v = &mut self.voices[voice];
        v.pan_mode = if surround { PanMode::Surround } else { PanMode::Curve };
    }

    pub fn set_mute(&mut self, voice: usize, mute: bool) {
        try_voice!(voice, self.voices);
        self.voices[voice].mute = mute;
    }

    pub fn set_reverse(&mut self, voice: usize, reverse: bool) {
        try_voice!(voice, self.voices);
        self.voices[voice].reverse = reverse;
    }

    pub fn set_voicepos(&mut self, voice: usize, frames: usize) {
        try_voice!(voice, self.voices);
        let v = &mut self.voices[voice];
        v.pos = (frames as i64) << FRAC_BITS;
    }

    pub fn voicepos(&self, voice: usize) -> usize {
        try_voice!(voice, self.voices, 0);
        (self.voices[voice].pos >> FRAC_BITS) as usize
    }

    pub fn is_active(&self, voice: usize) -> bool {
        try_voice!(voice, self.voices, false);
        self.voices[voice].active
    }

    pub fn frequency(&self, voice: usize) -> f64 {
        try_voice!(voice, self.voices, 0.0);
        self.voices[voice].freq
    }

    pub fn mix(&mut self) {
        let framesize = self.framesize;
        let samples = self.sample;
        let mastervol = self.mastervol;
        let interp = self.interp;

        for x in self.buf32[..framesize * 2].iter_mut() {
            *x = 0;
        }

        for v in self.voices.iter_mut() {
            if v.kick {
                v.pos = (v.start as i64) << FRAC_BITS;
                v.kick = false;
                v.active = v.smp != 0;
                // ramp up from silence
                v.vol_l = 0;
                v.vol_r = 0;
                v.ramp = 0;
            }

            if !v.active || v.smp == 0 || v.smp > samples.len() {
                continue
            }

            let sample = &samples[v.smp - 1];
            if sample.sample_type == SampleType::Empty {
                continue
            }

            if v.freq < 1.0 {
                v.active = false;
                continue
            }

            let step_abs = ((v.freq * (1 << FRAC_BITS) as f64) / self.rate as f64) as i64;
            if step_abs == 0 {
                v.active = false;
                continue
            }

            v.sanity(sample.size);
            if !v.active {
                continue
            }

            v.update_gains(mastervol);

            // switch to 64-bit cursor arithmetic only when this sample
            // could overflow a 32-bit fixed-point position
            let wide = ((sample.size as i64 + 1) << FRAC_BITS) > i32::max_value() as i64;

            let mut size = framesize as isize;
            let mut buf_pos = 0_usize;

            while size > 0 && v.active {
                let bound = v.frames_to_boundary(step_abs);

                if bound == 0 {
                    v.handle_boundary(sample.size);
                    continue
                }

                let n = cmp::min(bound, size as i64) as usize;
                let step = if v.reverse { -step_abs } else { step_abs };

                let mut md = ChunkData {
                    pos    : v.pos,
                    step,
                    size   : n,
                    buf_pos,
                    vol_l  : v.vol_l,
                    vol_r  : v.vol_r,
                    old_l  : v.old_l,
                    old_r  : v.old_r,
                    ramp   : if interp == Interpolator::Nearest { 0 } else { v.ramp },
                };

                match (sample.sample_type, wide) {
                    (SampleType::Sample8, false)  => md.mix32::<i8>(interp, sample.data_8(), &mut self.buf32),
                    (SampleType::Sample8, true)   => md.mix64::<i8>(interp, sample.data_8(), &mut self.buf32),
                    (SampleType::Sample16, false) => md.mix32::<i16>(interp, sample.data_16(), &mut self.buf32),
                    (SampleType::Sample16, true)  => md.mix64::<i16>(interp, sample.data_16(), &mut self.buf32),
                    (SampleType::Empty, _)        => {},
                }

                v.pos = md.pos;
                v.ramp = md.ramp;
                buf_pos += n * 2;
                size -= n as isize;
            }
        }

        self.downmix();
    }

    fn downmix(&mut self) {
        let size = self.framesize * 2;
        for i in 0..size {
            let smp = self.buf32[i] >> self.bitshift;
            if smp > LIM16_HI {
                self.buffer[i] = LIM16_HI as i16;
            } else if smp < LIM16_LO {
                self.buffer[i] = LIM16_LO as i16;
            } else {
                self.buffer[i] = smp as i16;
            }
        }
    }

    pub fn buffer(&self) -> &[i16] {
        // *2 because we're stereo
        &self.buffer[..self.framesize * 2]
    }
}


#[derive(Clone, Default)]
struct Voice {
    num          : usize,
    smp          : usize,  // sample number, 1-based; 0 = none
    pos          : i64,    // fixed-point cursor
    freq         : f64,
    start        : usize,  // trigger offset in frames
    end          : usize,  // exclusive play boundary
    loop_start   : usize,
    loop_end     : usize,  // exclusive
    loop_type    : LoopType,
    release_start: usize,
    release_len  : usize,
    released     : bool,
    reverse      : bool,
    kick         : bool,
    active       : bool,
    mute         : bool,
    vol          : usize,  // 0..=127
    pan          : isize,  // -16..=16
    pan_mode     : PanMode,
    spk_l        : usize,
    spk_r        : usize,
    vol_l        : i32,    // current target gains
    vol_r        : i32,
    old_l        : i32,    // declick ramp source gains
    old_r        : i32,
    ramp         : i32,
}

impl Voice {
    pub fn new() -> Self {
        let v: Voice = Default::default();
        v
    }

    fn has_loop(&self) -> bool {
        self.loop_type != LoopType::None && self.loop_end > self.loop_start
    }

    fn sanity(&mut self, size: usize) {
        if size == 0 {
            self.active = false;
            return
        }
        if self.end > size {
            self.end = size;
        }
        if self.loop_type != LoopType::None {
            if self.loop_end >= size {
                self.loop_end = size - 1;
            }
            if self.loop_start >= self.loop_end {
                self.loop_type = LoopType::None;
            }
        }
        let max = (self.end as i64) << FRAC_BITS;
        if self.pos > max {
            self.pos = max;
        }
        if self.pos < 0 {
            self.pos = 0;
        }
    }

    fn update_gains(&mut self, mastervol: usize) {
        let (tl, tr) = if self.mute {
            (0, 0)
        } else {
            match self.pan_mode {
                PanMode::Curve => {
                    let g = (self.vol * mastervol / 8) as i32;
                    ((g * (16 - self.pan) as i32) >> 5, (g * (16 + self.pan) as i32) >> 5)
                }
                PanMode::Speaker => {
                    ((self.spk_l * mastervol / 8) as i32, (self.spk_r * mastervol / 8) as i32)
                }
                PanMode::Surround => {
                    let g = ((self.vol * mastervol / 8) as i32) >> 1;
                    (g, -g)
                }
            }
        };

        if tl != self.vol_l || tr != self.vol_r {
            self.old_l = self.vol_l;
            self.old_r = self.vol_r;
            self.vol_l = tl;
            self.vol_r = tr;
            self.ramp = RAMP_LEN;
        }
    }

    fn boundary_hi(&self) -> usize {
        if self.has_loop() { self.loop_end } else { self.end }
    }

    fn boundary_lo(&self) -> usize {
        if self.has_loop() { self.loop_start } else { 0 }
    }

    fn frames_to_boundary(&self, step_abs: i64) -> i64 {
        if self.reverse {
            let lo = (self.boundary_lo() as i64) << FRAC_BITS;
            if self.pos <= lo {
                0
            } else {
                (self.pos - lo + step_abs - 1) / step_abs
            }
        } else {
            let hi = (self.boundary_hi() as i64) << FRAC_BITS;
            if self.pos >= hi {
                0
            } else {
                (hi - self.pos + step_abs - 1) / step_abs
            }
        }
    }

    // Reposition after the cursor crossed a play boundary, preserving the
    // sub-sample overshoot.
    fn handle_boundary(&mut self, size: usize) {
        if self.reverse {
            let lo = (self.boundary_lo() as i64) << FRAC_BITS;
            let under = lo - self.pos;

            if self.has_loop() && !self.released {
                let span = ((self.loop_end - self.loop_start) as i64) << FRAC_BITS;
                let hi = (self.loop_end as i64) << FRAC_BITS;
                match self.loop_type {
                    LoopType::Normal => {
                        self.pos = hi - (under % span);
                    }
                    LoopType::PingPong => {
                        let u = under % (2 * span);
                        if u < span {
                            self.pos = lo + u;
                            self.reverse = false;
                        } else {
                            self.pos = hi - (u - span);
                        }
                    }
                    _ => self.active = false,
                }
            } else if self.has_loop() {
                // released: run on toward the sample start
                self.loop_type = LoopType::None;
                if self.pos <= 0 {
                    self.active = false;
                }
            } else {
                self.active = false;
            }
            return
        }

        let hi = (self.boundary_hi() as i64) << FRAC_BITS;
        let over = self.pos - hi;

        if self.has_loop() && !self.released {
            let span = ((self.loop_end - self.loop_start) as i64) << FRAC_BITS;
            let lo = (self.loop_start as i64) << FRAC_BITS;
            match self.loop_type {
                LoopType::Normal => {
                    self.pos = lo + (over % span);
                }
                LoopType::PingPong => {
                    let o = over % (2 * span);
                    if o < span {
                        self.pos = hi - o;
                        self.reverse = true;
                    } else {
                        self.pos = lo + (o - span);
                    }
                }
                // the region played once; a retrigger restarts it
                _ => self.active = false,
            }
        } else if self.has_loop() && self.release_len > 0 {
            // the loop ended with a release segment configured: switch the
            // play window there, keeping sub-sample phase
            let start = cmp::min(self.release_start, size);
            self.pos = ((start as i64) << FRAC_BITS) + cmp::max(over, 0);
            self.end = cmp::min(start + self.release_len, size);
            self.release_len = 0;
            self.loop_type = LoopType::None;
            if self.pos >= (self.end as i64) << FRAC_BITS {
                self.active = false;
            }
        } else if self.has_loop() {
            // released with no release segment: run on to the sample end
            self.loop_type = LoopType::None;
            if self.pos >= (self.end as i64) << FRAC_BITS {
                self.active = false;
            }
        } else {
            self.active = false;
        }
    }
}


struct ChunkData {
    pos    : i64,
    step   : i64,
    size   : usize,
    buf_pos: usize,
    vol_l  : i32,
    vol_r  : i32,
    old_l  : i32,
    old_r  : i32,
    ramp   : i32,
}

impl ChunkData {
    fn gains(&mut self) -> (i32, i32) {
        if self.ramp > 0 {
            let r = self.ramp;
            self.ramp -= 1;
            (self.vol_l + (self.old_l - self.vol_l) * r / RAMP_LEN,
             self.vol_r + (self.old_r - self.vol_r) * r / RAMP_LEN)
        } else {
            (self.vol_l, self.vol_r)
        }
    }

    fn mix32<T>(&mut self, interp: Interpolator, data: &[T], buf: &mut [i32])
        where Sampler: SamplerOps<T>
    {
        let mut pos = self.pos as i32;
        let step = self.step as i32;
        let mut bpos = self.buf_pos;

        for _ in 0..self.size {
            let i = (pos >> FRAC_BITS) as usize;
            if i >= data.len() {
                break
            }
            let frac = (pos as i64 & FRAC_MASK) as i32;

            let s0 = Sampler::get(&data[i]);
            let smp = match interp {
                Interpolator::Nearest => Nearest.get_sample(s0, 0, frac),
                Interpolator::Linear  => {
                    let s1 = if i + 1 < data.len() { Sampler::get(&data[i + 1]) } else { s0 };
                    Linear.get_sample(s0, s1, frac)
                }
            };

            let (gl, gr) = self.gains();
            buf[bpos] += smp * gl;
            buf[bpos + 1] += smp * gr;
            bpos += 2;
            pos += step;
        }

        self.pos = pos as i64;
    }

    fn mix64<T>(&mut self, interp: Interpolator, data: &[T], buf: &mut [i32])
        where Sampler: SamplerOps<T>
    {
        let mut pos = self.pos;
        let step = self.step;
        let mut bpos = self.buf_pos;

        for _ in 0..self.size {
            let i = (pos >> FRAC_BITS) as usize;
            if i >= data.len() {
                break
            }
            let frac = (pos & FRAC_MASK) as i32;

            let s0 = Sampler::get(&data[i]);
            let smp = match interp {
                Interpolator::Nearest => Nearest.get_sample(s0, 0, frac),
                Interpolator::Linear  => {
                    let s1 = if i + 1 < data.len() { Sampler::get(&data[i + 1]) } else { s0 };
                    Linear.get_sample(s0, s1, frac)
                }
            };

            let (gl, gr) = self.gains();
            buf[bpos] += smp * gl;
            buf[bpos + 1] += smp * gr;
            bpos += 2;
            pos += step;
        }

        self.pos = pos;
    }
}


struct Sampler;

trait SamplerOps<T> {
    fn get(&T) -> i32;
}

impl SamplerOps<i16> for Sampler {
    fn get(i: &i16) -> i32 {
        *i as i32
    }
}

impl SamplerOps<i8> for Sampler {
    fn get(i: &i8) -> i32 {
        (*i as i32) << 8
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use module::sample::Sample;

    fn ramp_sample(len: usize) -> Vec<Sample> {
        let mut smp = Sample::new();
        let data = (0..len).map(|x| (x & 0x7f) as u8).collect::<Vec<u8>>();
        smp.store(&data);
        smp.num = 1;
        vec![smp]
    }

    fn ticked_mixer<'a>(samples: &'a Vec<Sample>) -> Mixer<'a> {
        let mut mixer = Mixer::new(4, samples);
        mixer.set_tempo(125);  // 50 Hz tick, 882 frames at 44100
        mixer
    }

    #[test]
    fn test_center_pan_equal_channels() {
        let samples = ramp_sample(4000);
        let mut mixer = ticked_mixer(&samples);
        mixer.set_interpolator(Interpolator::Nearest);
        mixer.trigger(0, 1, 0);
        mixer.set_freq(0, 8363.0);
        mixer.set_volume(0, 127);
        mixer.set_pan(0, 0);
        mixer.mix();

        let buf = mixer.buffer();
        assert!(buf.len() > 0);
        let mut nonzero = false;
        for f in buf.chunks(2) {
            assert_eq!(f[0], f[1]);
            if f[0] != 0 {
                nonzero = true;
            }
        }
        assert!(nonzero);
    }

    #[test]
    fn test_kick_consumed_once() {
        let samples = ramp_sample(4000);
        let mut mixer = ticked_mixer(&samples);
        mixer.trigger(0, 1, 100);
        mixer.set_freq(0, 8363.0);
        assert!(mixer.voices[0].kick);
        mixer.mix();
        assert!(!mixer.voices[0].kick);
        assert!(mixer.voices[0].active);
        assert!(mixer.voicepos(0) > 100);
    }

    #[test]
    fn test_zero_freq_deactivates() {
        let samples = ramp_sample(4000);
        let mut mixer = ticked_mixer(&samples);
        mixer.trigger(0, 1, 0);
        mixer.set_freq(0, 0.0);
        mixer.mix();
        assert!(!mixer.is_active(0));
    }

    #[test]
    fn test_oversized_loop_truncated() {
        let samples = ramp_sample(100);
        let mut mixer = ticked_mixer(&samples);
        mixer.trigger(0, 1, 0);
        mixer.set_loop(0, 50, 100, LoopType::Normal);
        assert_eq!(mixer.voices[0].loop_end, 99);
    }

    #[test]
    fn test_end_of_sample_deactivates() {
        let samples = ramp_sample(100);
        let mut mixer = ticked_mixer(&samples);
        mixer.trigger(0, 1, 0);
        mixer.set_freq(0, 44100.0);  // eats 100 frames in one tick
        mixer.mix();
        assert!(!mixer.is_active(0));
    }

    #[test]
    fn test_forward_loop_wraps() {
        let samples = ramp_sample(100);
        let mut mixer = ticked_mixer(&samples);
        mixer.trigger(0, 1, 0);
        mixer.set_loop(0, 10, 80, LoopType::Normal);
        mixer.set_freq(0, 44100.0);
        mixer.mix();
        assert!(mixer.is_active(0));
        let pos = mixer.voicepos(0);
        assert!(pos >= 10 && pos < 90);
    }

    #[test]
    fn test_pingpong_reflects() {
        let samples = ramp_sample(100);
        let mut mixer = ticked_mixer(&samples);
        mixer.trigger(0, 1, 0);
        mixer.set_loop(0, 0, 99, LoopType::PingPong);
        mixer.set_freq(0, 22050.0);
        mixer.mix();
        assert!(mixer.is_active(0));
        let pos = mixer.voicepos(0);
        assert!(pos < 99);
    }

    #[test]
    fn test_release_splice() {
        let samples = ramp_sample(20000);
        let mut mixer = ticked_mixer(&samples);
        mixer.trigger(0, 1, 0);
        mixer.set_loop(0, 0, 50, LoopType::Normal);
        mixer.set_release(0, 10000, 10000);
        mixer.set_freq(0, 8363.0);
        mixer.release(0);
        mixer.mix();
        // crossed the loop boundary and spliced into the release segment
        assert!(mixer.is_active(0));
        let pos = mixer.voicepos(0);
        assert!(pos >= 10000 && pos < 10200);
    }

    #[test]
    fn test_released_loop_runs_to_end() {
        let samples = ramp_sample(200);
        let mut mixer = ticked_mixer(&samples);
        mixer.trigger(0, 1, 0);
        mixer.set_loop(0, 0, 50, LoopType::Normal);
        mixer.set_freq(0, 44100.0);
        mixer.release(0);
        mixer.mix();
        // no release segment: plays through the tail and stops
        assert!(!mixer.is_active(0));
    }

    #[test]
    fn test_downmix_saturates() {
        let samples = ramp_sample(10);
        let mut mixer = ticked_mixer(&samples);
        mixer.buf32[0] = i32::max_value();
        mixer.buf32[1] = i32::min_value();
        mixer.downmix();
        assert_eq!(mixer.buffer[0], 32767);
        assert_eq!(mixer.buffer[1], -32768);
    }

    #[test]
    fn test_surround_inverts_right() {
        let samples = ramp_sample(4000);
        let mut mixer = ticked_mixer(&samples);
        mixer.set_interpolator(Interpolator::Nearest);
        mixer.trigger(0, 1, 0);
        mixer.set_freq(0, 8363.0);
        mixer.set_volume(0, 127);
        mixer.set_surround(0, true);
        mixer.mix();

        for f in mixer.buffer().chunks(2) {
            assert_eq!(f[0], -f[1]);
        }
    }
}
