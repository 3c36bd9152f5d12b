use module::instrument::SynthInstr;

// program opcodes; values below 0x80 set a level (volume program) or
// select a waveform (waveform program)
const SYN_END: u8 = 0xff;  // stop the program
const SYN_JMP: u8 = 0xfe;  // jump to table position
const SYN_JXS: u8 = 0xfd;  // cross-jump: JWS in the volume table, JVS in the waveform table
const SYN_HLT: u8 = 0xfc;  // halt
const SYN_SPD: u8 = 0xfb;  // set program speed
const SYN_WAI: u8 = 0xfa;  // wait N program steps
const SYN_CHD: u8 = 0xf9;  // change downwards per tick
const SYN_CHU: u8 = 0xf8;  // change upwards per tick
const SYN_EN2: u8 = 0xf7;  // enable looped envelope-table playback
const SYN_EN1: u8 = 0xf6;  // enable one-shot envelope-table playback
const SYN_RES: u8 = 0xf5;  // waveform table only: reset pitch deviation

// instructions per tick; malformed programs are cut short, not detected
const OP_GUARD: usize = 128;

const MAX_SYNTH_VOL: isize = 64;

/// Per-channel interpreter state for the two synth programs. The volume
/// program yields a 0..=64 level each tick; the waveform program selects
/// waveforms and accumulates a pitch deviation in period units.
#[derive(Clone, Default)]
pub struct SynthState {
    vol_pc     : usize,
    wf_pc      : usize,
    vol_wait   : usize,
    wf_wait    : usize,
    vol_speed  : usize,
    wf_speed   : usize,
    vol_count  : usize,
    wf_count   : usize,
    vol_halted : bool,
    wf_halted  : bool,
    vol_change : isize,
    pub volume : isize,  // 0..=64
    pub wf     : usize,  // current waveform index
    env_wf     : usize,  // envelope source waveform; usize::MAX = off
    env_looped : bool,
    env_pos    : usize,
    pitch_delta: f64,    // period deviation accumulated by CHU/CHD
    pitch_rate : f64,
}

impl SynthState {
    pub fn new() -> Self {
        let mut s: SynthState = Default::default();
        s.env_wf = usize::max_value();
        s
    }

    pub fn trigger(&mut self, syn: &SynthInstr) {
        self.vol_pc = 0;
        self.wf_pc = 0;
        self.vol_wait = 0;
        self.wf_wait = 0;
        self.vol_speed = if syn.vol_speed == 0 { 1 } else { syn.vol_speed };
        self.wf_speed = if syn.wf_speed == 0 { 1 } else { syn.wf_speed };
        self.vol_count = 0;
        self.wf_count = 0;
        self.vol_halted = false;
        self.wf_halted = false;
        self.vol_change = 0;
        self.volume = MAX_SYNTH_VOL;
        self.wf = 0;
        self.env_wf = usize::max_value();
        self.env_pos = 0;
        self.pitch_delta = 0.0;
        self.pitch_rate = 0.0;
    }

    /// Set the waveform sequence position (the synth jump effect).
    pub fn jump_waveform(&mut self, pos: usize) {
        self.wf_pc = pos;
        self.wf_halted = false;
        self.wf_wait = 0;
    }

    pub fn pitch_delta(&self) -> f64 {
        self.pitch_delta
    }

    /// The waveform index feeding envelope-table playback, when enabled.
    pub fn env_source(&self, syn: &SynthInstr) -> Option<usize> {
        if self.env_wf == usize::max_value() || self.env_wf >= syn.wf_samples.len() {
            None
        } else {
            Some(syn.wf_samples[self.env_wf])
        }
    }

    /// Advance the volume program one tick and return the current level.
    /// `env` carries the envelope waveform payload when enabled; its
    /// bytes replace the program level while it runs.
    pub fn tick_volume(&mut self, syn: &SynthInstr, env: Option<&[i8]>) -> isize {
        if let Some(data) = env {
            self.step_envelope(data);
        }

        self.volume += self.vol_change;
        if self.volume < 0 {
            self.volume = 0;
        }
        if self.volume > MAX_SYNTH_VOL {
            self.volume = MAX_SYNTH_VOL;
        }

        self.vol_count += 1;
        if self.vol_count < self.vol_speed || self.vol_halted {
            return self.volume
        }
        self.vol_count = 0;

        if self.vol_wait > 0 {
            self.vol_wait -= 1;
            return self.volume
        }

        let tbl = &syn.voltbl;
        for _ in 0..OP_GUARD {
            if self.vol_pc >= tbl.len() {
                self.vol_halted = true;
                break
            }
            let op = tbl[self.vol_pc];
            match op {
                0...0x7f => {
                    self.volume = if op as isize > MAX_SYNTH_VOL { MAX_SYNTH_VOL } else { op as isize };
                    self.vol_pc += 1;
                    break
                }
                SYN_END | SYN_HLT => {
                    self.vol_halted = true;
                    break
                }
                SYN_JMP => {
                    self.vol_pc = self.arg(tbl, self.vol_pc);
                }
                SYN_JXS => {
                    let t = self.arg(tbl, self.vol_pc);
                    self.wf_pc = t;
                    self.wf_halted = false;
                    self.vol_pc += 2;
                }
                SYN_SPD => {
                    let s = self.arg(tbl, self.vol_pc);
                    self.vol_speed = if s == 0 { 1 } else { s };
                    self.vol_pc += 2;
                }
                SYN_WAI => {
                    self.vol_wait = self.arg(tbl, self.vol_pc);
                    self.vol_pc += 2;
                    break
                }
                SYN_CHU => {
                    self.vol_change = self.arg(tbl, self.vol_pc) as isize;
                    self.vol_pc += 2;
                }
                SYN_CHD => {
                    self.vol_change = -(self.arg(tbl, self.vol_pc) as isize);
                    self.vol_pc += 2;
                }
                SYN_EN1 => {
                    self.env_wf = self.arg(tbl, self.vol_pc);
                    self.env_looped = false;
                    self.env_pos = 0;
                    self.vol_pc += 2;
                }
                SYN_EN2 => {
                    self.env_wf = self.arg(tbl, self.vol_pc);
                    self.env_looped = true;
                    self.env_pos = 0;
                    self.vol_pc += 2;
                }
                _ => {
                    self.vol_pc += 1;
                }
            }
        }

        self.volume
    }

    /// Advance the waveform program one tick. Returns the new waveform
    /// index when it changed.
    pub fn tick_waveform(&mut self, syn: &SynthInstr) -> Option<usize> {
        self.pitch_delta += self.pitch_rate;

        self.wf_count += 1;
        if self.wf_count < self.wf_speed || self.wf_halted {
            return None
        }
        self.wf_count = 0;

        if self.wf_wait > 0 {
            self.wf_wait -= 1;
            return None
        }

        let tbl = &syn.wftbl;
        let mut changed = None;

        for _ in 0..OP_GUARD {
            if self.wf_pc >= tbl.len() {
                self.wf_halted = true;
                break
            }
            let op = tbl[self.wf_pc];
            match op {
                0...0x7f => {
                    let w = op as usize;
                    if w < syn.wf_samples.len() && w != self.wf {
                        self.wf = w;
                        changed = Some(w);
                    }
                    self.wf_pc += 1;
                    break
                }
                SYN_END | SYN_HLT => {
                    self.wf_halted = true;
                    break
                }
                SYN_JMP => {
                    self.wf_pc = self.arg(tbl, self.wf_pc);
                }
                SYN_JXS => {
                    let t = self.arg(tbl, self.wf_pc);
                    self.vol_pc = t;
                    self.vol_halted = false;
                    self.wf_pc += 2;
                }
                SYN_SPD => {
                    let s = self.arg(tbl, self.wf_pc);
                    self.wf_speed = if s == 0 { 1 } else { s };
                    self.wf_pc += 2;
                }
                SYN_WAI => {
                    self.wf_wait = self.arg(tbl, self.wf_pc);
                    self.wf_pc += 2;
                    break
                }
                SYN_CHU => {
                    self.pitch_rate = -(self.arg(tbl, self.wf_pc) as f64);
                    self.wf_pc += 2;
                }
                SYN_CHD => {
                    self.pitch_rate = self.arg(tbl, self.wf_pc) as f64;
                    self.wf_pc += 2;
                }
                SYN_RES => {
                    self.pitch_delta = 0.0;
                    self.pitch_rate = 0.0;
                    self.wf_pc += 1;
                }
                _ => {
                    self.wf_pc += 1;
                }
            }
        }

        changed
    }

    // envelope table: waveform bytes replayed as a volume curve
    fn step_envelope(&mut self, data: &[i8]) {
        if data.is_empty() {
            return
        }
        if self.env_pos >= data.len() {
            if !self.env_looped {
                self.env_wf = usize::max_value();
                return
            }
            self.env_pos = 0;
        }
        self.volume = (data[self.env_pos] as isize + 128) / 4;
        self.env_pos += 1;
    }

    fn arg(&self, tbl: &[u8], pc: usize) -> usize {
        if pc + 1 < tbl.len() { tbl[pc + 1] as usize } else { 0 }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn synth(voltbl: Vec<u8>, wftbl: Vec<u8>) -> SynthInstr {
        let mut s = SynthInstr::new();
        s.vol_speed = 1;
        s.wf_speed = 1;
        s.voltbl = voltbl;
        s.wftbl = wftbl;
        s.wf_samples = vec![0, 1, 2, 3];
        s
    }

    #[test]
    fn test_set_level_consumes_one_step_per_tick() {
        let syn = synth(vec![10, 20, 30, SYN_END], vec![]);
        let mut st = SynthState::new();
        st.trigger(&syn);
        assert_eq!(st.tick_volume(&syn, None), 10);
        assert_eq!(st.tick_volume(&syn, None), 20);
        assert_eq!(st.tick_volume(&syn, None), 30);
        // END halts, level stays
        assert_eq!(st.tick_volume(&syn, None), 30);
        assert_eq!(st.tick_volume(&syn, None), 30);
    }

    #[test]
    fn test_infinite_jump_loop_is_bounded() {
        // JMP 0 at position 0 loops forever; the per-tick guard must cut
        // it short without advancing the level
        let syn = synth(vec![SYN_JMP, 0], vec![SYN_JMP, 0]);
        let mut st = SynthState::new();
        st.trigger(&syn);
        for _ in 0..10 {
            st.tick_volume(&syn, None);
            st.tick_waveform(&syn);
        }
    }

    #[test]
    fn test_wait_pauses_program() {
        let syn = synth(vec![40, SYN_WAI, 2, 10, SYN_END], vec![]);
        let mut st = SynthState::new();
        st.trigger(&syn);
        assert_eq!(st.tick_volume(&syn, None), 40);
        assert_eq!(st.tick_volume(&syn, None), 40);  // WAI consumed
        assert_eq!(st.tick_volume(&syn, None), 40);  // waiting
        assert_eq!(st.tick_volume(&syn, None), 40);  // waiting
        assert_eq!(st.tick_volume(&syn, None), 10);
    }

    #[test]
    fn test_change_down_applies_each_tick() {
        let syn = synth(vec![60, SYN_CHD, 5, SYN_HLT], vec![]);
        let mut st = SynthState::new();
        st.trigger(&syn);
        assert_eq!(st.tick_volume(&syn, None), 60);
        assert_eq!(st.tick_volume(&syn, None), 60);  // CHD and HLT execute
        assert_eq!(st.tick_volume(&syn, None), 55);
        assert_eq!(st.tick_volume(&syn, None), 50);
        for _ in 0..30 {
            st.tick_volume(&syn, None);
        }
        assert_eq!(st.volume, 0);  // clamped at silence
    }

    #[test]
    fn test_waveform_change_reported_once() {
        let syn = synth(vec![], vec![1, SYN_WAI, 2, 2, SYN_END]);
        let mut st = SynthState::new();
        st.trigger(&syn);
        assert_eq!(st.tick_waveform(&syn), Some(1));
        assert_eq!(st.tick_waveform(&syn), None);  // waiting
        assert_eq!(st.tick_waveform(&syn), None);
        assert_eq!(st.tick_waveform(&syn), None);
        assert_eq!(st.tick_waveform(&syn), Some(2));
        assert_eq!(st.tick_waveform(&syn), None);  // halted
    }

    #[test]
    fn test_cross_jump_restarts_other_program() {
        let syn = synth(vec![10, SYN_HLT], vec![SYN_JXS, 0, 1, SYN_END]);
        let mut st = SynthState::new();
        st.trigger(&syn);
        assert_eq!(st.tick_volume(&syn, None), 10);
        st.tick_volume(&syn, None);
        assert!(st.vol_halted);
        // the waveform program's JVS revives the volume program
        st.tick_waveform(&syn);
        assert!(!st.vol_halted);
    }

    #[test]
    fn test_program_speed_divides_ticks() {
        let mut syn = synth(vec![10, 20, SYN_END], vec![]);
        syn.vol_speed = 2;
        let mut st = SynthState::new();
        st.trigger(&syn);
        // level advances every other tick only
        assert_eq!(st.tick_volume(&syn, None), 64);
        assert_eq!(st.tick_volume(&syn, None), 10);
        assert_eq!(st.tick_volume(&syn, None), 10);
        assert_eq!(st.tick_volume(&syn, None), 20);
    }
}
