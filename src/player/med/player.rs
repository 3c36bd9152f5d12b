use std::cmp;
use format::med::{MedData, SubSong};
use module::ModuleData;
use module::event::{NOTE_NONE, NOTE_DEF, NOTE_11K, NOTE_22K, NOTE_44K, NOTE_STP, CmdEvent};
use player::{PlayerData, FormatPlayer};
use player::virt::Virtual;
use player::med::position::{PlayPos, SeqCmd, AdvanceMode};
use player::med::synth::SynthState;
use mixer::LoopType;
use util;
use ::*;

/// OctaMED replayer
///
/// Follows the OctaMED play routine structure: a tick counter gated by the
/// ticks-per-line setting, a note phase split into a pre-effect pass and a
/// trigger pass, and a continuous effect pass on every tick. Commands are
/// read from every command page of the current row and cached per channel,
/// so the play position is free to advance underneath a sounding row.

// effect commands
const CMD_ARPEGGIO      : u8 = 0x00;
const CMD_SLIDE_UP      : u8 = 0x01;
const CMD_SLIDE_DOWN    : u8 = 0x02;
const CMD_PORTAMENTO    : u8 = 0x03;
const CMD_VIBRATO       : u8 = 0x04;
const CMD_PORTA_VSLIDE  : u8 = 0x05;
const CMD_VIB_VSLIDE    : u8 = 0x06;
const CMD_TREMOLO       : u8 = 0x07;
const CMD_HOLD_DECAY    : u8 = 0x08;
const CMD_SPEED         : u8 = 0x09;
const CMD_POS_JUMP      : u8 = 0x0b;
const CMD_VOLUME        : u8 = 0x0c;
const CMD_VOLSLIDE      : u8 = 0x0d;
const CMD_SYNTH_JUMP    : u8 = 0x0e;
const CMD_TEMPO         : u8 = 0x0f;
const CMD_SLIDE_UP_1    : u8 = 0x11;
const CMD_SLIDE_DOWN_1  : u8 = 0x12;
const CMD_VIBRATO_SMALL : u8 = 0x13;
const CMD_FINETUNE      : u8 = 0x15;
const CMD_LOOP          : u8 = 0x16;
const CMD_NOTE_CUT      : u8 = 0x18;
const CMD_SAMPLE_OFS    : u8 = 0x19;
const CMD_VSLIDE_UP_1   : u8 = 0x1a;
const CMD_VSLIDE_DOWN_1 : u8 = 0x1b;
const CMD_BREAK_LINE    : u8 = 0x1d;
const CMD_BLOCK_DELAY   : u8 = 0x1e;
const CMD_DELAY_RETRIG  : u8 = 0x1f;
const CMD_SAMPLE_POS    : u8 = 0x20;
const CMD_FILTER_SWEEP  : u8 = 0x23;
const CMD_PANPOT        : u8 = 0x2e;

// 0x0f sub-commands
const TEMPO_BREAK      : u8 = 0x00;
const TEMPO_BPM_MAX    : u8 = 0xf0;
const TEMPO_STRIKE_2   : u8 = 0xf1;
const TEMPO_DELAY_HALF : u8 = 0xf2;
const TEMPO_STRIKE_3   : u8 = 0xf3;
const TEMPO_DELAY_3RD  : u8 = 0xf4;
const TEMPO_DELAY_2_3RD: u8 = 0xf5;
const TEMPO_FILTER_OFF : u8 = 0xf8;
const TEMPO_FILTER_ON  : u8 = 0xf9;
const TEMPO_SET_PITCH  : u8 = 0xfd;
const TEMPO_STOP_SONG  : u8 = 0xfe;
const TEMPO_STOP_NOTE  : u8 = 0xff;

const PERIOD_MIN: f64 = 113.0;
const PERIOD_MAX: f64 = 3424.0;

pub struct MedPlayer {
    state          : Vec<ChannelData>,
    pos            : PlayPos,
    speed          : u8,      // ticks per line
    counter        : u8,
    tempo          : usize,
    break_line     : Option<usize>,
    jump_pos       : Option<usize>,
    loop_line      : Option<usize>,
    patt_del_time  : u8,
    patt_del_time_2: u8,
    stop_pending   : bool,
    end_signal     : bool,
    filter_on      : bool,
    song_num       : usize,
    last_pos       : usize,
    cur_block      : usize,
    cur_line       : usize,
}

impl MedPlayer {
    pub fn new(module: &MedData) -> Self {
        let channels = module.channels();
        MedPlayer {
            state          : vec![ChannelData::new(); channels],
            pos            : PlayPos::new(),
            speed          : 6,
            counter        : 0,
            tempo          : 125,
            break_line     : None,
            jump_pos       : None,
            loop_line      : None,
            patt_del_time  : 0,
            patt_del_time_2: 0,
            stop_pending   : false,
            end_signal     : false,
            filter_on      : false,
            song_num       : 0,
            last_pos       : 0,
            cur_block      : 0,
            cur_line       : 0,
        }
    }

    fn tempo_bpm(song: &SubSong, value: usize) -> usize {
        if song.bpm_mode() {
            cmp::max(1, value)
        } else {
            // SoundTracker-compatible tempo, 33 plays at 125 BPM
            cmp::max(1, value * 125 / 33)
        }
    }

    fn process_row(&mut self, module: &MedData, song: &SubSong, virt: &mut Virtual) {
        self.pos.clamp(song);
        let block = match song.blocks.get(self.pos.block) {
            Some(b) => b,
            None    => return,
        };
        let line = self.pos.line;
        self.cur_block = self.pos.block;
        self.cur_line = line;

        // note phase; block accessors hand out empty cells past their
        // track count, so narrow blocks clear the remaining channels
        for chn in 0..self.state.len() {
            let e = block.event(line, chn);
            let st = &mut self.state[chn];

            st.cmds.clear();
            for page in 0..block.pages() {
                st.cmds.push(block.cmd(page, line, chn));
            }
            st.trigger_pending = false;
            st.delay_ticks = 0;
            st.retrig_interval = 0;

            if e.ins != 0 && e.ins as usize <= module.instruments.len() {
                let ins = &module.instruments[e.ins as usize - 1];
                if !ins.disabled {
                    st.prev_ins = st.curr_ins;
                    st.curr_ins = e.ins as usize;
                    st.def_volume = ins.volume as isize;
                    st.volume = ins.volume as isize;
                    st.finetune = ins.finetune;
                    st.transpose = ins.transpose;
                    st.hold_setting = ins.hold as isize;
                    st.decay_setting = ins.decay as isize;
                    st.is_midi = ins.is_midi();
                    st.is_synth = ins.synth.is_some();
                }
            }

            match e.note {
                NOTE_NONE => {
                    // an instrument with no pitch holds the ringing note
                    if e.ins != 0 {
                        st.hold = if st.hold_setting > 0 { st.hold_setting } else { -1 };
                        st.fade_speed = 0;
                    }
                }
                NOTE_STP => {
                    st.stop_note = true;
                }
                n => {
                    st.prev_note = st.curr_note;
                    st.curr_note = n;
                    st.trigger_pending = true;
                }
            }
        }

        // pre-effect pass: everything that must resolve before triggering
        for chn in 0..self.state.len() {
            let cmds = self.state[chn].cmds.clone();
            for c in &cmds {
                if !c.is_empty() {
                    self.pre_effect(chn, c, song, virt);
                }
            }
        }

        // trigger pass
        for chn in 0..self.state.len() {
            let st = &self.state[chn];
            if st.trigger_pending && st.delay_ticks == 0 {
                self.trigger_note(chn, module, song, virt);
            }
        }
    }

    fn pre_effect(&mut self, chn: usize, c: &CmdEvent, song: &SubSong, virt: &mut Virtual) {
        let speed = self.speed as usize;
        let st = &mut self.state[chn];

        match c.cmd {
            CMD_PORTAMENTO | CMD_PORTA_VSLIDE => {
                if st.trigger_pending {
                    // glide to the new note instead of retriggering
                    let note = effective_note(st.curr_note, st.transpose, song.playtransp as isize);
                    st.target_period = util::rate_to_period(util::note_to_rate(note, st.finetune));
                    st.trigger_pending = false;
                }
                if c.cmd == CMD_PORTAMENTO && c.data != 0 {
                    st.porta_speed = c.data as usize;
                }
            }
            CMD_HOLD_DECAY => {
                st.decay_setting = c.hi() as isize;
                st.hold_setting = c.lo() as isize;
            }
            CMD_SPEED => {
                if c.data >= 1 && c.data <= 0x20 {
                    self.speed = c.data;
                }
            }
            CMD_POS_JUMP => {
                self.jump_pos = Some(c.data as usize);
            }
            CMD_VOLUME => {
                if c.data & 0x80 != 0 {
                    st.def_volume = (c.data & 0x7f) as isize;
                    st.volume = st.def_volume;
                } else {
                    st.volume = cmp::min(c.data as isize, 127);
                }
            }
            CMD_TEMPO => match c.data {
                TEMPO_BREAK => {
                    self.break_line = Some(0);
                }
                v if v <= TEMPO_BPM_MAX => {
                    self.tempo = Self::tempo_bpm(song, v as usize);
                }
                TEMPO_DELAY_HALF => {
                    st.delay_ticks = speed / 2;
                }
                TEMPO_DELAY_3RD => {
                    st.delay_ticks = speed / 3;
                }
                TEMPO_DELAY_2_3RD => {
                    st.delay_ticks = 2 * speed / 3;
                }
                TEMPO_FILTER_OFF => {
                    self.filter_on = false;
                }
                TEMPO_FILTER_ON => {
                    self.filter_on = true;
                }
                TEMPO_SET_PITCH => {
                    if st.trigger_pending {
                        st.trigger_pending = false;
                        let note = effective_note(st.curr_note, st.transpose, song.playtransp as isize);
                        st.period = util::rate_to_period(util::note_to_rate(note, st.finetune));
                        st.target_period = 0.0;
                    }
                }
                TEMPO_STOP_SONG => {
                    self.stop_pending = true;
                }
                TEMPO_STOP_NOTE => {
                    st.stop_note = true;
                }
                _ => {}
            },
            CMD_FINETUNE => {
                let f = c.data as i8 as isize;
                st.finetune = cmp::max(-8, cmp::min(7, f));
            }
            CMD_LOOP => {
                if c.data == 0 {
                    st.loop_start_line = self.cur_line;
                } else {
                    if st.loop_count == 0 {
                        st.loop_count = c.data as usize;
                        self.loop_line = Some(st.loop_start_line);
                    } else {
                        st.loop_count -= 1;
                        if st.loop_count != 0 {
                            self.loop_line = Some(st.loop_start_line);
                        }
                    }
                }
            }
            CMD_SAMPLE_OFS => {
                st.sample_offset = c.arg16() as usize;
            }
            CMD_BREAK_LINE => {
                self.break_line = Some(c.data as usize);
            }
            CMD_BLOCK_DELAY => {
                self.patt_del_time = c.data;
            }
            CMD_DELAY_RETRIG => {
                st.delay_ticks = c.hi() as usize;
                st.retrig_interval = c.lo() as usize;
            }
            CMD_FILTER_SWEEP => {
                // target and speed are tracked; the audible sweep is not
                // applied
                st.cutoff_target = c.data as usize;
                st.cutoff_speed = c.data2 as usize;
            }
            CMD_PANPOT => {
                let p = c.data as i8 as isize;
                virt.set_pan(chn, cmp::max(-16, cmp::min(16, p)));
            }
            _ => {}
        }
    }

    fn trigger_note(&mut self, chn: usize, module: &MedData, song: &SubSong, virt: &mut Virtual) {
        let st = &mut self.state[chn];
        st.trigger_pending = false;

        if st.curr_ins == 0 || st.curr_ins > module.instruments.len() {
            return
        }
        let ins = &module.instruments[st.curr_ins - 1];

        // MIDI instruments are recognized but have no transport
        if ins.is_midi() {
            return
        }

        let rate = match st.curr_note {
            NOTE_DEF => {
                if ins.default_pitch != 0 {
                    util::note_to_rate(ins.default_pitch as usize, st.finetune)
                } else {
                    22050.0
                }
            }
            NOTE_11K => 11025.0,
            NOTE_22K => 22050.0,
            NOTE_44K => 44100.0,
            n => {
                let note = effective_note(n, st.transpose, song.playtransp as isize);
                util::note_to_rate(note, st.finetune)
            }
        };

        st.period = util::rate_to_period(rate);
        st.target_period = 0.0;
        st.vib_pos = 0;
        st.trem_pos = 0;
        st.fade_speed = 0;
        st.hold = if st.hold_setting > 0 { st.hold_setting } else { -1 };
        st.synth_vol = 64;

        match ins.synth {
            Some(ref syn) => {
                st.synth.trigger(syn);
                let wf = match syn.wf_samples.get(0) {
                    Some(&w) => w,
                    None     => return,
                };
                virt.trigger(chn, wf + 1, 0);
                if syn.hybrid && ins.has_loop {
                    let lt = if ins.loop_pingpong { LoopType::PingPong } else { LoopType::Normal };
                    virt.set_loop(chn, ins.loop_start, ins.loop_len, lt);
                } else if !syn.hybrid {
                    // synth waveforms ring continuously
                    let size = module.samples[wf].size;
                    virt.set_loop(chn, 0, size, LoopType::Normal);
                }
            }
            None => {
                let smp = &module.samples[st.curr_ins - 1];
                if smp.size == 0 {
                    return
                }
                let offset = if st.sample_offset < smp.size { st.sample_offset } else { 0 };
                virt.trigger(chn, st.curr_ins, offset);
                if ins.has_loop {
                    let lt = if ins.loop_pingpong { LoopType::PingPong } else { LoopType::Normal };
                    virt.set_loop(chn, ins.loop_start, ins.loop_len, lt);
                }
            }
        }

        virt.set_freq(chn, util::period_to_rate(st.period));
    }

    fn resolve_position(&mut self, song: &SubSong, block_mode: bool) {
        let mut stop_hit = false;
        {
            let handler = &mut |cmd: SeqCmd| {
                match cmd {
                    SeqCmd::Stop => {
                        stop_hit = true;
                        true
                    }
                }
            };

            let mode = if block_mode { AdvanceMode::Block } else { AdvanceMode::Song };

            if let Some(line) = self.loop_line.take() {
                self.break_line = None;
                self.jump_pos = None;
                self.pos.line = line;
                self.pos.clamp(song);
            } else if let Some(line) = self.break_line.take() {
                self.jump_pos = None;
                if block_mode {
                    self.pos.line = line;
                    self.pos.clamp(song);
                } else {
                    self.pos.pattern_break(song, line, handler);
                }
            } else if let Some(target) = self.jump_pos.take() {
                if block_mode {
                    self.pos.line = 0;
                } else {
                    self.pos.position_jump(song, target, 0, handler);
                }
            } else {
                self.pos.advance_row(song, mode, handler);
            }
        }

        if stop_hit {
            self.stop_pending = true;
        }
        if self.pos.take_end() {
            self.end_signal = true;
        }
    }

    fn play_effects_tick(&mut self, module: &MedData, song: &SubSong, virt: &mut Virtual) {
        let counter = self.counter as usize;

        for chn in 0..self.state.len() {
            // delayed note strike
            if self.state[chn].trigger_pending {
                let d = self.state[chn].delay_ticks;
                if d != 0 && counter == d {
                    self.trigger_note(chn, module, song, virt);
                }
            }

            {
                let st = &mut self.state[chn];

                if st.stop_note {
                    st.stop_note = false;
                    if st.decay_setting > 0 {
                        virt.release(chn);
                        st.fade_speed = st.decay_setting;
                    } else {
                        st.volume = 0;
                        virt.stop(chn);
                    }
                }

                // hold countdown, then note-off into the decay fade
                if st.hold > 0 {
                    st.hold -= 1;
                    if st.hold == 0 {
                        virt.release(chn);
                        st.fade_speed = st.decay_setting;
                    }
                }

                if st.fade_speed > 0 {
                    st.volume -= st.fade_speed;
                    if st.volume < 0 {
                        st.volume = 0;
                    }
                }

                st.vib_offset = 0.0;
                st.trem_offset = 0;
                st.arp_offset = 0;
            }

            // synth programs
            if self.state[chn].is_synth && self.state[chn].curr_ins != 0 {
                let ins = &module.instruments[self.state[chn].curr_ins - 1];
                if let Some(ref syn) = ins.synth {
                    let st = &mut self.state[chn];
                    let env = st.synth.env_source(syn)
                        .and_then(|i| module.samples.get(i))
                        .map(|s| s.data_8());
                    st.synth_vol = st.synth.tick_volume(syn, env);
                    if let Some(w) = st.synth.tick_waveform(syn) {
                        let smp = syn.wf_samples[w];
                        virt.set_sample(chn, smp + 1);
                        let size = module.samples[smp].size;
                        virt.set_loop(chn, 0, size, LoopType::Normal);
                    }
                }
            }

            // per-page continuous effects
            let cmds = self.state[chn].cmds.clone();
            let midi = self.state[chn].is_midi;
            for c in &cmds {
                if c.is_empty() {
                    continue
                }
                if midi && is_midi_cmd(c.cmd) {
                    continue
                }
                self.continuous_effect(chn, c, song, virt);
            }

            // push the resulting channel state to the voice
            let st = &mut self.state[chn];
            if st.period > 0.0 {
                let mut period = st.period + st.vib_offset + st.synth.pitch_delta();
                if st.arp_offset != 0 {
                    period /= 2.0_f64.powf(st.arp_offset as f64 / 12.0);
                }
                if period < 1.0 {
                    period = 1.0;
                }
                virt.set_freq(chn, util::period_to_rate(period));
            }

            let mut vol = st.volume + st.trem_offset;
            vol = cmp::max(0, cmp::min(127, vol));
            vol = vol * st.synth_vol as isize / 64;
            let trkvol = *song.trackvol.get(chn).unwrap_or(&64) as isize;
            vol = vol * cmp::min(trkvol, 64) / 64;
            virt.set_volume(chn, vol as usize);
        }
    }

    fn continuous_effect(&mut self, chn: usize, c: &CmdEvent, song: &SubSong, virt: &mut Virtual) {
        let counter = self.counter as usize;
        let speed = self.speed as usize;
        let st = &mut self.state[chn];

        match c.cmd {
            CMD_ARPEGGIO => {
                if c.data != 0 {
                    st.arp_offset = match counter % 3 {
                        1 => c.hi() as isize,
                        2 => c.lo() as isize,
                        _ => 0,
                    };
                }
            }
            CMD_SLIDE_UP => {
                if slide_tick(song, counter) {
                    st.period = clamp_period(st.period - c.data as f64);
                }
            }
            CMD_SLIDE_DOWN => {
                if slide_tick(song, counter) {
                    st.period = clamp_period(st.period + c.data as f64);
                }
            }
            CMD_PORTAMENTO => {
                if counter != 0 {
                    porta_step(st);
                }
            }
            CMD_PORTA_VSLIDE => {
                if counter != 0 {
                    porta_step(st);
                    vol_slide(st, c);
                }
            }
            CMD_VIBRATO => {
                vibrato(st, c, counter, false);
            }
            CMD_VIBRATO_SMALL => {
                vibrato(st, c, counter, true);
            }
            CMD_VIB_VSLIDE => {
                vibrato_step(st, false);
                if counter != 0 {
                    vol_slide(st, c);
                }
            }
            CMD_TREMOLO => {
                tremolo(st, c, counter);
            }
            CMD_VOLSLIDE => {
                if counter != 0 {
                    vol_slide(st, c);
                }
            }
            CMD_SYNTH_JUMP => {
                if counter == 0 {
                    st.synth.jump_waveform(c.data as usize);
                }
            }
            CMD_SLIDE_UP_1 => {
                if counter == 0 {
                    st.period = clamp_period(st.period - c.data as f64);
                }
            }
            CMD_SLIDE_DOWN_1 => {
                if counter == 0 {
                    st.period = clamp_period(st.period + c.data as f64);
                }
            }
            CMD_NOTE_CUT => {
                if counter == c.data as usize {
                    st.volume = 0;
                }
            }
            CMD_VSLIDE_UP_1 => {
                if counter == 0 {
                    st.volume = cmp::min(127, st.volume + c.data as isize);
                }
            }
            CMD_VSLIDE_DOWN_1 => {
                if counter == 0 {
                    st.volume = cmp::max(0, st.volume - c.data as isize);
                }
            }
            CMD_DELAY_RETRIG => {
                if st.retrig_interval != 0 && counter != 0 && counter % st.retrig_interval == 0 {
                    virt.set_voicepos(chn, 0);
                }
            }
            CMD_SAMPLE_POS => {
                if counter == 0 {
                    if c.arg16() == 0 {
                        virt.set_reverse(chn, true);
                    } else {
                        virt.set_voicepos(chn, c.arg16() as usize);
                    }
                }
            }
            CMD_TEMPO => match c.data {
                TEMPO_STRIKE_2 => {
                    if counter == speed / 2 && counter != 0 {
                        virt.set_voicepos(chn, 0);
                    }
                }
                TEMPO_STRIKE_3 => {
                    let n = cmp::max(1, speed / 3);
                    if counter != 0 && counter % n == 0 {
                        virt.set_voicepos(chn, 0);
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }
}

impl FormatPlayer for MedPlayer {
    fn start(&mut self, data: &mut PlayerData, mdata: &ModuleData, virt: &mut Virtual) {
        let module = mdata.as_any().downcast_ref::<MedData>().unwrap();
        if module.songs.is_empty() {
            return
        }
        let song = &module.songs[cmp::min(data.song, module.songs.len() - 1)];

        self.speed = cmp::max(1, cmp::min(32, song.tempo2)) as u8;
        self.tempo = Self::tempo_bpm(song, song.deftempo as usize);
        self.counter = self.speed - 1;  // first tick starts a row

        virt.set_mastervol(song.mastervol);
        if song.bpm_mode() {
            virt.set_tempo_factor(song.lines_per_beat() as f64 / 4.0);
        }
        for chn in 0..self.state.len() {
            let pan = *song.trackpan.get(chn).unwrap_or(&0) as isize;
            virt.set_pan(chn, if song.stereo { pan } else { 0 });
        }

        self.filter_on = song.flags & format::med::FLAG_FILTERON != 0;

        data.speed = self.speed as usize;
        data.tempo = self.tempo;
    }

    fn play(&mut self, data: &mut PlayerData, mdata: &ModuleData, virt: &mut Virtual) {
        let module = mdata.as_any().downcast_ref::<MedData>().unwrap();
        if module.songs.is_empty() {
            data.end = true;
            return
        }

        let song_num = cmp::min(data.song, module.songs.len() - 1);
        if song_num != self.song_num {
            self.song_num = song_num;
            self.pos = PlayPos::new();
            self.counter = self.speed - 1;
            self.last_pos = 0;
        }
        let song = &module.songs[song_num];

        // external seek
        if data.pos != self.last_pos {
            self.pos.set_linear(song, data.pos, &mut |_| false);
            self.counter = self.speed - 1;
            self.patt_del_time = 0;
            self.patt_del_time_2 = 0;
        }

        self.counter += 1;
        if self.counter >= self.speed {
            self.counter = 0;

            if self.patt_del_time_2 > 0 {
                // the row is held by a block delay
                self.patt_del_time_2 -= 1;
                if self.patt_del_time_2 == 0 {
                    self.resolve_position(song, data.block_mode);
                }
            } else {
                self.process_row(module, song, virt);
                if self.patt_del_time > 0 {
                    self.patt_del_time_2 = self.patt_del_time;
                    self.patt_del_time = 0;
                } else {
                    self.resolve_position(song, data.block_mode);
                }
            }
        }

        self.play_effects_tick(module, song, virt);

        if self.stop_pending {
            self.stop_pending = false;
            data.end = true;
        }
        if self.end_signal {
            self.end_signal = false;
            data.end = true;
        }

        data.row = self.cur_line;
        data.pos = self.pos.linear(song);
        self.last_pos = data.pos;
        data.frame = self.counter as usize;
        data.speed = self.speed as usize;
        data.tempo = self.tempo;
    }

    fn reset(&mut self) {
        let channels = self.state.len();
        self.state = vec![ChannelData::new(); channels];
        self.pos = PlayPos::new();
        self.speed = 6;
        self.counter = self.speed - 1;
        self.tempo = 125;
        self.break_line = None;
        self.jump_pos = None;
        self.loop_line = None;
        self.patt_del_time = 0;
        self.patt_del_time_2 = 0;
        self.stop_pending = false;
        self.end_signal = false;
        self.song_num = 0;
        self.last_pos = 0;
        self.cur_block = 0;
        self.cur_line = 0;
    }
}


fn effective_note(note: u8, transpose: isize, playtransp: isize) -> usize {
    let n = note as isize + transpose + playtransp;
    cmp::max(1, cmp::min(127, n)) as usize
}

fn clamp_period(period: f64) -> f64 {
    if period < PERIOD_MIN {
        PERIOD_MIN
    } else if period > PERIOD_MAX {
        PERIOD_MAX
    } else {
        period
    }
}

// slides step every tick unless the song uses once-per-line slides
fn slide_tick(song: &SubSong, counter: usize) -> bool {
    if song.slow_slides() {
        counter == 0
    } else {
        counter != 0
    }
}

fn porta_step(st: &mut ChannelData) {
    if st.target_period <= 0.0 {
        return
    }
    let speed = st.porta_speed as f64;
    if st.period > st.target_period {
        st.period -= speed;
        if st.period <= st.target_period {
            st.period = st.target_period;
            st.target_period = 0.0;
        }
    } else {
        st.period += speed;
        if st.period >= st.target_period {
            st.period = st.target_period;
            st.target_period = 0.0;
        }
    }
}

fn vol_slide(st: &mut ChannelData, c: &CmdEvent) {
    st.volume += c.hi() as isize - c.lo() as isize;
    st.volume = cmp::max(0, cmp::min(127, st.volume));
}

fn vibrato(st: &mut ChannelData, c: &CmdEvent, counter: usize, shallow: bool) {
    if counter == 0 {
        // argument nibbles persist while non-zero
        if c.lo() != 0 {
            st.vib_cmd = (st.vib_cmd & 0xf0) | c.lo();
        }
        if c.hi() != 0 {
            st.vib_cmd = (st.vib_cmd & 0x0f) | (c.hi() << 4);
        }
    }
    vibrato_step(st, shallow);
}

fn vibrato_step(st: &mut ChannelData, shallow: bool) {
    let pos = ((st.vib_pos >> 2) & 0x1f) as usize;
    let val = SINE_TABLE[pos] as f64;
    let depth = (st.vib_cmd & 0x0f) as f64;
    let amt = val * depth / if shallow { 256.0 } else { 128.0 };

    st.vib_offset = if st.vib_pos & 0x80 == 0 { amt } else { -amt };
    st.vib_pos = st.vib_pos.wrapping_add((st.vib_cmd >> 2) & 0x3c);
}

fn tremolo(st: &mut ChannelData, c: &CmdEvent, counter: usize) {
    if counter == 0 {
        if c.lo() != 0 {
            st.trem_cmd = (st.trem_cmd & 0xf0) | c.lo();
        }
        if c.hi() != 0 {
            st.trem_cmd = (st.trem_cmd & 0x0f) | (c.hi() << 4);
        }
    }

    let pos = ((st.trem_pos >> 2) & 0x1f) as usize;
    let val = SINE_TABLE[pos] as isize;
    let depth = (st.trem_cmd & 0x0f) as isize;
    let amt = (val * depth) >> 6;

    st.trem_offset = if st.trem_pos & 0x80 == 0 { amt } else { -amt };
    st.trem_pos = st.trem_pos.wrapping_add((st.trem_cmd >> 2) & 0x3c);
}

// commands that address the MIDI side of an instrument and bypass the
// sample-channel handling
fn is_midi_cmd(cmd: u8) -> bool {
    match cmd {
        CMD_PORTAMENTO | CMD_VIBRATO | CMD_PORTA_VSLIDE | CMD_VOLUME |
        CMD_VOLSLIDE | CMD_DELAY_RETRIG | CMD_PANPOT => true,
        _ => false,
    }
}


#[derive(Clone, Default)]
struct ChannelData {
    curr_note      : u8,
    prev_note      : u8,
    curr_ins       : usize,  // instrument slot + 1; 0 = none
    prev_ins       : usize,
    cmds           : Vec<CmdEvent>,  // this row's commands, one per page
    period         : f64,
    target_period  : f64,    // portamento goal; 0 = none
    porta_speed    : usize,
    arp_offset     : isize,
    vib_cmd        : u8,
    vib_pos        : u8,
    vib_offset     : f64,
    trem_cmd       : u8,
    trem_pos       : u8,
    trem_offset    : isize,
    volume         : isize,  // 0..=127
    def_volume     : isize,
    synth_vol      : isize,  // 0..=64
    finetune       : isize,
    transpose      : isize,
    hold           : isize,  // remaining ticks; -1 = sustain
    hold_setting   : isize,
    decay_setting  : isize,
    fade_speed     : isize,
    delay_ticks    : usize,
    retrig_interval: usize,
    sample_offset  : usize,
    loop_start_line: usize,
    loop_count     : usize,
    cutoff_target  : usize,  // tracked, not applied
    cutoff_speed   : usize,
    synth          : SynthState,
    is_synth       : bool,
    is_midi        : bool,
    trigger_pending: bool,
    stop_note      : bool,
}

impl ChannelData {
    pub fn new() -> Self {
        let mut st: ChannelData = Default::default();
        st.synth = SynthState::new();
        st.synth_vol = 64;
        st
    }
}


static SINE_TABLE: &'static [u8] = &[
      0,  24,  49,  74,  97, 120, 141, 161,
    180, 197, 212, 224, 235, 244, 250, 253,
    255, 253, 250, 244, 235, 224, 212, 197,
    180, 161, 141, 120,  97,  74,  49,  24
];


#[cfg(test)]
mod tests {
    use super::*;
    use format::med::{Block, MedData, PlaySeq, PlaySeqEntry, SubSong, FLAG2_BPM, FLAG2_MIX};
    use module::event::NoteEvent;
    use module::{Instrument, Sample};

    fn test_data(note: u8, default_pitch: u8) -> MedData {
        let mut samples = Vec::new();
        for i in 0..MAX_INSTR {
            let mut s = Sample::new();
            s.num = i + 1;
            samples.push(s);
        }
        let pcm = (0..1000).map(|x| (x * 7) as u8).collect::<Vec<u8>>();
        samples[0].store(&pcm);

        let mut instruments = Vec::new();
        for i in 0..MAX_INSTR {
            let mut ins = Instrument::new();
            ins.num = i;
            instruments.push(ins);
        }
        instruments[0].volume = 127;
        instruments[0].default_pitch = default_pitch;

        let mut song = SubSong::new();
        song.numtracks = 4;
        song.flags2 = FLAG2_BPM | FLAG2_MIX | 0x03;  // 4 lines per beat
        song.deftempo = 125;
        song.tempo2 = 6;
        song.trackvol = vec![64; 4];
        song.trackpan = vec![0; 4];

        let mut block = Block::new(4, 4);
        block.set_event(0, 0, NoteEvent{note, ins: 1});
        song.blocks.push(block);
        song.blocks.push(Block::new(4, 4));
        song.playseqs.push(PlaySeq{name: "".to_owned(), entries: vec![
            PlaySeqEntry::Block(0), PlaySeqEntry::Block(1)]});
        song.sections = vec![0];

        MedData {
            song_name  : "test".to_owned(),
            annotation : "".to_owned(),
            songs      : vec![song],
            instruments,
            samples,
        }
    }

    fn run_ticks(md: &MedData, ticks: usize) -> (MedPlayer, PlayerData, Virtual) {
        let mut virt = Virtual::new(4, md.samples());
        let mut p = MedPlayer::new(md);
        let mut data = PlayerData::new();
        p.start(&mut data, md, &mut virt);
        for _ in 0..ticks {
            p.play(&mut data, md, &mut virt);
        }
        (p, data, virt)
    }

    #[test]
    fn test_note_plays_at_pitch() {
        let md = test_data(36, 0);
        let (_, _, virt) = run_ticks(&md, 1);
        let f = virt.frequency(0);
        assert!((f - 8363.0).abs() < 1.0);
        assert!(virt.is_active(0) || virt.voicepos(0) == 0);
    }

    #[test]
    fn test_default_pitch_sentinel_falls_back_to_22k() {
        let md = test_data(NOTE_DEF, 0);
        let (_, _, virt) = run_ticks(&md, 1);
        assert!((virt.frequency(0) - 22050.0).abs() < 0.001);
    }

    #[test]
    fn test_default_pitch_sentinel_uses_instrument_pitch() {
        let md = test_data(NOTE_DEF, 48);
        let (_, _, virt) = run_ticks(&md, 1);
        let f = virt.frequency(0);
        assert!((f - 16726.0).abs() < 2.0);
    }

    #[test]
    fn test_fixed_rate_sentinels() {
        for (note, rate) in [(NOTE_11K, 11025.0), (NOTE_22K, 22050.0), (NOTE_44K, 44100.0)].iter() {
            let md = test_data(*note, 0);
            let (_, _, virt) = run_ticks(&md, 1);
            assert!((virt.frequency(0) - *rate).abs() < 0.001);
        }
    }

    #[test]
    fn test_row_and_position_progress() {
        let md = test_data(36, 0);
        // 6 ticks per line, 4 lines per block: 24 ticks move one position
        let (_, data, _) = run_ticks(&md, 25);
        assert_eq!(data.pos, 1);
    }

    #[test]
    fn test_zero_command_pages_tolerated() {
        let mut md = test_data(36, 0);
        md.songs[0].blocks[0].resize_pages(0);
        let (_, _, virt) = run_ticks(&md, 30);
        // no command cells at all: the effect passes run zero iterations
        assert!(virt.frequency(0) > 0.0);
    }

    #[test]
    fn test_speed_command_changes_row_length() {
        let mut md = test_data(36, 0);
        md.songs[0].blocks[0].set_cmd(0, 0, 1, CmdEvent{cmd: CMD_SPEED, data: 3, data2: 0});
        // 3 ticks per line after the first row is read
        let (_, data, _) = run_ticks(&md, 13);
        assert_eq!(data.speed, 3);
        assert_eq!(data.pos, 1);
    }

    #[test]
    fn test_position_jump_flags_end() {
        let mut md = test_data(36, 0);
        // jump back to position 0 at the first row
        md.songs[0].blocks[0].set_cmd(0, 0, 1, CmdEvent{cmd: CMD_POS_JUMP, data: 0, data2: 0});
        let mut virt = Virtual::new(4, md.samples());
        let mut p = MedPlayer::new(&md);
        let mut data = PlayerData::new();
        p.start(&mut data, &md, &mut virt);
        p.play(&mut data, &md, &mut virt);
        assert!(data.end);
    }

    #[test]
    fn test_stop_song_command() {
        let mut md = test_data(36, 0);
        md.songs[0].blocks[0].set_cmd(0, 0, 1, CmdEvent{cmd: CMD_TEMPO, data: 0xfe, data2: 0});
        let mut virt = Virtual::new(4, md.samples());
        let mut p = MedPlayer::new(&md);
        let mut data = PlayerData::new();
        p.start(&mut data, &md, &mut virt);
        p.play(&mut data, &md, &mut virt);
        assert!(data.end);
    }

    #[test]
    fn test_volume_command_applied() {
        let mut md = test_data(36, 0);
        md.songs[0].blocks[0].set_cmd(0, 0, 0, CmdEvent{cmd: CMD_VOLUME, data: 0x20, data2: 0});
        let (p, _, _) = run_ticks(&md, 1);
        assert_eq!(p.state[0].volume, 0x20);
    }

    #[test]
    fn test_portamento_suppresses_retrigger_and_converges() {
        let mut md = test_data(36, 0);
        md.songs[0].blocks[0].set_event(1, 0, NoteEvent{note: 48, ins: 0});
        md.songs[0].blocks[0].set_cmd(0, 1, 0, CmdEvent{cmd: CMD_PORTAMENTO, data: 0xff, data2: 0});
        // run into row 1 and give the slide time to converge
        let (p, _, virt) = run_ticks(&md, 6 * 4);
        assert_eq!(p.state[0].target_period, 0.0);
        let f = virt.frequency(0);
        assert!((f - 16726.0).abs() < 10.0);
    }

    #[test]
    fn test_note_cut_at_tick() {
        let mut md = test_data(36, 0);
        md.songs[0].blocks[0].set_cmd(0, 0, 0, CmdEvent{cmd: CMD_NOTE_CUT, data: 3, data2: 0});
        let (p, _, _) = run_ticks(&md, 2);
        assert!(p.state[0].volume > 0);
        let (p, _, _) = run_ticks(&md, 4);
        assert_eq!(p.state[0].volume, 0);
    }

    #[test]
    fn test_filter_sweep_tracks_state_only() {
        let mut md = test_data(36, 0);
        md.songs[0].blocks[0].set_cmd(0, 0, 0, CmdEvent{cmd: CMD_FILTER_SWEEP, data: 0x42, data2: 0x07});
        let before_freq;
        {
            let md2 = test_data(36, 0);
            let (_, _, virt) = run_ticks(&md2, 3);
            before_freq = virt.frequency(0);
        }
        let (p, _, virt) = run_ticks(&md, 3);
        assert_eq!(p.state[0].cutoff_target, 0x42);
        assert_eq!(p.state[0].cutoff_speed, 0x07);
        // no audible change
        assert_eq!(virt.frequency(0), before_freq);
    }

    #[test]
    fn test_block_delay_holds_row() {
        let mut md = test_data(36, 0);
        md.songs[0].blocks[0].set_cmd(0, 0, 1, CmdEvent{cmd: CMD_BLOCK_DELAY, data: 2, data2: 0});
        // row 0 is played three times over: 18 ticks later we are still
        // on the first position, row 1 not yet reached
        let (p, data, _) = run_ticks(&md, 13);
        assert_eq!(data.pos, 0);
        assert_eq!(p.cur_line, 0);
    }
}
