/// Playback defaults for one of the 63 instrument slots. A slot with no
/// sample payload and MIDI channel 0 is unused. Loop positions are kept
/// here rather than in the sample because the repeat region is an
/// instrument property in this model.
#[derive(Debug, Clone)]
pub struct Instrument {
    pub num          : usize,
    pub name         : String,
    pub volume       : usize,  // 0..=127
    pub transpose    : isize,
    pub finetune     : isize,  // -8..=7, eighths of a semitone
    pub hold         : usize,  // ticks before automatic note-off, 0 = sustain
    pub decay        : usize,  // fade speed applied after note-off
    pub default_pitch: u8,     // note number, 0 = none
    pub midi_ch      : usize,  // 0 = sample playback
    pub midi_preset  : usize,
    pub loop_start   : usize,  // frames
    pub loop_len     : usize,
    pub has_loop     : bool,
    pub loop_pingpong: bool,
    pub disabled     : bool,
    pub synth        : Option<SynthInstr>,
}

impl Instrument {
    pub fn new() -> Instrument {
        Instrument {
            num          : 0,
            name         : "".to_owned(),
            volume       : 64,
            transpose    : 0,
            finetune     : 0,
            hold         : 0,
            decay        : 0,
            default_pitch: 0,
            midi_ch      : 0,
            midi_preset  : 0,
            loop_start   : 0,
            loop_len     : 0,
            has_loop     : false,
            loop_pingpong: false,
            disabled     : false,
            synth        : None,
        }
    }

    pub fn is_midi(&self) -> bool {
        self.midi_ch != 0
    }
}


/// Synth instrument programs. `wf_samples` indexes the module sample list,
/// where the waveforms were flattened at load time; for a hybrid instrument
/// entry 0 is the slot's own recorded sample.
#[derive(Debug, Clone)]
pub struct SynthInstr {
    pub default_decay: usize,
    pub rep          : usize,
    pub replen       : usize,
    pub vol_speed    : usize,
    pub wf_speed     : usize,
    pub voltbl       : Vec<u8>,
    pub wftbl        : Vec<u8>,
    pub wf_samples   : Vec<usize>,
    pub hybrid       : bool,
}

impl SynthInstr {
    pub fn new() -> Self {
        SynthInstr {
            default_decay: 0,
            rep          : 0,
            replen       : 0,
            vol_speed    : 1,
            wf_speed     : 1,
            voltbl       : Vec::new(),
            wftbl        : Vec::new(),
            wf_samples   : Vec::new(),
            hybrid       : false,
        }
    }
}
