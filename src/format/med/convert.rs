use format::med::{SubSong, FLAG2_BPM, FLAG2_MIX, FLAG3_STEREO, FLAG_VOLHEX};
use module::Instrument;
use module::event::CmdEvent;

// pan template forced on the first 8 tracks of legacy 4/8-channel songs
const PAN_TEMPLATE : [i8; 8] = [-16, 16, 16, -16, -16, 16, 16, -16];

// old discrete tempo index to BPM; everything past the table is 99
const OLD_TEMPO_BPM: [u16; 9] = [240, 120, 80, 60, 48, 40, 34, 30, 26];

const CMD_VOLUME   : u8 = 0x0c;


// One rewrite strategy per conversion, driven through a single
// walk-every-cell traversal.

trait CellPass {
    fn command(&mut self, cmd: &mut CmdEvent);
}

fn walk_cells<P: CellPass>(song: &mut SubSong, pass: &mut P) {
    for block in &mut song.blocks {
        for page in 0..block.pages() {
            for line in 0..block.lines {
                for track in 0..block.numtracks {
                    let mut c = block.cmd(page, line, track);
                    pass.command(&mut c);
                    block.set_cmd(page, line, track, c);
                }
            }
        }
    }
}


/// Remaps legacy volume-set arguments from the 0..=64 scale (decimal
/// coded unless the song uses hex volumes) to 0..=127.
struct OldVolumePass {
    hex: bool,
}

impl CellPass for OldVolumePass {
    fn command(&mut self, c: &mut CmdEvent) {
        if c.cmd != CMD_VOLUME {
            return
        }
        if c.data & 0x80 != 0 {
            // set-default-instrument-volume form, not a level
            return
        }

        let mut v = c.data;
        if !self.hex {
            v = (v >> 4) * 10 + (v & 0x0f);
        }
        if v > 64 {
            v = 64;
        }
        c.data = if v == 0 { 0 } else { v * 2 - 1 };
    }
}


/// Normalize a song using the old 4/8-channel conventions into the mixing
/// model the sequencer expects. Runs at most once per song: converted
/// songs carry the mix flag and return immediately.
pub fn normalize(song: &mut SubSong) {
    if song.mix_mode() {
        return
    }

    // forced stereo and the fixed L/R/R/L panning template
    song.stereo = true;
    song.flags3 |= FLAG3_STEREO;
    if song.trackpan.len() < song.numtracks {
        song.trackpan.resize(song.numtracks, 0);
    }
    for i in 0..song.numtracks {
        if i >= 8 {
            break
        }
        song.trackpan[i] = PAN_TEMPLATE[i];
    }

    // discrete tempo index to BPM
    if !song.bpm_mode() {
        let t = song.deftempo;
        song.deftempo = if t >= 1 && t <= 9 {
            OLD_TEMPO_BPM[t as usize - 1]
        } else {
            99
        };
        song.flags2 |= FLAG2_BPM;
    }

    walk_cells(song, &mut OldVolumePass{hex: song.flags & FLAG_VOLHEX != 0});

    song.flags2 |= FLAG2_MIX;
}

/// Legacy songs play two octaves down: shift the instrument defaults up.
/// Sample instruments get the broken 4-channel kludge applied to their
/// default pitch, pulling notes back while they would exceed the third
/// octave.
pub fn normalize_instruments(instruments: &mut Vec<Instrument>) {
    for ins in instruments.iter_mut() {
        let v = if ins.volume > 64 { 64 } else { ins.volume };
        ins.volume = if v == 0 { 0 } else { v * 2 - 1 };

        ins.transpose += 24;

        if !ins.is_midi() && ins.default_pitch != 0 {
            let mut n = ins.default_pitch as isize + 24;
            while n > 36 {
                n -= 12;
            }
            ins.default_pitch = n as u8;
        }
    }
}
