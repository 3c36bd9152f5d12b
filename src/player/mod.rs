pub mod virt;
mod scan;
mod med;

pub use player::virt::Virtual;
pub use mixer::Mixer;

use std::cmp;
use module::{Module, ModuleData};
use player::scan::ScanData;
use ::*;

// scan safety cap: corrupt playlists must not hang the load path
const MAX_SCAN_TICKS: usize = 10_000_000;

// For the player list

pub struct PlayerInfo {
    pub id         : &'static str,
    pub name       : &'static str,
    pub description: &'static str,
    pub author     : &'static str,
    pub accepts    : &'static [&'static str],
}

pub trait PlayerListEntry {
    fn info(&self) -> PlayerInfo;
    fn player(&self, module: &Module) -> Box<FormatPlayer>;
}

pub fn list() -> Vec<Box<PlayerListEntry>> {
    vec![
        Box::new(med::Med),
    ]
}

pub fn list_by_id(player_id: &str) -> Result<Box<PlayerListEntry>, Error> {
    for p in list() {
        if player_id == p.info().id {
            return Ok(p)
        }
    }
    Err(Error::Format("player not found".to_owned()))
}


// Trait for format-specific players

pub trait FormatPlayer: Send + Sync {
    fn start(&mut self, &mut PlayerData, &ModuleData, &mut Virtual);
    fn play(&mut self, &mut PlayerData, &ModuleData, &mut Virtual);
    fn reset(&mut self);
}

#[derive(Default)]
pub struct PlayerData {
    pub pos       : usize,
    pub row       : usize,
    pub frame     : usize,
    pub song      : usize,
    pub speed     : usize,
    pub tempo     : usize,
    pub block_mode: bool,  // isolated block preview, no sequence advance
    pub end       : bool,

    initial_speed: usize,
    initial_tempo: usize,
}

impl PlayerData {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.row = 0;
        self.frame = 0;
        self.song = 0;
        self.speed = self.initial_speed;
        self.tempo = self.initial_tempo;
        self.end = false;
    }
}


pub struct Player<'a> {
    pub data     : PlayerData,
    module       : &'a Module,
    format_player: Box<FormatPlayer>,
    virt         : Virtual<'a>,
    loop_count   : usize,
    end          : bool,
    scan_data    : ScanData,

    // for buffer fill
    consumed     : usize,
    in_size      : usize,
}

impl<'a> Player<'a> {
    pub fn find(module: &'a Module, player_id: &str) -> Result<Self, Error> {
        let format_player = list_by_id(player_id)?.player(&module);
        let channels = cmp::min(module.data.channels(), MAX_TRACKS);
        let virt = Virtual::new(channels, module.data.samples());

        Ok(Player {
            data      : PlayerData::new(),
            module,
            format_player,
            virt,
            loop_count: 0,
            end       : false,
            scan_data : ScanData::new(),
            consumed  : 0,
            in_size   : 0,
        })
    }

    pub fn set_rate(&mut self, rate: u32) -> &mut Self {
        self.virt.set_rate(cmp::max(MIN_RATE as u32, cmp::min(MAX_RATE as u32, rate)));
        self
    }

    pub fn set_interpolator(&mut self, interp: mixer::interpolator::Interpolator) -> &mut Self {
        self.virt.set_interpolator(interp);
        self
    }

    pub fn enable_boost(&mut self, boost: bool) -> &mut Self {
        self.virt.enable_boost(boost);
        self
    }

    pub fn start(&mut self) -> &mut Self {
        self.data.reset();
        self.format_player.start(&mut self.data, &*self.module.data, &mut self.virt);
        self.data.initial_speed = self.data.speed;
        self.data.initial_tempo = self.data.tempo;
        self.scan();
        self
    }

    /// Dry-run the sequencer once to build the position time table, then
    /// rewind to the start.
    fn scan(&mut self) {
        let len = cmp::max(1, self.module.data.len(self.data.song));
        let mut time = vec![0_u32; len];
        let mut visited = vec![false; len];
        let factor = self.virt.tempo_factor();

        let mut ms = 0.0_f64;
        let mut ticks = 0;
        loop {
            let p = self.data.pos;
            if p < len && !visited[p] {
                visited[p] = true;
                time[p] = ms as u32;
            }

            self.format_player.play(&mut self.data, &*self.module.data, &mut self.virt);
            ms += 2500.0 / (cmp::max(1, self.data.tempo) as f64 * factor);

            ticks += 1;
            if self.data.end || ticks >= MAX_SCAN_TICKS {
                break
            }
        }

        let total = ms as u32;
        for i in 1..len {
            if time[i] < time[i - 1] {
                time[i] = time[i - 1];
            }
        }
        time[len - 1] = total;
        self.scan_data = ScanData{time, total};

        // rewind for real playback
        let song = self.data.song;
        self.format_player.reset();
        self.virt.reset();
        self.data.reset();
        self.data.song = song;
        self.format_player.start(&mut self.data, &*self.module.data, &mut self.virt);
    }

    pub fn total_time(&self) -> u32 {
        self.scan_data.total
    }

    /// Elapsed milliseconds at the given linear position.
    pub fn time_at(&self, pos: usize) -> u32 {
        match self.scan_data.time.get(pos) {
            Some(&t) => t,
            None     => self.scan_data.total,
        }
    }

    pub fn play_frame(&mut self) -> &mut Self {
        self.format_player.play(&mut self.data, &*self.module.data, &mut self.virt);
        if self.data.end {
            self.data.end = false;
            self.loop_count += 1;
            self.end = true;
        }
        self.virt.set_tempo(self.data.tempo);
        self.virt.mix();
        self
    }

    pub fn fill_buffer(&mut self, out_buffer: &mut [i16], loops: usize) {
        let mut filled = 0;
        let size = out_buffer.len();

        while filled < size {
            if self.consumed == self.in_size {
                self.play_frame();

                // check end of module
                if self.end && loops > 0 && self.loop_count >= loops {
                    for x in out_buffer[filled..].iter_mut() {
                        *x = 0;
                    }
                    return;
                }
                self.end = false;

                self.consumed = 0;
                self.in_size = self.buffer().len();
            }

            let copy_size = cmp::min(size - filled, self.in_size - self.consumed);
            out_buffer[filled..filled + copy_size]
                .copy_from_slice(&self.buffer()[self.consumed..self.consumed + copy_size]);
            self.consumed += copy_size;
            filled += copy_size;
        }
    }

    pub fn end(&self) -> bool {
        self.end
    }

    pub fn loop_count(&self) -> usize {
        self.loop_count
    }

    pub fn info(&mut self, info: &mut FrameInfo) -> &mut Self {
        info.pos = self.data.pos;
        info.row = self.data.row;
        info.song = self.data.song;
        info.frame = self.data.frame;
        info.speed = self.data.speed;
        info.tempo = self.data.tempo;
        self
    }

    pub fn position(&self) -> usize {
        self.data.pos
    }

    pub fn row(&self) -> usize {
        self.data.row
    }

    pub fn song(&self) -> usize {
        self.data.song
    }

    pub fn num_positions(&self) -> usize {
        self.module.data.len(self.data.song)
    }

    pub fn set_position(&mut self, pos: usize) -> &mut Self {
        self.data.pos = pos;
        self.data.row = 0;
        self.data.frame = 0;
        self
    }

    pub fn set_song(&mut self, song: usize) -> &mut Self {
        self.data.song = song;
        self
    }

    pub fn set_block_mode(&mut self, block_mode: bool) -> &mut Self {
        self.data.block_mode = block_mode;
        self
    }

    pub fn buffer(&self) -> &[i16] {
        self.virt.buffer()
    }
}


#[derive(Default)]
pub struct FrameInfo {
    pub pos  : usize,
    pub row  : usize,
    pub frame: usize,
    pub song : usize,
    pub tempo: usize,
    pub speed: usize,
}

impl FrameInfo {
    pub fn new() -> Self {
        Default::default()
    }
}
