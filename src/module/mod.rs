pub mod event;
pub mod instrument;
pub mod sample;

pub use self::event::{NoteEvent, CmdEvent};
pub use self::instrument::Instrument;
pub use self::sample::Sample;

use std::any::Any;
use std::fmt;

#[derive(Debug)]
pub struct Module {
    pub format_id  : &'static str,
    pub description: String,
    pub creator    : String,
    pub player     : &'static str,
    pub data       : Box<ModuleData>,
}

impl Module {
    pub fn title(&self) -> &str {
        self.data.title()
    }
}


// Trait for format-specific module data. The player downcasts this to its
// native representation; hosts use the accessors below for browsing.

pub trait ModuleData: Send + Sync {
    fn as_any(&self) -> &Any;
    fn title(&self) -> &str;
    fn channels(&self) -> usize;
    fn num_songs(&self) -> usize;
    fn len(&self, song: usize) -> usize;        // number of playable positions
    fn blocks(&self, song: usize) -> usize;
    fn rows(&self, song: usize, block: usize) -> usize;
    fn instruments(&self) -> &Vec<Instrument>;
    fn samples(&self) -> &Vec<Sample>;
}

impl fmt::Debug for ModuleData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "title: {:?}, channels: {}, songs: {}", self.title(),
               self.channels(), self.num_songs())
    }
}
