pub mod position;
pub mod synth;
mod player;

pub use self::player::MedPlayer;

use format::med::MedData;
use module::Module;
use player::{PlayerInfo, PlayerListEntry, FormatPlayer};

pub struct Med;

impl PlayerListEntry for Med {
    fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id         : "med",
            name       : "OctaMED replayer",
            description: "A replayer for OctaMED MMD0/1/2/3 modules",
            author     : "oxmed project",
            accepts    : &["mmd"],
        }
    }

    fn player(&self, module: &Module) -> Box<FormatPlayer> {
        let data = module.data.as_any().downcast_ref::<MedData>().unwrap();
        Box::new(MedPlayer::new(data))
    }
}
