//! Per-position elapsed-time data, precomputed once after load by
//! dry-running the sequencer's tempo and break logic without producing
//! audio.

pub struct ScanData {
    pub time : Vec<u32>,  // milliseconds at the first visit of each position
    pub total: u32,       // total replay time in milliseconds
}

impl ScanData {
    pub fn new() -> Self {
        ScanData {
            time : Vec::new(),
            total: 0,
        }
    }
}
