use format::med::{SubSong, PlaySeqEntry};

// runaway guards for malformed playlists
const MAX_JUMPS    : usize = 10;  // chained jump redirects per resolution
const MAX_ROLLOVERS: usize = 3;   // section rollovers per lookup

/// Play sequence control commands offered to the injected handler. The
/// handler returns true when it consumes the command; either way the
/// resolver advances past the entry.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SeqCmd {
    Stop,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum AdvanceMode {
    Song,   // normal playback, sequence advances on block overflow
    Block,  // isolated block preview, wrap within the block
}

/// The nested play position. Every transition funnels through
/// `goto_seqpos`, which re-clamps each field and resolves control
/// entries, so the tuple is never left dangling out of bounds.
#[derive(Clone, Default)]
pub struct PlayPos {
    pub section: usize,
    pub pseq   : usize,
    pub seqpos : usize,
    pub block  : usize,
    pub line   : usize,
    end_reached: bool,
}

impl PlayPos {
    pub fn new() -> Self {
        Default::default()
    }

    /// Take the sticky end-of-song flag, clearing it.
    pub fn take_end(&mut self) -> bool {
        let e = self.end_reached;
        self.end_reached = false;
        e
    }

    /// Linear position over all sections, for hosts and the time table.
    pub fn linear(&self, song: &SubSong) -> usize {
        let mut n = 0;
        for s in 0..self.section {
            if s >= song.sections.len() {
                break
            }
            let ps = song.sections[s] as usize;
            n += song.playseqs.get(ps).map_or(0, |p| p.entries.len());
        }
        n + self.seqpos
    }

    /// Seek to a linear position.
    pub fn set_linear<F>(&mut self, song: &SubSong, pos: usize, handler: &mut F)
    where F: FnMut(SeqCmd) -> bool
    {
        let mut rem = pos;
        for (s, &ps) in song.sections.iter().enumerate() {
            let len = song.playseqs.get(ps as usize).map_or(0, |p| p.entries.len());
            if rem < len {
                self.section = s;
                self.goto_seqpos(song, rem, handler);
                self.line = 0;
                return
            }
            rem -= len;
        }

        self.section = 0;
        self.goto_seqpos(song, 0, handler);
        self.line = 0;
    }

    /// Normal tick-to-tick row advance.
    pub fn advance_row<F>(&mut self, song: &SubSong, mode: AdvanceMode, handler: &mut F)
    where F: FnMut(SeqCmd) -> bool
    {
        self.clamp(song);
        self.line += 1;
        let lines = song.blocks.get(self.block).map_or(1, |b| b.lines);
        if self.line >= lines {
            self.line = 0;
            if mode == AdvanceMode::Song {
                let next = self.seqpos + 1;
                self.goto_seqpos(song, next, handler);
            }
        }
    }

    /// Forced sequence advance with a caller-supplied continuation line.
    pub fn pattern_break<F>(&mut self, song: &SubSong, line: usize, handler: &mut F)
    where F: FnMut(SeqCmd) -> bool
    {
        self.clamp(song);
        let next = self.seqpos + 1;
        self.goto_seqpos(song, next, handler);
        self.set_line(song, line);
    }

    /// Jump to a caller-supplied sequence position. A backward or self
    /// jump means the song is looping rather than progressing: it raises
    /// the sticky end flag.
    pub fn position_jump<F>(&mut self, song: &SubSong, target: usize, line: usize, handler: &mut F)
    where F: FnMut(SeqCmd) -> bool
    {
        self.clamp(song);
        if target <= self.seqpos {
            self.end_reached = true;
        }
        self.goto_seqpos(song, target, handler);
        self.set_line(song, line);
    }

    fn set_line(&mut self, song: &SubSong, line: usize) {
        let lines = song.blocks.get(self.block).map_or(1, |b| b.lines);
        self.line = if line >= lines { lines - 1 } else { line };
    }

    /// The shared sequence-position resolution. Follows jump entries (up
    /// to a fixed redirect bound), lets the handler consume other control
    /// entries, wraps from sequence end into the next section, and ends
    /// on a block entry. Corrupt playlists fall back to block 0 instead
    /// of spinning.
    fn goto_seqpos<F>(&mut self, song: &SubSong, target: usize, handler: &mut F)
    where F: FnMut(SeqCmd) -> bool
    {
        let mut target = target;
        let mut jumps = 0;
        let mut rollovers = 0;

        if song.sections.is_empty() || song.playseqs.is_empty() || song.blocks.is_empty() {
            self.reset_to_start();
            return
        }

        loop {
            if self.section >= song.sections.len() {
                self.section = 0;
            }
            self.pseq = song.playseq_of_section(self.section);

            let entries = match song.playseqs.get(self.pseq) {
                Some(p) => &p.entries,
                None    => {
                    self.reset_to_start();
                    return
                }
            };

            if target >= entries.len() {
                rollovers += 1;
                if rollovers > MAX_ROLLOVERS {
                    warn!("section rollover bound hit, resetting to block 0");
                    self.reset_to_start();
                    return
                }
                self.section += 1;
                if self.section >= song.sections.len() {
                    // wrapped around the whole song
                    self.section = 0;
                    self.end_reached = true;
                }
                target = 0;
                continue
            }

            match entries[target] {
                PlaySeqEntry::Block(b) => {
                    self.seqpos = target;
                    let b = b as usize;
                    self.block = if b >= song.blocks.len() { song.blocks.len() - 1 } else { b };
                    if self.line >= song.blocks[self.block].lines {
                        self.line = 0;
                    }
                    return
                }
                PlaySeqEntry::Jump(t) => {
                    jumps += 1;
                    if jumps > MAX_JUMPS {
                        warn!("jump chain bound hit, resetting to block 0");
                        self.reset_to_start();
                        return
                    }
                    let t = t as usize;
                    if t <= target {
                        self.end_reached = true;
                    }
                    target = t;
                }
                PlaySeqEntry::Stop => {
                    handler(SeqCmd::Stop);
                    target += 1;
                }
            }
        }
    }

    fn reset_to_start(&mut self) {
        self.section = 0;
        self.pseq = 0;
        self.seqpos = 0;
        self.block = 0;
        self.line = 0;
    }

    /// Re-clamp every field into its parent's current bounds. The model
    /// can shrink or the position can be set externally to stale
    /// coordinates; nothing here may be trusted to still be in range.
    pub fn clamp(&mut self, song: &SubSong) {
        if song.sections.is_empty() || song.blocks.is_empty() {
            self.reset_to_start();
            return
        }
        if self.section >= song.sections.len() {
            self.section = 0;
        }
        self.pseq = song.playseq_of_section(self.section);
        let len = song.playseqs.get(self.pseq).map_or(0, |p| p.entries.len());
        if len > 0 && self.seqpos >= len {
            self.seqpos = len - 1;
        }
        if self.block >= song.blocks.len() {
            self.block = song.blocks.len() - 1;
        }
        let lines = song.blocks[self.block].lines;
        if lines > 0 && self.line >= lines {
            self.line = lines - 1;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use format::med::{Block, PlaySeq, PlaySeqEntry};

    fn no_handler() -> impl FnMut(SeqCmd) -> bool {
        |_| false
    }

    fn song(entries: Vec<PlaySeqEntry>) -> SubSong {
        let mut s = SubSong::new();
        for _ in 0..4 {
            s.blocks.push(Block::new(4, 8));
        }
        s.playseqs.push(PlaySeq{name: "".to_owned(), entries});
        s.sections = vec![0];
        s
    }

    #[test]
    fn test_row_advance_wraps_block() {
        let s = song(vec![PlaySeqEntry::Block(0), PlaySeqEntry::Block(1)]);
        let mut p = PlayPos::new();
        for _ in 0..8 {
            p.advance_row(&s, AdvanceMode::Song, &mut no_handler());
        }
        assert_eq!(p.seqpos, 1);
        assert_eq!(p.block, 1);
        assert_eq!(p.line, 0);
    }

    #[test]
    fn test_block_mode_stays_put() {
        let s = song(vec![PlaySeqEntry::Block(0), PlaySeqEntry::Block(1)]);
        let mut p = PlayPos::new();
        for _ in 0..20 {
            p.advance_row(&s, AdvanceMode::Block, &mut no_handler());
        }
        assert_eq!(p.seqpos, 0);
        assert_eq!(p.block, 0);
    }

    #[test]
    fn test_backward_jump_sets_end_once_per_occurrence() {
        let s = song(vec![PlaySeqEntry::Block(0), PlaySeqEntry::Block(1)]);
        let mut p = PlayPos::new();
        p.goto_seqpos(&s, 1, &mut no_handler());
        assert!(!p.take_end());

        p.position_jump(&s, 0, 0, &mut no_handler());
        assert!(p.take_end());
        assert!(!p.take_end());  // consumed, not raised again

        p.position_jump(&s, 1, 0, &mut no_handler());
        p.position_jump(&s, 1, 0, &mut no_handler());  // self jump
        assert!(p.take_end());
    }

    #[test]
    fn test_jump_chain_bounded() {
        // two jump entries pointing at each other never resolve; the
        // guard must land us on block 0 instead of hanging
        let s = song(vec![PlaySeqEntry::Jump(1), PlaySeqEntry::Jump(0)]);
        let mut p = PlayPos::new();
        p.goto_seqpos(&s, 0, &mut no_handler());
        assert_eq!(p.block, 0);
        assert_eq!(p.seqpos, 0);
    }

    #[test]
    fn test_stop_entry_offered_to_handler_then_skipped() {
        let s = song(vec![PlaySeqEntry::Stop, PlaySeqEntry::Block(2)]);
        let mut p = PlayPos::new();
        let mut stops = 0;
        p.goto_seqpos(&s, 0, &mut |cmd| {
            assert_eq!(cmd, SeqCmd::Stop);
            stops += 1;
            true
        });
        assert_eq!(stops, 1);
        assert_eq!(p.block, 2);
        assert_eq!(p.seqpos, 1);
    }

    #[test]
    fn test_section_rollover_wraps_and_flags_end() {
        let s = song(vec![PlaySeqEntry::Block(3)]);
        let mut p = PlayPos::new();
        // advancing past the single entry wraps the single section
        p.goto_seqpos(&s, 1, &mut no_handler());
        assert_eq!(p.seqpos, 0);
        assert_eq!(p.block, 3);
        assert!(p.take_end());
    }

    #[test]
    fn test_out_of_range_block_reference_clamped() {
        let s = song(vec![PlaySeqEntry::Block(99)]);
        let mut p = PlayPos::new();
        p.goto_seqpos(&s, 0, &mut no_handler());
        assert_eq!(p.block, 3);
    }

    #[test]
    fn test_pattern_break_clamps_target_line() {
        let s = song(vec![PlaySeqEntry::Block(0), PlaySeqEntry::Block(1)]);
        let mut p = PlayPos::new();
        p.pattern_break(&s, 100, &mut no_handler());
        assert_eq!(p.seqpos, 1);
        assert_eq!(p.line, 7);
    }

    #[test]
    fn test_linear_round_trip() {
        let mut s = SubSong::new();
        for _ in 0..4 {
            s.blocks.push(Block::new(4, 8));
        }
        s.playseqs.push(PlaySeq{name: "".to_owned(), entries: vec![
            PlaySeqEntry::Block(0), PlaySeqEntry::Block(1)]});
        s.playseqs.push(PlaySeq{name: "".to_owned(), entries: vec![
            PlaySeqEntry::Block(2)]});
        s.sections = vec![0, 1];

        let mut p = PlayPos::new();
        p.set_linear(&s, 2, &mut no_handler());
        assert_eq!(p.section, 1);
        assert_eq!(p.block, 2);
        assert_eq!(p.linear(&s), 2);
    }

    #[test]
    fn test_empty_model_resets() {
        let s = SubSong::new();
        let mut p = PlayPos::new();
        p.goto_seqpos(&s, 5, &mut no_handler());
        assert_eq!((p.block, p.line, p.seqpos), (0, 0, 0));
    }
}
