use format::{Loader, FormatInfo, Format};
use format::med::*;
use format::med::convert;
use module::Module;
use module::event::{NoteEvent, CmdEvent};
use module::instrument::{Instrument, SynthInstr};
use module::sample::Sample;
use util::BinaryRead;
use ::*;

// song record layout, shared tail at offset 504 (after the 63 sample
// records); the middle differs between the inline-playlist versions
// (MMD0/MMD1) and the section-table versions (MMD2/MMD3)
const SONG_TAIL : usize = 504;
const SONG_SIZE : usize = 788;

const MAX_WFORMS: usize = 64;
const MAX_PAGES : usize = 8;

/// OctaMED MMD module loader
pub struct MedLoader;

struct Header {
    version    : u8,
    song       : usize,
    blockarr   : usize,
    smplarr    : usize,
    expdata    : usize,
    extra_songs: usize,
}

// per-instrument record from the song structure
struct SongSample {
    rep       : usize,
    replen    : usize,
    midich    : usize,
    midipreset: usize,
    svol      : usize,
    strans    : i8,
}

#[derive(Default)]
struct ExpData {
    nextmod      : usize,
    exp_smp      : usize,
    s_ext_entries: usize,
    s_ext_entrsz : usize,
    annotxt      : usize,
    annolen      : usize,
    iinfo        : usize,
    i_ext_entries: usize,
    i_ext_entrsz : usize,
    songname     : usize,
    songnamelen  : usize,
    trackinfo    : usize,
    effectinfo   : usize,
}

// InstrExt instr_flags
const SSFLG_LOOP    : u8 = 0x01;
const SSFLG_DISABLED: u8 = 0x04;
const SSFLG_PINGPONG: u8 = 0x08;

// expdata track/effect-group tag lists
const TAG_END        : u32 = 0;
const TAG_TRK_NAME   : u32 = 1;
const TAG_TRK_NAMELEN: u32 = 2;
const TAG_TRK_FXGROUP: u32 = 3;
const TAG_FX_ECHOTYPE : u32 = 1;
const TAG_FX_ECHODEPTH: u32 = 2;
const TAG_FX_ECHOLEN  : u32 = 3;
const TAG_FX_STEREOSEP: u32 = 4;

impl MedLoader {
    fn read_header(&self, b: &[u8], ofs: usize) -> Result<Header, Error> {
        let magic = b.slice(ofs, 3)?;
        let version = b.read8(ofs + 3)?;
        if magic != b"MMD" || version < b'0' || version > b'3' {
            return Err(Error::Format("bad magic".to_owned()))
        }

        let modlen = b.read32b(ofs + 4)? as usize;
        if ofs + modlen > b.len() {
            return Err(Error::Load("declared length past end of file".to_owned()))
        }

        Ok(Header {
            version    : version - b'0',
            song       : b.read32b(ofs + 0x08)? as usize,
            blockarr   : b.read32b(ofs + 0x10)? as usize,
            smplarr    : b.read32b(ofs + 0x18)? as usize,
            expdata    : b.read32b(ofs + 0x20)? as usize,
            extra_songs: b.read8(ofs + 0x33)? as usize,
        })
    }

    fn read_song(&self, b: &[u8], ofs: usize, version: u8)
        -> Result<(SubSong, Vec<SongSample>, usize), Error> {

        b.slice(ofs, SONG_SIZE)?;  // whole record must be present

        let mut smp = Vec::with_capacity(MAX_INSTR);
        for i in 0..MAX_INSTR {
            let o = ofs + i * 8;
            smp.push(SongSample {
                rep       : b.read16b(o)? as usize * 2,
                replen    : b.read16b(o + 2)? as usize * 2,
                midich    : b.read8(o + 4)? as usize,
                midipreset: b.read8(o + 5)? as usize,
                svol      : b.read8(o + 6)? as usize,
                strans    : b.read8i(o + 7)?,
            });
        }

        let mut song = SubSong::new();
        let t = ofs + SONG_TAIL;
        let numblocks = b.read16b(t)? as usize;
        let songlen = b.read16b(t + 2)? as usize;

        song.deftempo   = b.read16b(ofs + 764)?;
        song.playtransp = b.read8i(ofs + 766)?;
        song.flags      = b.read8(ofs + 767)?;
        song.flags2     = b.read8(ofs + 768)?;
        song.tempo2     = b.read8(ofs + 769)?;
        song.mastervol  = b.read8(ofs + 786)? as usize;

        if version < 2 {
            // inline playlist becomes a single section with one sequence
            let len = if songlen > 256 { 256 } else { songlen };
            let mut entries = Vec::with_capacity(len);
            for i in 0..len {
                entries.push(PlaySeqEntry::Block(b.read8(t + 4 + i)? as u16));
            }
            song.playseqs.push(PlaySeq{name: "".to_owned(), entries});
            song.sections = vec![0];

            song.numtracks = if song.flags & FLAG_8CHANNEL != 0 { 8 } else { 4 };
            song.trackvol = b.slice(ofs + 770, 16)?.to_vec();
            song.trackpan = vec![0; song.numtracks];
        } else {
            let playseqtable = b.read32b(t + 4)? as usize;
            let sectiontable = b.read32b(t + 8)? as usize;
            let trackvols    = b.read32b(t + 12)? as usize;
            let numtracks    = b.read16b(t + 16)? as usize;
            let numpseqs     = b.read16b(t + 18)? as usize;
            let trackpans    = b.read32b(t + 20)? as usize;
            song.flags3      = b.read32b(t + 24)?;

            // echo settings, kept but never applied to the mix
            song.effect_groups.push(EffectGroup {
                echo_type : b.read8(t + 32)? as usize,
                echo_depth: b.read8(t + 33)? as usize,
                echo_len  : b.read16b(t + 34)? as usize,
                stereo_sep: b.read8i(t + 36)? as isize,
            });

            song.numtracks = if numtracks == 0 || numtracks > MAX_TRACKS { 4 } else { numtracks };
            song.stereo = song.flags3 & FLAG3_STEREO != 0;

            let offsets = b.read32b_array(playseqtable, numpseqs)?;
            for o in &offsets {
                song.playseqs.push(self.read_playseq(b, *o as usize)?);
            }

            for s in b.read16b_array(sectiontable, songlen)? {
                song.sections.push(s);
            }

            song.trackvol = if trackvols != 0 {
                b.slice(trackvols, song.numtracks)?.to_vec()
            } else {
                vec![64; song.numtracks]
            };

            song.trackpan = if trackpans != 0 {
                b.slice(trackpans, song.numtracks)?.iter().map(|&x| x as i8).collect()
            } else {
                vec![0; song.numtracks]
            };
        }

        Ok((song, smp, numblocks))
    }

    fn read_playseq(&self, b: &[u8], ofs: usize) -> Result<PlaySeq, Error> {
        let name = b.read_string(ofs, 32)?;
        let length = b.read16b(ofs + 40)? as usize;
        let mut entries = Vec::with_capacity(length);
        for v in b.read16b_array(ofs + 42, length)? {
            entries.push(PlaySeqEntry::from_raw(v));
        }
        Ok(PlaySeq{name, entries})
    }

    fn read_block(&self, b: &[u8], ofs: usize, version: u8) -> Result<Block, Error> {
        if version == 0 {
            let numtracks = b.read8(ofs)? as usize;
            let lines = b.read8(ofs + 1)? as usize + 1;
            let mut block = Block::new(numtracks, lines);
            let cells = b.slice(ofs + 2, numtracks * lines * 3)?;

            for l in 0..lines {
                for t in 0..numtracks {
                    let c = &cells[(l * numtracks + t) * 3..];
                    let note = c[0] & 0x3f;
                    let ins = (c[1] >> 4) | ((c[0] & 0x80) >> 3) | ((c[0] & 0x40) >> 1);
                    block.set_event(l, t, NoteEvent{note, ins});
                    block.set_cmd(0, l, t, CmdEvent{cmd: c[1] & 0x0f, data: c[2], data2: 0});
                }
            }
            return Ok(block)
        }

        let numtracks = b.read16b(ofs)? as usize;
        let lines = b.read16b(ofs + 2)? as usize + 1;
        let blockinfo = b.read32b(ofs + 4)? as usize;
        let mut block = Block::new(numtracks, lines);
        let cells = b.slice(ofs + 8, numtracks * lines * 4)?;

        for l in 0..lines {
            for t in 0..numtracks {
                let c = &cells[(l * numtracks + t) * 4..];
                // MMD2+ note numbers use the full range for the
                // default-pitch and fixed-rate entries
                let note = if version < 2 { c[0] & 0x7f } else { c[0] };
                block.set_event(l, t, NoteEvent{note, ins: c[1] & 0x3f});
                block.set_cmd(0, l, t, CmdEvent{cmd: c[2], data: c[3], data2: 0});
            }
        }

        if blockinfo != 0 {
            self.read_blockinfo(b, blockinfo, &mut block)?;
        }

        Ok(block)
    }

    fn read_blockinfo(&self, b: &[u8], ofs: usize, block: &mut Block) -> Result<(), Error> {
        let blockname = b.read32b(ofs + 4)? as usize;
        let blocknamelen = b.read32b(ofs + 8)? as usize;
        let pagetable = b.read32b(ofs + 12)? as usize;
        let cmdexttable = b.read32b(ofs + 16)? as usize;

        if blockname != 0 && blocknamelen != 0 {
            block.name = b.read_string(blockname, blocknamelen)?;
        }

        let cells = block.numtracks * block.lines;

        if pagetable != 0 {
            let mut num_pages = b.read16b(pagetable)? as usize;
            if num_pages > MAX_PAGES {
                warn!("block page count {} clamped to {}", num_pages, MAX_PAGES);
                num_pages = MAX_PAGES;
            }
            let offsets = b.read32b_array(pagetable + 4, num_pages)?;
            block.resize_pages(1 + num_pages);

            for (p, &o) in offsets.iter().enumerate() {
                let data = b.slice(o as usize, cells * 2)?;
                for l in 0..block.lines {
                    for t in 0..block.numtracks {
                        let c = &data[(l * block.numtracks + t) * 2..];
                        block.set_cmd(1 + p, l, t, CmdEvent{cmd: c[0], data: c[1], data2: 0});
                    }
                }
            }
        }

        if cmdexttable != 0 {
            // one extension array per page, main grid included
            let offsets = b.read32b_array(cmdexttable, block.pages())?;
            for (p, &o) in offsets.iter().enumerate() {
                if o == 0 {
                    continue
                }
                let data = b.slice(o as usize, cells)?;
                for l in 0..block.lines {
                    for t in 0..block.numtracks {
                        let mut c = block.cmd(p, l, t);
                        c.data2 = data[l * block.numtracks + t];
                        block.set_cmd(p, l, t, c);
                    }
                }
            }
        }

        Ok(())
    }

    fn read_expdata(&self, b: &[u8], ofs: usize) -> Result<ExpData, Error> {
        let mut exp: ExpData = Default::default();
        if ofs == 0 {
            return Ok(exp)
        }

        exp.nextmod       = b.read32b(ofs)? as usize;
        exp.exp_smp       = b.read32b(ofs + 4)? as usize;
        exp.s_ext_entries = b.read16b(ofs + 8)? as usize;
        exp.s_ext_entrsz  = b.read16b(ofs + 10)? as usize;
        exp.annotxt       = b.read32b(ofs + 12)? as usize;
        exp.annolen       = b.read32b(ofs + 16)? as usize;
        exp.iinfo         = b.read32b(ofs + 20)? as usize;
        exp.i_ext_entries = b.read16b(ofs + 24)? as usize;
        exp.i_ext_entrsz  = b.read16b(ofs + 26)? as usize;

        // older writers stop the record early; missing tail fields are zero
        exp.songname    = b.read32b(ofs + 44).unwrap_or(0) as usize;
        exp.songnamelen = b.read32b(ofs + 48).unwrap_or(0) as usize;
        exp.trackinfo   = b.read32b(ofs + 68).unwrap_or(0) as usize;
        exp.effectinfo  = b.read32b(ofs + 72).unwrap_or(0) as usize;

        Ok(exp)
    }

    fn apply_instr_ext(&self, b: &[u8], exp: &ExpData, instruments: &mut Vec<Instrument>)
        -> Result<(), Error> {

        if exp.exp_smp == 0 || exp.s_ext_entrsz == 0 {
            return Ok(())
        }

        let n = if exp.s_ext_entries > MAX_INSTR { MAX_INSTR } else { exp.s_ext_entries };
        for i in 0..n {
            let o = exp.exp_smp + i * exp.s_ext_entrsz;
            b.slice(o, exp.s_ext_entrsz)?;

            let ins = &mut instruments[i];
            ins.hold = b.read8(o)? as usize;
            ins.decay = b.read8(o + 1)? as usize;
            if exp.s_ext_entrsz > 3 {
                ins.finetune = b.read8i(o + 3)? as isize;
            }
            if exp.s_ext_entrsz > 5 {
                ins.default_pitch = b.read8(o + 4)?;
                let flags = b.read8(o + 5)?;
                ins.has_loop = flags & SSFLG_LOOP != 0;
                ins.loop_pingpong = flags & SSFLG_PINGPONG != 0;
                ins.disabled = flags & SSFLG_DISABLED != 0;
            }
            if exp.s_ext_entrsz > 17 {
                // byte-based long loop overrides the halved 16-bit fields
                ins.loop_start = b.read32b(o + 10)? as usize;
                ins.loop_len = b.read32b(o + 14)? as usize;
            }
        }

        if exp.iinfo != 0 && exp.i_ext_entrsz != 0 {
            let n = if exp.i_ext_entries > MAX_INSTR { MAX_INSTR } else { exp.i_ext_entries };
            for i in 0..n {
                let o = exp.iinfo + i * exp.i_ext_entrsz;
                let size = if exp.i_ext_entrsz > 40 { 40 } else { exp.i_ext_entrsz };
                instruments[i].name = b.read_string(o, size)?;
            }
        }

        Ok(())
    }

    fn read_trackinfo(&self, b: &[u8], exp: &ExpData, song: &mut SubSong) -> Result<(), Error> {
        song.track_names = vec!["".to_owned(); song.numtracks];
        song.track_fxgroup = vec![0; song.numtracks];

        if exp.trackinfo != 0 {
            let offsets = b.read32b_array(exp.trackinfo, song.numtracks)?;
            for (t, &o) in offsets.iter().enumerate() {
                if o == 0 {
                    continue
                }
                let mut name_ofs = 0_usize;
                let mut name_len = 0_usize;
                self.walk_tags(b, o as usize, |tag, data| {
                    match tag {
                        TAG_TRK_NAME    => name_ofs = data as usize,
                        TAG_TRK_NAMELEN => name_len = data as usize,
                        TAG_TRK_FXGROUP => song.track_fxgroup[t] = data as usize,
                        _               => {},
                    }
                })?;
                if name_ofs != 0 && name_len != 0 {
                    song.track_names[t] = b.read_string(name_ofs, name_len)?;
                }
            }
        }

        if exp.effectinfo != 0 {
            let num = b.read32b(exp.effectinfo)? as usize;
            let num = if num > MAX_TRACKS { MAX_TRACKS } else { num };
            let offsets = b.read32b_array(exp.effectinfo + 4, num)?;
            for &o in &offsets {
                let mut grp: EffectGroup = Default::default();
                self.walk_tags(b, o as usize, |tag, data| {
                    match tag {
                        TAG_FX_ECHOTYPE  => grp.echo_type = data as usize,
                        TAG_FX_ECHODEPTH => grp.echo_depth = data as usize,
                        TAG_FX_ECHOLEN   => grp.echo_len = data as usize,
                        TAG_FX_STEREOSEP => grp.stereo_sep = data as i32 as isize,
                        _                => {},
                    }
                })?;
                song.effect_groups.push(grp);
            }
        }

        Ok(())
    }

    fn walk_tags<F>(&self, b: &[u8], ofs: usize, mut f: F) -> Result<(), Error>
    where F: FnMut(u32, u32)
    {
        let mut o = ofs;
        loop {
            let tag = b.read32b(o)?;
            if tag == TAG_END {
                return Ok(())
            }
            let data = b.read32b(o + 4)?;
            f(tag, data);
            o += 8;
        }
    }

    fn read_instrument(&self, b: &[u8], num: usize, ofs: usize, song_smp: &SongSample,
                       samples: &mut Vec<Sample>) -> Result<Instrument, Error> {

        let mut ins = Instrument::new();
        ins.num = num;
        ins.midi_ch = song_smp.midich;
        ins.midi_preset = song_smp.midipreset;
        ins.transpose = song_smp.strans as isize;
        ins.volume = song_smp.svol;
        ins.loop_start = song_smp.rep;
        ins.loop_len = song_smp.replen;
        ins.has_loop = song_smp.replen > 2;

        if ofs == 0 {
            // empty slot: keep the placeholder sample
            return Ok(ins)
        }

        let length = b.read32b(ofs)? as usize;
        let typ = b.read16b(ofs + 4)? as i16;

        match typ {
            ITYPE_SYNTHETIC => {
                ins.synth = Some(self.read_synth(b, ofs + 6, false, samples)?);
            }
            ITYPE_HYBRID => {
                ins.synth = Some(self.read_synth(b, ofs + 6, true, samples)?);
            }
            t if t >= 0 => {
                if t & ITYPE_MASK != 0 {
                    return Err(Error::Load(format!("instrument {}: unsupported multi-octave or external sample", num + 1)))
                }
                if t & ITYPE_STEREO != 0 {
                    return Err(Error::Load(format!("instrument {}: stereo samples not supported", num + 1)))
                }
                if t & ITYPE_PACKED != 0 {
                    return Err(Error::Load(format!("instrument {}: packed sample data not supported", num + 1)))
                }

                let smp = &mut samples[num];
                smp.num = num + 1;
                if t & ITYPE_16BIT != 0 {
                    if t & ITYPE_DELTA != 0 {
                        return Err(Error::Load(format!("instrument {}: 16-bit delta coding not supported", num + 1)))
                    }
                    smp.store_16b(b.slice(ofs + 6, length)?);
                    // loop fields are byte-based in the song record
                    ins.loop_start /= 2;
                    ins.loop_len /= 2;
                } else if t & ITYPE_DELTA != 0 {
                    smp.store_delta(b.slice(ofs + 6, length)?);
                } else {
                    smp.store(b.slice(ofs + 6, length)?);
                }
            }
            _ => {
                return Err(Error::Load(format!("instrument {}: unknown type {}", num + 1, typ)))
            }
        }

        Ok(ins)
    }

    fn read_synth(&self, b: &[u8], ofs: usize, hybrid: bool, samples: &mut Vec<Sample>)
        -> Result<SynthInstr, Error> {

        let mut syn = SynthInstr::new();
        syn.hybrid = hybrid;
        syn.default_decay = b.read8(ofs)? as usize;
        syn.rep = b.read16b(ofs + 4)? as usize * 2;
        syn.replen = b.read16b(ofs + 6)? as usize * 2;
        let voltbllen = b.read16b(ofs + 8)? as usize;
        let wftbllen = b.read16b(ofs + 10)? as usize;
        syn.vol_speed = b.read8(ofs + 12)? as usize;
        syn.wf_speed = b.read8(ofs + 13)? as usize;
        let mut wforms = b.read16b(ofs + 14)? as usize;

        if voltbllen > 128 || wftbllen > 128 {
            return Err(Error::Load("synth program table too long".to_owned()))
        }
        syn.voltbl = b.slice(ofs + 16, voltbllen)?.to_vec();
        syn.wftbl = b.slice(ofs + 144, wftbllen)?.to_vec();

        if wforms > MAX_WFORMS {
            warn!("synth waveform count {} clamped to {}", wforms, MAX_WFORMS);
            wforms = MAX_WFORMS;
        }

        let offsets = b.read32b_array(ofs + 272, wforms)?;
        for (w, &o) in offsets.iter().enumerate() {
            let mut smp = Sample::new();
            smp.num = samples.len() + 1;

            if hybrid && w == 0 {
                // the attack part is a plain sample header
                let o = ofs + o as usize;
                let length = b.read32b(o)? as usize;
                let typ = b.read16b(o + 4)? as i16;
                if typ != 0 {
                    return Err(Error::Load("hybrid attack sample must be a plain 8-bit sample".to_owned()))
                }
                smp.store(b.slice(o + 6, length)?);
            } else {
                let o = ofs + o as usize;
                let words = b.read16b(o)? as usize;
                smp.store(b.slice(o + 2, words * 2)?);
            }

            syn.wf_samples.push(samples.len());
            samples.push(smp);
        }

        Ok(syn)
    }
}

impl Loader for MedLoader {
    fn name(&self) -> &'static str {
        "OctaMED MMD0/1/2/3"
    }

    fn probe(&self, b: &[u8]) -> Result<FormatInfo, Error> {
        if b.len() < 0x34 {
            return Err(Error::Format("file too short".to_owned()))
        }

        let hdr = self.read_header(b, 0).map_err(|_| Error::Format("bad magic".to_owned()))?;
        let format = match hdr.version {
            0 => Format::Mmd0,
            1 => Format::Mmd1,
            2 => Format::Mmd2,
            _ => Format::Mmd3,
        };

        Ok(FormatInfo{format, title: "".to_owned()})
    }

    fn load(self: Box<Self>, b: &[u8], info: FormatInfo) -> Result<Module, Error> {
        let mut data = MedData {
            song_name  : "".to_owned(),
            annotation : "".to_owned(),
            songs      : Vec::new(),
            instruments: Vec::new(),
            samples    : Vec::new(),
        };

        // every instrument slot owns a (possibly empty) sample
        for i in 0..MAX_INSTR {
            let mut smp = Sample::new();
            smp.num = i + 1;
            data.samples.push(smp);
        }

        let mut hdr_ofs = 0;
        let mut songs_left;

        // all chained songs load, or the whole load fails
        loop {
            let hdr = self.read_header(b, hdr_ofs)?;
            let first = hdr_ofs == 0;
            songs_left = hdr.extra_songs;

            let (mut song, song_smp, numblocks) = self.read_song(b, hdr.song, hdr.version)?;

            let block_offsets = b.read32b_array(hdr.blockarr, numblocks)?;
            for &o in &block_offsets {
                let block = self.read_block(b, o as usize, hdr.version)?;
                song.blocks.push(block);
            }

            if hdr.version < 2 {
                let trks = song.blocks.iter().map(|x| x.numtracks).max().unwrap_or(4);
                if trks > song.numtracks {
                    song.numtracks = trks;
                }
            }

            let exp = self.read_expdata(b, hdr.expdata)?;

            if first {
                let numsamples = b.read8(hdr.song + 787)? as usize;
                let numsamples = if numsamples > MAX_INSTR { MAX_INSTR } else { numsamples };
                let sample_offsets = b.read32b_array(hdr.smplarr, numsamples)?;

                for i in 0..MAX_INSTR {
                    let ofs = if i < sample_offsets.len() { sample_offsets[i] as usize } else { 0 };
                    let ins = self.read_instrument(b, i, ofs, &song_smp[i], &mut data.samples)?;
                    data.instruments.push(ins);
                }

                self.apply_instr_ext(b, &exp, &mut data.instruments)?;

                if exp.songname != 0 && exp.songnamelen != 0 {
                    data.song_name = b.read_string(exp.songname, exp.songnamelen)?;
                }
                if exp.annotxt != 0 && exp.annolen != 0 {
                    data.annotation = b.read_string(exp.annotxt, exp.annolen)?;
                }
            }

            self.read_trackinfo(b, &exp, &mut song)?;

            if !song.mix_mode() {
                convert::normalize(&mut song);
                if first {
                    convert::normalize_instruments(&mut data.instruments);
                }
            }

            data.songs.push(song);

            if exp.nextmod == 0 || songs_left == 0 {
                break
            }
            hdr_ofs = exp.nextmod;
        }

        debug!("loaded {} song(s), {} block(s) in song 0",
               data.songs.len(), data.songs[0].blocks.len());

        let version = match info.format {
            Format::Mmd0 => 0,
            Format::Mmd1 => 1,
            Format::Mmd2 => 2,
            Format::Mmd3 => 3,
        };

        let m = Module {
            format_id  : "mmd",
            description: format!("OctaMED MMD{}", version),
            creator    : if version < 2 {
                             "MED/OctaMED".to_owned()
                         } else {
                             "OctaMED Soundstudio".to_owned()
                         },
            player     : "med",
            data       : Box::new(data),
        };

        Ok(m)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, BigEndian};

    fn put16(b: &mut [u8], ofs: usize, v: u16) {
        BigEndian::write_u16(&mut b[ofs..ofs+2], v);
    }

    fn put32(b: &mut [u8], ofs: usize, v: u32) {
        BigEndian::write_u32(&mut b[ofs..ofs+4], v);
    }

    // minimal MMD0: one 4-track block, two playlist entries, one sample
    fn build_mmd0() -> Vec<u8> {
        let mut b = vec![0u8; 908];
        b[0..4].copy_from_slice(b"MMD0");
        put32(&mut b, 0x04, 908);
        put32(&mut b, 0x08, 0x34);    // song
        put32(&mut b, 0x10, 0x348);   // blockarr
        put32(&mut b, 0x18, 0x37e);   // smplarr

        let s = 0x34;
        put16(&mut b, s + 2, 1);      // instrument 0 replen (halved)
        b[s + 6] = 64;                // svol
        put16(&mut b, s + 504, 1);    // numblocks
        put16(&mut b, s + 506, 2);    // songlen
        b[s + 508] = 0;               // playseq
        b[s + 509] = 0;
        put16(&mut b, s + 764, 5);    // deftempo, old index form
        b[s + 769] = 6;               // tempo2
        for i in 0..16 {
            b[s + 770 + i] = 64;      // trkvol
        }
        b[s + 786] = 64;              // mastervol
        b[s + 787] = 1;               // numsamples

        put32(&mut b, 0x348, 0x34c);  // block 0 offset
        b[0x34c] = 4;                 // numtracks
        b[0x34d] = 3;                 // lines - 1
        b[0x34e] = 25;                // line 0 track 0: C-2
        b[0x34f] = 0x10;              // instrument 1

        put32(&mut b, 0x37e, 0x382);  // sample 0 offset
        put32(&mut b, 0x382, 4);      // byte length
        b[0x388] = 0x10;
        b[0x389] = 0x20;
        b[0x38a] = 0x30;
        b[0x38b] = 0x40;
        b
    }

    #[test]
    fn test_probe() {
        let image = build_mmd0();
        let info = MedLoader.probe(&&image[..]).unwrap();
        assert_eq!(info.format, Format::Mmd0);

        let mut bad = build_mmd0();
        bad[3] = b'9';
        assert!(MedLoader.probe(&&bad[..]).is_err());
    }

    #[test]
    fn test_probe_rejects_declared_length_past_eof() {
        let mut image = build_mmd0();
        put32(&mut image, 0x04, 4000);
        assert!(MedLoader.probe(&&image[..]).is_err());
    }

    #[test]
    fn test_load_mmd0() {
        let image = build_mmd0();
        let b = &image[..];
        let info = MedLoader.probe(&b).unwrap();
        let m = Box::new(MedLoader).load(&b, info).unwrap();
        let data = m.data.as_any().downcast_ref::<MedData>().unwrap();

        assert_eq!(data.songs.len(), 1);
        let song = &data.songs[0];
        assert_eq!(song.numtracks, 4);
        assert_eq!(song.blocks.len(), 1);
        assert_eq!(song.blocks[0].lines, 4);
        assert_eq!(song.num_positions(), 2);

        // non-mix content is normalized at load
        assert!(song.stereo);
        assert_eq!(&song.trackpan[..4], &[-16, 16, 16, -16]);
        assert_eq!(song.deftempo, 48);

        let e = song.blocks[0].event(0, 0);
        assert_eq!((e.note, e.ins), (25, 1));

        assert_eq!(data.instruments[0].volume, 127);
        assert_eq!(data.instruments[0].transpose, 24);
        assert_eq!(data.samples[0].size, 4);
        assert_eq!(data.samples[0].data_8(), &[0x10, 0x20, 0x30, 0x40]);
    }

    #[test]
    fn test_truncated_sample_aborts_load() {
        let mut image = build_mmd0();
        put32(&mut image, 0x382, 400);  // sample length past end of file
        let b = &image[..];
        let info = MedLoader.probe(&b).unwrap();
        assert!(Box::new(MedLoader).load(&b, info).is_err());
    }

    fn push16(b: &mut Vec<u8>, v: u16) {
        let mut t = [0_u8; 2];
        BigEndian::write_u16(&mut t, v);
        b.extend(&t);
    }

    // MMD2 with sections, two play sequences, command pages, extended
    // argument bytes, a 16-bit sample and a synth instrument
    fn build_mmd2() -> Vec<u8> {
        let mut b = vec![0_u8; 0x34];
        b[0..4].copy_from_slice(b"MMD2");

        let song = b.len();
        b.resize(song + 788, 0);
        put32(&mut b, 0x08, song as u32);

        // instrument 0: 16-bit sample, repeat length 2 halved units
        put16(&mut b, song + 2, 2);
        b[song + 6] = 64;
        // instrument 1: synth, default volume 48
        b[song + 8 + 6] = 48;

        let t = song + 504;
        put16(&mut b, t, 2);                 // numblocks
        put16(&mut b, t + 2, 2);             // songlen = number of sections
        put16(&mut b, t + 16, 6);            // numtracks
        put16(&mut b, t + 18, 2);            // numpseqs
        put32(&mut b, t + 24, 1);            // flags3: stereo
        put16(&mut b, song + 764, 120);      // deftempo
        b[song + 768] = 0x80 | 0x20 | 0x03;  // mix + bpm + 4 lines per beat
        b[song + 769] = 6;                   // tempo2
        b[song + 786] = 64;                  // mastervol
        b[song + 787] = 2;                   // numsamples

        // play sequence table
        let pseqtable = b.len();
        b.resize(pseqtable + 8, 0);
        put32(&mut b, t + 4, pseqtable as u32);

        let pseq0 = b.len();
        b.resize(pseq0 + 42, 0);
        b[pseq0..pseq0 + 4].copy_from_slice(b"main");
        put16(&mut b, pseq0 + 40, 3);
        push16(&mut b, 0x0000);              // block 0
        push16(&mut b, 0x0001);              // block 1
        push16(&mut b, 0x8100);              // stop
        put32(&mut b, pseqtable, pseq0 as u32);

        let pseq1 = b.len();
        b.resize(pseq1 + 42, 0);
        put16(&mut b, pseq1 + 40, 1);
        push16(&mut b, 0x0001);              // block 1
        put32(&mut b, pseqtable + 4, pseq1 as u32);

        // section table: both sequences
        let sections = b.len();
        push16(&mut b, 0);
        push16(&mut b, 1);
        put32(&mut b, t + 8, sections as u32);

        // track volumes and pans
        let trackvols = b.len();
        b.extend(&[60_u8; 6]);
        put32(&mut b, t + 12, trackvols as u32);
        let trackpans = b.len();
        b.extend(&[0xf0_u8, 16, 0, 0, 16, 0xf0]);  // -16, 16, ...
        put32(&mut b, t + 20, trackpans as u32);

        // block array
        let blockarr = b.len();
        b.resize(blockarr + 8, 0);
        put32(&mut b, 0x10, blockarr as u32);

        // block 0: 6 tracks, 4 lines, with a block info record
        let block0 = b.len();
        b.resize(block0 + 8 + 6 * 4 * 4, 0);
        put16(&mut b, block0, 6);
        put16(&mut b, block0 + 2, 3);
        b[block0 + 8] = 0x80;                // default-pitch note
        b[block0 + 9] = 0x01;                // instrument 1
        b[block0 + 10] = 0x0c;               // volume command
        b[block0 + 11] = 0x40;
        put32(&mut b, blockarr, block0 as u32);

        let blockinfo = b.len();
        b.resize(blockinfo + 36, 0);
        put32(&mut b, block0 + 4, blockinfo as u32);

        let blockname = b.len();
        b.extend(b"Main");
        put32(&mut b, blockinfo + 4, blockname as u32);
        put32(&mut b, blockinfo + 8, 4);

        // one extra command page
        let pagetable = b.len();
        b.resize(pagetable + 4 + 4, 0);
        put16(&mut b, pagetable, 1);
        put32(&mut b, blockinfo + 12, pagetable as u32);
        let page1 = b.len();
        b.resize(page1 + 6 * 4 * 2, 0);
        b[page1] = 0x0d;                     // volume slide on page 1
        b[page1 + 1] = 0x21;
        put32(&mut b, pagetable + 4, page1 as u32);

        // extended argument bytes for page 1 only
        let cmdext = b.len();
        b.resize(cmdext + 8, 0);
        put32(&mut b, blockinfo + 16, cmdext as u32);
        let ext1 = b.len();
        b.resize(ext1 + 6 * 4, 0);
        b[ext1] = 0x33;
        put32(&mut b, cmdext + 4, ext1 as u32);

        // block 1: plain
        let block1 = b.len();
        b.resize(block1 + 8 + 6 * 4 * 4, 0);
        put16(&mut b, block1, 6);
        put16(&mut b, block1 + 2, 3);
        put32(&mut b, blockarr + 4, block1 as u32);

        // sample array
        let smplarr = b.len();
        b.resize(smplarr + 8, 0);
        put32(&mut b, 0x18, smplarr as u32);

        // sample 0: 16-bit, 4 frames
        let s0 = b.len();
        put32(&mut b, smplarr, s0 as u32);
        b.resize(s0 + 6, 0);
        put32(&mut b, s0, 8);
        put16(&mut b, s0 + 4, 0x10);
        for w in &[0x0102_u16, 0x0304, 0xfffe, 0x8000] {
            push16(&mut b, *w);
        }

        // sample 1: synthetic
        let s1 = b.len();
        put32(&mut b, smplarr + 4, s1 as u32);
        b.resize(s1 + 6, 0);
        put16(&mut b, s1 + 4, 0xfffe);       // type -2
        let syn = b.len();
        b.resize(syn + 272 + 4, 0);
        b[syn] = 5;                          // default decay
        put16(&mut b, syn + 8, 2);           // voltbllen
        put16(&mut b, syn + 10, 2);          // wftbllen
        b[syn + 12] = 1;                     // volspeed
        b[syn + 13] = 1;                     // wfspeed
        put16(&mut b, syn + 14, 1);          // wforms
        b[syn + 16] = 40;                    // voltbl: level, END
        b[syn + 17] = 0xff;
        b[syn + 144] = 0;                    // wftbl: waveform 0, END
        b[syn + 145] = 0xff;
        put32(&mut b, syn + 272, 276);       // waveform offset, synth-relative
        push16(&mut b, 2);                   // 2 words
        b.extend(&[0x10, 0xf0, 0x20, 0xe0]);

        let modlen = b.len() as u32;
        put32(&mut b, 0x04, modlen);
        b
    }

    #[test]
    fn test_load_mmd2() {
        let image = build_mmd2();
        let b = &image[..];
        let info = MedLoader.probe(&b).unwrap();
        assert_eq!(info.format, Format::Mmd2);

        let m = Box::new(MedLoader).load(&b, info).unwrap();
        let data = m.data.as_any().downcast_ref::<MedData>().unwrap();
        let song = &data.songs[0];

        assert_eq!(song.numtracks, 6);
        assert!(song.stereo);
        assert_eq!(song.deftempo, 120);  // mix mode content is untouched
        assert_eq!(song.sections, vec![0, 1]);
        assert_eq!(song.num_positions(), 4);

        assert_eq!(song.playseqs.len(), 2);
        assert_eq!(song.playseqs[0].name, "main");
        assert_eq!(song.playseqs[0].entries, vec![
            PlaySeqEntry::Block(0), PlaySeqEntry::Block(1), PlaySeqEntry::Stop]);
        assert_eq!(song.playseqs[1].entries, vec![PlaySeqEntry::Block(1)]);

        assert_eq!(song.trackvol, vec![60; 6]);
        assert_eq!(song.trackpan, vec![-16, 16, 0, 0, 16, -16]);

        // block 0 and its command pages
        let blk = &song.blocks[0];
        assert_eq!(blk.name, "Main");
        assert_eq!((blk.numtracks, blk.lines), (6, 4));
        assert_eq!(blk.pages(), 2);
        let e = blk.event(0, 0);
        assert_eq!((e.note, e.ins), (0x80, 1));  // default-pitch survives
        let c = blk.cmd(0, 0, 0);
        assert_eq!((c.cmd, c.data, c.data2), (0x0c, 0x40, 0));
        let c = blk.cmd(1, 0, 0);
        assert_eq!((c.cmd, c.data, c.data2), (0x0d, 0x21, 0x33));

        // 16-bit sample decodes big-endian and halves the loop fields
        use module::sample::SampleType;
        assert_eq!(data.samples[0].sample_type, SampleType::Sample16);
        assert_eq!(data.samples[0].size, 4);
        assert_eq!(data.samples[0].data_16(), &[0x0102, 0x0304, -2, -32768]);
        assert!(data.instruments[0].has_loop);
        assert_eq!(data.instruments[0].loop_len, 2);

        // synth instrument: programs parsed, waveform flattened into the
        // module sample list
        let syn = data.instruments[1].synth.as_ref().unwrap();
        assert_eq!(syn.default_decay, 5);
        assert_eq!(syn.voltbl, vec![40, 0xff]);
        assert_eq!(syn.wf_samples, vec![63]);
        assert_eq!(data.samples[63].size, 4);
        assert_eq!(data.instruments[1].volume, 48);
    }
}

