use byteorder::{ByteOrder, BigEndian};
use Error;
use ::*;

pub const NOTES: &'static [&'static str] = &[
    "C ", "C#", "D ", "D#", "E ", "F ", "F#", "G ", "G#", "A ", "A#", "B "
];

// Sampled instruments are tuned so that C-3 plays the recording at the
// Amiga NTSC C-2 rate. Fixed-rate notes bypass this table entirely.
pub const C3_RATE: f64 = 8363.0;
const C3_NOTE    : f64 = 36.0;

lazy_static! {
    // note number (1..=127) to playback rate in Hz, equal tempered
    pub static ref NOTE_RATE: [f64; 128] = {
        let mut t = [0.0; 128];
        for n in 1..128 {
            t[n] = C3_RATE * 2.0_f64.powf((n as f64 - C3_NOTE) / 12.0);
        }
        t
    };
}

pub trait BinaryRead {
    fn read_string(&self, ofs: usize, size: usize) -> Result<String, Error>;
    fn read32b(&self, ofs: usize) -> Result<u32, Error>;
    fn read16b(&self, ofs: usize) -> Result<u16, Error>;
    fn read8(&self, ofs: usize) -> Result<u8, Error>;
    fn read8i(&self, ofs: usize) -> Result<i8, Error>;
    fn read32b_array(&self, ofs: usize, num: usize) -> Result<Vec<u32>, Error>;
    fn read16b_array(&self, ofs: usize, num: usize) -> Result<Vec<u16>, Error>;
    fn slice(&self, start: usize, size: usize) -> Result<&[u8], Error>;
}

impl<'a> BinaryRead for &'a [u8] {
    fn read_string(&self, ofs: usize, size: usize) -> Result<String, Error> {
        check_buffer_size(&self, ofs + size)?;
        let b = &self[ofs..ofs + size];
        let end = b.iter().position(|&x| x == 0).unwrap_or(size);
        Ok(String::from_utf8_lossy(&b[..end]).to_string())
    }

    fn read32b(&self, ofs: usize) -> Result<u32, Error> {
        check_buffer_size(&self, ofs + 4)?;
        Ok(BigEndian::read_u32(&self[ofs..ofs+4]))
    }

    fn read16b(&self, ofs: usize) -> Result<u16, Error> {
        check_buffer_size(&self, ofs + 2)?;
        Ok(BigEndian::read_u16(&self[ofs..ofs+2]))
    }

    fn read8(&self, ofs: usize) -> Result<u8, Error> {
        check_buffer_size(&self, ofs + 1)?;
        Ok(self[ofs])
    }

    fn read8i(&self, ofs: usize) -> Result<i8, Error> {
        check_buffer_size(&self, ofs + 1)?;
        Ok(self[ofs] as i8)
    }

    fn read32b_array(&self, ofs: usize, num: usize) -> Result<Vec<u32>, Error> {
        check_buffer_size(&self, ofs + 4*num)?;
        let mut v = Vec::with_capacity(num);
        for i in 0..num {
            v.push(BigEndian::read_u32(&self[ofs + 4*i..ofs + 4*i + 4]));
        }
        Ok(v)
    }

    fn read16b_array(&self, ofs: usize, num: usize) -> Result<Vec<u16>, Error> {
        check_buffer_size(&self, ofs + 2*num)?;
        let mut v = Vec::with_capacity(num);
        for i in 0..num {
            v.push(BigEndian::read_u16(&self[ofs + 2*i..ofs + 2*i + 2]));
        }
        Ok(v)
    }

    fn slice(&self, start: usize, size: usize) -> Result<&[u8], Error> {
        check_buffer_size(&self, start + size)?;
        Ok(&self[start..start + size])
    }
}

fn check_buffer_size(b: &[u8], size: usize) -> Result<(), Error> {
    if size > b.len() {
        return Err(Error::Load("short read".to_owned()))
    }
    Ok(())
}

pub fn note_to_rate(note: usize, finetune: isize) -> f64 {
    let n = if note > 127 { 127 } else { note };
    NOTE_RATE[n] * 2.0_f64.powf(finetune as f64 / 96.0)
}

// Amiga-style period arithmetic, used by the pitch slide effects
pub fn rate_to_period(rate: f64) -> f64 {
    if rate < 1.0 {
        return MASTER_CLOCK
    }
    MASTER_CLOCK / rate
}

pub fn period_to_rate(period: f64) -> f64 {
    if period < 1.0 {
        return 0.0
    }
    MASTER_CLOCK / period
}
