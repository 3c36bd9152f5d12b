extern crate getopts;
extern crate hound;
extern crate oxmed;

use std::env;
use std::error::Error;
use std::fs;
use getopts::Options;
use oxmed::{Oxmed, FrameInfo};

fn main() {

    let args: Vec<String> = env::args().collect();
    let mut opts = Options::new();

    opts.optflag("h", "help", "display usage information and exit");
    opts.optflag("i", "info", "show module information and exit");
    opts.optopt("o", "output", "write output to the given WAV file", "FILE");
    opts.optopt("r", "rate", "sampling rate (default 44100)", "HZ");
    opts.optopt("l", "loops", "number of times to loop (default 1)", "N");
    opts.optflag("b", "boost", "raise output gain at the cost of headroom");
    opts.optflag("n", "nearest", "disable sample interpolation");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };

    if matches.opt_present("h") || matches.free.len() < 1 {
        let brief = format!("Usage: {} [options] filename", args[0]);
        print!("{}", opts.usage(&brief));
        return;
    }

    match run(&matches.free[0], &matches) {
        Ok(_)  => {},
        Err(e) => println!("Error: {}", e),
    }
}

fn run(name: &String, matches: &getopts::Matches) -> Result<(), Box<Error>> {
    let data = fs::read(name)?;

    let oxmed = Oxmed::new(&data, "")?;
    let module = oxmed.module();
    println!("Format : {}", module.description);
    println!("Creator: {}", module.creator);
    println!("Title  : {}", module.title());
    println!("Tracks : {}", module.data.channels());
    println!("Songs  : {}", module.data.num_songs());

    println!("Instruments:");
    for ins in module.data.instruments() {
        if ins.name.is_empty() && module.data.samples()[ins.num].size == 0 {
            continue;
        }
        let smp = &module.data.samples()[ins.num];
        println!("{:3}: {:30} {:3} {:2}-bit {:6} {}", ins.num + 1, ins.name,
            ins.volume, smp.bits(), smp.size,
            if ins.has_loop { 'L' } else { ' ' });
    }

    let mut player = oxmed.player()?;
    let rate: u32 = match matches.opt_str("r") {
        Some(val) => val.parse()?,
        None      => 44100,
    };
    let loops: usize = match matches.opt_str("l") {
        Some(val) => val.parse()?,
        None      => 1,
    };
    player.set_rate(rate);
    player.enable_boost(matches.opt_present("b"));
    if matches.opt_present("n") {
        player.set_interpolator(oxmed::mixer::interpolator::Interpolator::Nearest);
    }
    player.start();

    println!("Length : {} positions, {} ms", player.num_positions(), player.total_time());

    if matches.opt_present("i") {
        return Ok(());
    }

    let out_name = match matches.opt_str("o") {
        Some(val) => val,
        None      => "out.wav".to_owned(),
    };

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&out_name, spec)?;

    let mut frame_info = FrameInfo::new();
    let mut buffer = vec![0_i16; 8192];
    let mut last_pos = usize::max_value();

    loop {
        player.fill_buffer(&mut buffer, loops);
        if player.end() && player.loop_count() >= loops {
            break;
        }

        player.info(&mut frame_info);
        if frame_info.pos != last_pos {
            last_pos = frame_info.pos;
            println!("pos:{:3} row:{:2} speed:{} tempo:{}",
                frame_info.pos, frame_info.row, frame_info.speed, frame_info.tempo);
        }

        for s in &buffer {
            writer.write_sample(*s)?;
        }
    }

    writer.finalize()?;
    println!("Wrote {}", out_name);

    Ok(())
}
