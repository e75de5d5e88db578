use std::env;
use std::fs::{self, File};
use std::path::PathBuf;

use tspaf::demux::{Demux, DemuxConfig};
use tspaf::stream::PacketStream;

fn main() {
    pretty_env_logger::init();
    let mut args = env::args().skip(1);
    let input_path = args.next().expect("usage: index_ts <input.ts> [output_dir]");
    let output_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("paf_out"));

    fs::create_dir_all(&output_dir).expect("unable to create output dir");

    let file = File::open(&input_path).expect("unable to open input file");
    let mut stream = PacketStream::open(file).expect("unable to identify packet shape");
    println!("detected shape: {:?}", stream.shape());

    let mut demux = Demux::new(DemuxConfig::default());
    let mut count: u64 = 0;
    demux
        .run(&mut stream, &output_dir, &mut || {
            count += 1;
            if count % 100_000 == 0 {
                eprintln!("{} packets processed", count);
            }
        })
        .expect("demux run failed");

    println!("done: {} packets processed", count);
}
