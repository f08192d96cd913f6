use http_range_client::UreqHttpReader as HttpReader;
use las_stream::{stream_to_channel, LasReader, StreamEvent, StreamOptions};
use std::env;
use std::sync::mpsc::sync_channel;
use std::thread;

fn main() -> las_stream::Result<()> {
    env_logger::init();
    let url = env::args().nth(1).expect("URL of a LAS file required");
    let mut http_reader = HttpReader::new(&url);
    http_reader.set_min_req_size(262144); // 256KB

    let reader = LasReader::new(http_reader)?;
    let header = *reader.header();
    let http_reader = reader.into_inner();

    // at most two decoded packets wait for the consumer
    let (tx, rx) = sync_channel(2);
    let worker = thread::spawn(move || {
        stream_to_channel(http_reader, &header, StreamOptions::new(50_000), tx)
    });

    let mut max_z: f64 = f64::NEG_INFINITY;
    for event in rx {
        match event {
            StreamEvent::Packet(packet) => {
                for point in &packet {
                    max_z = max_z.max(point.position.z);
                }
            }
            StreamEvent::Finished(summary) => println!("{summary:?}"),
            StreamEvent::Error(e) => return Err(e),
        }
    }
    let _ = worker.join();
    println!("Max Z: {max_z}");

    Ok(())
}
