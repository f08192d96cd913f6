use las_stream::{LasReader, RemainderPolicy, StreamOptions, DEFAULT_PACKET_SIZE};
use std::env;
use std::ops::ControlFlow;

fn main() -> las_stream::Result<()> {
    env_logger::init();
    let lasfn = env::args().nth(1).expect("LAS file required");
    let packet_size = env::args()
        .nth(2)
        .and_then(|n| n.parse().ok())
        .unwrap_or(DEFAULT_PACKET_SIZE);

    let mut reader = LasReader::from_path(&lasfn)?;
    let header = *reader.header();
    dbg!(&header);
    let center = header.center();
    println!("Center: ({}, {}, {})", center.x, center.y, center.z);

    let options = StreamOptions::new(packet_size).with_remainder(RemainderPolicy::EmitShortPacket);
    let summary = reader.stream(options, |packet| {
        if let Some(first) = packet.points.first() {
            println!(
                "Packet {}: {} points, first at ({}, {}, {})",
                packet.index,
                packet.len(),
                first.position.x,
                first.position.y,
                first.position.z
            );
        }
        ControlFlow::Continue(())
    })?;
    println!("{summary:?}");

    Ok(())
}
