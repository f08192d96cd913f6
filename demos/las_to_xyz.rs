use las_stream::{LasReader, RemainderPolicy, StreamOptions};
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::ControlFlow;
use std::path::Path;

fn main() -> las_stream::Result<()> {
    let lasfn = env::args().nth(1).expect("LAS file required");

    let mut reader = LasReader::from_path(&lasfn)?;

    let dest = Path::new(&lasfn).with_extension("xyz");
    println!("Writing {:?}", &dest);
    let mut file = BufWriter::new(File::create(dest)?);

    let mut result = Ok(());
    let options = StreamOptions::default().with_remainder(RemainderPolicy::EmitShortPacket);
    reader.stream(options, |packet| {
        for point in &packet {
            let p = point.position;
            if let Err(e) = writeln!(&mut file, "{} {} {}", p.x, p.y, p.z) {
                result = Err(e);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    })?;
    result?;
    file.flush()?;

    Ok(())
}
