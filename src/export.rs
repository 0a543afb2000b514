use std::fmt::Display;
use std::io::Write;
use std::path::Path;

use crate::sample::Sample;

// every row is the host time in seconds followed by the channel values
fn row(sample: &Sample) -> impl Iterator<Item = f64> + '_ {
    std::iter::once(sample.host_time_secs()).chain(sample.values.iter().copied())
}

fn write_csv_row<I, T>(writer: &mut impl Write, items: I) -> std::io::Result<()>
where
    I: Iterator<Item = T>,
    T: Display,
{
    let row = items
        .map(|item| format!("{}", item))
        .reduce(|row, item_string| row + "," + &item_string)
        .unwrap_or_default();

    writer.write_all(row.as_bytes())?;
    writer.write_all(b"\n")?;

    Ok(())
}

pub fn write_csv(filename: &Path, samples: &[Sample]) -> std::io::Result<()> {
    let width = match samples.first() {
        Some(sample) => sample.width(),
        // nothing to do
        None => return Ok(()),
    };

    let mut file = std::io::BufWriter::new(std::fs::File::create(filename)?);

    let header = std::iter::once("t".to_string()).chain((0..width).map(|i| format!("ch{}", i)));
    write_csv_row(&mut file, header)?;

    for sample in samples {
        debug_assert_eq!(sample.width(), width);

        write_csv_row(&mut file, row(sample))?;
    }

    file.into_inner()
        .map_err(|err| err.into_error())?
        .sync_all()?;

    Ok(())
}

pub fn write_npy(filename: &Path, samples: &[Sample]) -> std::io::Result<()> {
    use npyz::WriterBuilder;

    let width = match samples.first() {
        Some(sample) => sample.width(),
        // nothing to do
        None => return Ok(()),
    };

    let mut file = std::fs::File::create(filename)?;

    let mut writer = {
        npyz::WriteOptions::new()
            .default_dtype()
            .shape(&[samples.len() as u64, width as u64 + 1])
            .writer(&mut file)
            .begin_nd()?
    };

    for sample in samples {
        debug_assert_eq!(sample.width(), width);

        writer.extend(row(sample))?;
    }

    writer.finish()?;
    file.sync_all()?;

    Ok(())
}
