use crate::detection::{ExcitationEvent, FailureCount};
use std::{
    fs::File,
    io::{BufWriter, Error, Write},
    path::Path,
};

pub trait SavablePoint {
    const HEADER: &'static str;

    fn write_to_file<W: Write>(&self, file: &mut W) -> Result<(), Error>;
}

impl SavablePoint for ExcitationEvent {
    const HEADER: &'static str = "fileID,particleID,t_0,deltat,amplitude";

    fn write_to_file<W: Write>(&self, file: &mut W) -> Result<(), Error> {
        writeln!(file, "{0}", self)
    }
}

impl SavablePoint for &ExcitationEvent {
    const HEADER: &'static str = ExcitationEvent::HEADER;

    fn write_to_file<W: Write>(&self, file: &mut W) -> Result<(), Error> {
        ExcitationEvent::write_to_file(self, file)
    }
}

impl SavablePoint for FailureCount {
    const HEADER: &'static str = "fit_failed,too_wide";

    fn write_to_file<W: Write>(&self, file: &mut W) -> Result<(), Error> {
        writeln!(file, "{0}", self)
    }
}

pub trait SaveToFileFilter<I>
where
    I: Iterator,
    I::Item: SavablePoint,
{
    /// Writes a header line followed by one line per item.
    fn save_to_writer<W: Write>(self, writer: &mut W) -> Result<(), Error>;

    fn save_to_file(self, path: &Path) -> Result<(), Error>;
}

impl<I> SaveToFileFilter<I> for I
where
    I: Iterator,
    I::Item: SavablePoint,
{
    fn save_to_writer<W: Write>(self, writer: &mut W) -> Result<(), Error> {
        writeln!(writer, "{0}", <I::Item as SavablePoint>::HEADER)?;
        for item in self {
            item.write_to_file(writer)?;
        }
        Ok(())
    }

    fn save_to_file(self, path: &Path) -> Result<(), Error> {
        let mut file = BufWriter::new(File::create(path)?);
        self.save_to_writer(&mut file)?;
        file.flush()
    }
}
