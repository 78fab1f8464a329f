//! Whitespace-separated result tables.
//!
//! Each pipeline writes one row type per file, headed by the column names of
//! that type. A row is written in one call once all of its values are known,
//! so a log cut short by a failure still parses.

use crate::{RtaResult, Time, config::Seed, pointing::Offset};
use std::{
    fmt::Display,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    marker::PhantomData,
    path::{Path, PathBuf},
};
use tracing::debug;

pub trait LogRow: Display {
    const HEADER: &'static str;
}

/// Fields shared by every row of one run/caldb/irf combination.
#[derive(Debug, Clone, PartialEq)]
pub struct RowContext {
    pub runid: String,
    pub offset: Offset,
    pub delay: Time,
    pub scale_flux: f64,
    pub caldb: String,
    pub irf: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AperturePhotometryRow<'a> {
    pub context: &'a RowContext,
    pub seed: Seed,
    pub start: Time,
    pub stop: Time,
    pub sqrt_ts: f64,
    pub flux: f64,
    pub flux_err: f64,
    pub ra: f64,
    pub dec: f64,
    pub prefactor: f64,
    pub index: f64,
    pub scale: f64,
    pub on: u64,
    pub off: u64,
    pub alpha: f64,
    pub excess: f64,
    pub sigma: f64,
    pub pipe: &'a str,
}

impl LogRow for AperturePhotometryRow<'_> {
    const HEADER: &'static str = "runid seed start stop texp sqrt_ts flux flux_err ra dec prefactor index scale on off alpha excess sigma offset delay scaleflux caldb irf pipe";
}

impl Display for AperturePhotometryRow<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ctx = self.context;
        write!(
            f,
            "{} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
            ctx.runid,
            self.seed,
            self.start,
            self.stop,
            self.stop - self.start,
            self.sqrt_ts,
            self.flux,
            self.flux_err,
            self.ra,
            self.dec,
            self.prefactor,
            self.index,
            self.scale,
            self.on,
            self.off,
            self.alpha,
            self.excess,
            self.sigma,
            ctx.offset,
            ctx.delay,
            ctx.scale_flux,
            ctx.caldb,
            ctx.irf,
            self.pipe
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlindSearchRow<'a> {
    pub context: &'a RowContext,
    pub seed: Seed,
    pub texp: Time,
    pub sqrt_ts: f64,
    pub flux: f64,
    pub flux_err: f64,
    pub ra: f64,
    pub dec: f64,
}

impl LogRow for BlindSearchRow<'_> {
    const HEADER: &'static str =
        "runid seed texp sqrt_ts flux flux_err ra dec offset delay scaleflux caldb irf";
}

impl Display for BlindSearchRow<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ctx = self.context;
        write!(
            f,
            "{} {} {} {} {} {} {} {} {} {} {} {} {}",
            ctx.runid,
            self.seed,
            self.texp,
            self.sqrt_ts,
            self.flux,
            self.flux_err,
            self.ra,
            self.dec,
            ctx.offset,
            ctx.delay,
            ctx.scale_flux,
            ctx.caldb,
            ctx.irf
        )
    }
}

/// Writes the header before the first row, then one line per row.
pub struct LogWriter<W: Write, R: LogRow> {
    writer: W,
    rows: usize,
    phantom: PhantomData<fn(&R)>,
}

impl<W: Write, R: LogRow> LogWriter<W, R> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            rows: 0,
            phantom: PhantomData,
        }
    }

    pub fn append(&mut self, row: &R) -> std::io::Result<()> {
        if self.rows == 0 {
            writeln!(self.writer, "{}", R::HEADER)?;
        }
        writeln!(self.writer, "{row}")?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// A log file replaced on creation and only opened once a row arrives.
pub struct LogFile<R: LogRow> {
    path: PathBuf,
    writer: Option<LogWriter<BufWriter<File>, R>>,
}

impl<R: LogRow> LogFile<R> {
    pub fn create(path: &Path) -> RtaResult<Self> {
        if path.is_file() {
            debug!("Removing previous log {}", path.display());
            std::fs::remove_file(path)?;
        }
        Ok(Self {
            path: path.to_owned(),
            writer: None,
        })
    }

    pub fn append(&mut self, row: &R) -> RtaResult<()> {
        if self.writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(LogWriter::new(BufWriter::new(file)));
        }
        if let Some(writer) = &mut self.writer {
            writer.append(row)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.writer.as_ref().map(LogWriter::rows).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RowContext {
        RowContext {
            runid: "run0406_ID000126".to_owned(),
            offset: Offset::Degrees(0.5),
            delay: 50.0,
            scale_flux: 1.0,
            caldb: "prod5-v0.1".to_owned(),
            irf: "South_z40_0.5h".to_owned(),
        }
    }

    #[test]
    fn header_precedes_first_row_only() {
        let context = context();
        let row = BlindSearchRow {
            context: &context,
            seed: 7,
            texp: 100.0,
            sqrt_ts: f64::NAN,
            flux: f64::NAN,
            flux_err: f64::NAN,
            ra: f64::NAN,
            dec: f64::NAN,
        };
        let mut writer = LogWriter::new(Vec::new());
        writer.append(&row).unwrap();
        writer.append(&row).unwrap();
        assert_eq!(writer.rows(), 2);

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines.first().copied(), Some(BlindSearchRow::HEADER));
        assert_eq!(
            lines.last().copied(),
            Some("run0406_ID000126 7 100 NaN NaN NaN NaN NaN 0.5 50 1 prod5-v0.1 South_z40_0.5h")
        );
    }

    #[test]
    fn aperture_row_matches_header_width() {
        let context = context();
        let row = AperturePhotometryRow {
            context: &context,
            seed: 1,
            start: 50.0,
            stop: 150.0,
            sqrt_ts: f64::NAN,
            flux: 1.5e-9,
            flux_err: f64::NAN,
            ra: 33.0,
            dec: -51.0,
            prefactor: f64::NAN,
            index: -2.1,
            scale: f64::NAN,
            on: 40,
            off: 30,
            alpha: 0.2,
            excess: 34.0,
            sigma: 7.5,
            pipe: "rtatool1d",
        };
        let line = row.to_string();
        let fields = line.split(' ').collect::<Vec<_>>();
        assert_eq!(fields.len(), AperturePhotometryRow::HEADER.split(' ').count());
        assert_eq!(fields.get(4).copied(), Some("100"));
        assert_eq!(fields.last().copied(), Some("rtatool1d"));
    }
}
