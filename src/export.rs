//! Static IOC database export for the bulk variables.
//!
//! One `ai` record per bulk variable, linked through the OPCUA device support.
//! Output depends only on the arguments, so repeated runs are byte-identical.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::bulk::MANY_OBJECTS_NAME;
use crate::error::{ServerError, ServerResult};

/// Write one record for `name` whose input link is `link`.
pub fn write_record<W: Write>(out: &mut W, name: &str, link: &str) -> io::Result<()> {
    writeln!(out, "record(ai,{name}) {{")?;
    writeln!(out, "  field(DESC,\"{name}\")")?;
    writeln!(out, "  field(SCAN,\"I/O Intr\")")?;
    writeln!(out, "  field(PINI,YES)")?;
    writeln!(out, "  field(TSE, -2)")?;
    writeln!(out, "  field(DTYP,OPCUA)")?;
    writeln!(out, "  field(DISS,INVALID)")?;
    writeln!(out, "  field(INP,\"{link}\")")?;
    writeln!(out, "}}")
}

/// Write `count` records, numbered from 0, to `out`.
pub fn emit<W: Write>(count: usize, namespace: u16, out: &mut W) -> io::Result<()> {
    for i in 0..count {
        let name = format!("{MANY_OBJECTS_NAME}:var{i}");
        let link = format!("{namespace}:{MANY_OBJECTS_NAME}.var{i}");
        write_record(out, &name, &link)?;
    }
    Ok(())
}

/// Create (or truncate) `path` and emit the records into it.
pub fn emit_to_file(path: &Path, count: usize, namespace: u16) -> ServerResult<()> {
    let wrap = |source| ServerError::ExportIo { path: path.to_path_buf(), source };
    let file = File::create(path).map_err(wrap)?;
    let mut out = BufWriter::new(file);
    emit(count, namespace, &mut out).map_err(wrap)?;
    out.flush().map_err(wrap)?;
    info!(path=%path.display(), count, "export database written");
    Ok(())
}
