use chrono::Local;
use env_logger::{Builder, Env, Target};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;

use crate::error::Result;
use crate::output::writer::today_path;

/// Writes everything to both sinks.
pub struct Tee<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

fn open_log_file(path: &Path) -> io::Result<(fs::File, PathBuf)> {
    let path = today_path(path);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((file, path))
}

/// Installs the global logger. `RUST_LOG` wins over `level` when set.
/// With a `log_file`, lines go to stdout and to a dated copy of that
/// file; the path actually used is returned.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<Option<PathBuf>> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(level));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] [{}] {} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            thread::current().name().unwrap_or("unnamed"),
            record.target(),
            record.args()
        )
    });

    let opened = match log_file {
        Some(path) => {
            let (file, path) = open_log_file(path)?;
            builder.target(Target::Pipe(Box::new(Tee::new(io::stdout(), file))));
            Some(path)
        }
        None => {
            builder.target(Target::Stdout);
            None
        }
    };

    builder.try_init()?;
    Ok(opened)
}
