use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

/// Where formatted log lines go: stderr as formatted, and a plain-text copy in
/// the log file once `--log-file` has been applied.
#[derive(Clone, Default)]
struct LogSink {
    file: Arc<RwLock<Option<File>>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogSink {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = io::stderr().write(buf)?;
        if let Ok(mut guard) = self.file.write() {
            if let Some(file) = guard.as_mut() {
                let _ = file.write_all(&strip_ansi(&buf[..written]));
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Ok(mut guard) = self.file.write() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

/// Drops `ESC [ ... <final byte>` color sequences.
fn strip_ansi(buf: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(buf.len());
    let mut bytes = buf.iter().copied().peekable();
    while let Some(byte) = bytes.next() {
        if byte == 0x1b && bytes.peek() == Some(&b'[') {
            bytes.next();
            for next in bytes.by_ref() {
                if (0x40..=0x7e).contains(&next) {
                    break;
                }
            }
            continue;
        }
        out.push(byte);
    }
    out
}

static SINK: OnceLock<LogSink> = OnceLock::new();

/// Installs the global subscriber. `log` records are forwarded into it, and
/// `RUST_LOG` overrides the default `info` filter.
pub fn init() {
    let _ = tracing_log::LogTracer::init();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let sink = SINK.get_or_init(LogSink::default).clone();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(sink)
        .try_init();
}

/// Points the file copy at `log_file`, creating parent directories, or stops
/// it with `None`. A no-op before `init`.
pub fn set_log_file(log_file: Option<&Path>) -> io::Result<()> {
    let Some(sink) = SINK.get() else {
        return Ok(());
    };
    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Some(OpenOptions::new().create(true).append(true).open(path)?)
        }
        None => None,
    };
    if let Ok(mut guard) = sink.file.write() {
        *guard = file;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_receives_plain_records() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pmt.log");

        set_log_file(Some(&path)).unwrap();
        let mut sink = SINK.get().unwrap().clone();
        sink.write_all(b"\x1b[32m INFO\x1b[0m \x1b[2mpmt::catalog\x1b[0m: hello log\n")
            .unwrap();
        sink.flush().unwrap();
        set_log_file(None).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(" INFO pmt::catalog: hello log"), "{contents:?}");
        assert!(!contents.contains('\x1b'));
    }

    #[test]
    fn strip_ansi_keeps_plain_text() {
        assert_eq!(strip_ansi(b"no colors here"), b"no colors here".to_vec());
        assert_eq!(strip_ansi(b"\x1b[1;31mred\x1b[0m!"), b"red!".to_vec());
        assert_eq!(strip_ansi(b"lone \x1b escape"), b"lone \x1b escape".to_vec());
    }
}
