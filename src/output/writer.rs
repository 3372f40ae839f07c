use chrono::{Local, NaiveDate};
use log::{debug, error, info};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::domain::email::EmailRecords;
use crate::domain::mailbox::decode_wire;
use crate::mail::decoders::clean_text;
use crate::pipeline::resolver::MailboxSummary;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
const RULE_WIDTH: usize = 40;

/// `out/mails.txt` -> `out/mails_20240612.txt`.
pub fn dated_path(path: &Path, date: NaiveDate) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!("{stem}_{}", date.format("%Y%m%d"));
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

pub fn today_path(path: &Path) -> PathBuf {
    dated_path(path, Local::now().date_naive())
}

pub fn format_records(records: &EmailRecords) -> Vec<String> {
    let mut lines = Vec::with_capacity(records.len() * 7);
    for record in records.iter() {
        lines.push(format!("Mailbox: {}", decode_wire(record.mailbox())));
        lines.push(format!("UID: {}", record.uid()));
        lines.push(format!("To: {}", record.recipient.as_deref().unwrap_or_default()));
        lines.push(format!("Subject: {}", record.subject.as_deref().unwrap_or_default()));
        lines.push(format!("Date: {}", record.received_at_text(DATE_FORMAT)));
        lines.push("Body:".to_string());
        lines.push(clean_text(record.body.as_deref().unwrap_or_default()));
        lines.push("-".repeat(RULE_WIDTH));
    }
    lines
}

/// Writes one line per entry, creating parent directories as needed.
pub fn write_lines(path: &Path, lines: &[String]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(fs::File::create(path)?);
    for line in lines {
        writeln!(out, "{}", line.trim_end_matches('\n'))?;
    }
    out.flush()
}

/// Writes the records to `path`. Returns false when there was nothing to
/// write or the file could not be written.
pub fn write_records(path: &Path, records: &EmailRecords) -> bool {
    if records.is_empty() {
        debug!("no records to write, skipping {}", path.display());
        return false;
    }
    match write_lines(path, &format_records(records)) {
        Ok(()) => {
            info!("wrote {} records to {}", records.len(), path.display());
            true
        }
        Err(e) => {
            error!("cannot write {}: {e}", path.display());
            false
        }
    }
}

/// `Mailboxes:` then one `- display (wire): count` line each. With
/// `sort_by_count` the fullest mailbox comes first, ties by name.
pub fn format_mailbox_listing(summaries: &[MailboxSummary], sort_by_count: bool) -> Vec<String> {
    let mut sorted: Vec<&MailboxSummary> = summaries.iter().collect();
    if sort_by_count {
        sorted.sort_by(|a, b| {
            b.messages
                .cmp(&a.messages)
                .then_with(|| a.name.display().cmp(b.name.display()))
        });
    }

    let mut lines = Vec::with_capacity(sorted.len() + 1);
    lines.push("Mailboxes:".to_string());
    lines.extend(
        sorted
            .into_iter()
            .map(|s| format!("- {} ({}): {}", s.name.display(), s.name.wire(), s.messages)),
    );
    lines
}

pub fn write_mailbox_listing(path: &Path, summaries: &[MailboxSummary], sort_by_count: bool) -> bool {
    match write_lines(path, &format_mailbox_listing(summaries, sort_by_count)) {
        Ok(()) => {
            info!("wrote {} mailboxes to {}", summaries.len(), path.display());
            true
        }
        Err(e) => {
            error!("cannot write {}: {e}", path.display());
            false
        }
    }
}
