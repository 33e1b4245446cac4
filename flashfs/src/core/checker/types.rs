// SPDX-License-Identifier: MIT

#[cfg(all(not(feature = "std"), feature = "alloc"))]
use alloc::{string::String, vec::Vec};
use core::fmt;

use bitflags::bitflags;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug)]
pub struct Finding {
    pub sev: Severity,
    pub code: &'static str,
    pub msg: String,
}

impl Finding {
    pub fn info(code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            sev: Severity::Info,
            code,
            msg: msg.into(),
        }
    }
    pub fn warn(code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            sev: Severity::Warn,
            code,
            msg: msg.into(),
        }
    }
    pub fn err(code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            sev: Severity::Error,
            code,
            msg: msg.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct VerifyReport {
    pub findings: Vec<Finding>,
}

impl VerifyReport {
    pub fn has_error(&self) -> bool {
        self.findings.iter().any(|f| f.sev == Severity::Error)
    }

    pub fn first_error(&self) -> Option<&str> {
        self.findings
            .iter()
            .find(|f| f.sev == Severity::Error)
            .map(|f| f.msg.as_str())
    }

    pub fn ok(&self) -> bool {
        !self.has_error()
    }

    pub fn push(&mut self, f: Finding) {
        self.findings.push(f)
    }

    pub fn count(&self, s: Severity) -> usize {
        self.findings.iter().filter(|f| f.sev == s).count()
    }

    /// Findings carrying `code`.
    pub fn with_code<'r>(&'r self, code: &'r str) -> impl Iterator<Item = &'r Finding> + 'r {
        self.findings.iter().filter(move |f| f.code == code)
    }

    pub fn display_with(&self, opts: ReportDisplayOpts) -> ReportDisplay<'_> {
        ReportDisplay::new(self, opts)
    }

    pub fn errors_only(&self) -> ReportDisplay<'_> {
        self.display_with(ReportDisplayOpts {
            min_level: Severity::Error,
            ..ReportDisplayOpts::default()
        })
    }
}

#[derive(Copy, Clone, Debug)]
pub struct ReportDisplayOpts {
    pub min_level: Severity,
    pub prefix: &'static str,
    pub show_summary: bool,
    pub pad_code: usize,
}

impl Default for ReportDisplayOpts {
    fn default() -> Self {
        Self {
            min_level: Severity::Info,
            prefix: "",
            show_summary: false,
            pad_code: 10,
        }
    }
}

pub struct ReportDisplay<'a> {
    rep: &'a VerifyReport,
    opts: ReportDisplayOpts,
}

impl<'a> ReportDisplay<'a> {
    pub fn new(rep: &'a VerifyReport, opts: ReportDisplayOpts) -> Self {
        Self { rep, opts }
    }
}

impl fmt::Display for ReportDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts = [0usize; 3];

        for it in &self.rep.findings {
            if it.sev < self.opts.min_level {
                continue;
            }
            let tag = match it.sev {
                Severity::Info => "INFO",
                Severity::Warn => "WARN",
                Severity::Error => "ERR ",
            };
            counts[it.sev as usize] += 1;

            writeln!(
                f,
                "{}{tag}: {:<width$} {}",
                self.opts.prefix,
                it.code,
                it.msg,
                width = self.opts.pad_code
            )?;
        }

        if self.opts.show_summary {
            writeln!(
                f,
                "{}Summary: errors={}  warns={}  infos={}",
                self.opts.prefix, counts[2], counts[1], counts[0]
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ReportDisplay::new(self, ReportDisplayOpts::default()).fmt(f)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct VerifyPhases: u32 {
        /// Every valid record passes the layout's own consistency rules.
        const RECORDS    = 1 << 0;
        /// Chunk sets are complete and contiguous.
        const CHAIN      = 1 << 1;
        /// At most one live generation per name.
        const NAMES      = 1 << 2;
        /// Stored digests match the payloads.
        const CONTENT    = 1 << 3;
        /// Space accounting matches a fresh scan.
        const ACCOUNTING = 1 << 4;
        const ALL        = u32::MAX;
    }
}

/// Generic options a checker can extend.
pub trait VerifierOptionsLike {
    fn phases(&self) -> VerifyPhases {
        VerifyPhases::ALL
    }
    fn fail_fast(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CheckOptions {
    pub phases: VerifyPhases,
    pub fail_fast: bool,
}

impl VerifierOptionsLike for CheckOptions {
    fn phases(&self) -> VerifyPhases {
        self.phases
    }
    fn fail_fast(&self) -> bool {
        self.fail_fast
    }
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            phases: VerifyPhases::ALL,
            fail_fast: false,
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_report_display_filters() {
        let mut rep = VerifyReport::default();
        rep.push(Finding::info("RECORDS", "3 records"));
        rep.push(Finding::warn("ORPHAN", "id 4 has no head"));
        rep.push(Finding::err("DIGEST", "id 2 digest mismatch"));

        assert!(rep.has_error());
        assert_eq!(rep.first_error(), Some("id 2 digest mismatch"));
        assert_eq!(rep.count(Severity::Warn), 1);
        assert_eq!(rep.with_code("ORPHAN").count(), 1);

        let text = rep.errors_only().to_string();
        assert_eq!(text, "ERR : DIGEST     id 2 digest mismatch\n");

        let text = rep
            .display_with(ReportDisplayOpts {
                show_summary: true,
                ..Default::default()
            })
            .to_string();
        assert!(text.ends_with("Summary: errors=1  warns=1  infos=1\n"));
    }
}
