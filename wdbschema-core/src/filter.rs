//! Emission filtering and batch formatting.
//!
//! Drops generator boilerplate (session-setting statements) and empty
//! placeholder lines, then writes each surviving statement block followed by
//! the batch separator and a blank line. Pure aside from writer I/O.

use std::collections::HashSet;
use std::io::Write;

use crate::error::{Result, SchemaScriptError};

/// The batch separator conventionally understood by T-SQL tooling.
pub const BATCH_SEPARATOR: &str = "GO";

/// Session-setting statements the scripting layer should not reproduce.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "SET ANSI_NULLS ON",
    "SET QUOTED_IDENTIFIER ON",
    "SET ANSI_PADDING ON",
    "SET ANSI_PADDING OFF",
];

/// Line-level filter applied to generated statement blocks before emission.
#[derive(Debug, Clone)]
pub struct EmissionFilter {
    exclusions: HashSet<String>,
}

impl Default for EmissionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUSIONS.iter().map(|s| (*s).to_string()))
    }
}

impl EmissionFilter {
    pub fn new(exclusions: impl IntoIterator<Item = String>) -> Self {
        Self {
            exclusions: exclusions.into_iter().collect(),
        }
    }

    /// Filters one statement block, returning `None` when nothing survives.
    pub fn filter_block(&self, block: &str) -> Option<String> {
        let kept: Vec<&str> = block
            .lines()
            .filter(|line| !self.exclusions.contains(line.trim()))
            .collect();

        let joined = kept.join("\n");
        if joined.trim().is_empty() {
            None
        } else {
            Some(joined)
        }
    }

    /// Writes statement blocks to `writer`, each terminated by the batch
    /// separator and a blank line. Blocks that filter down to nothing are
    /// skipped entirely, separator included.
    pub fn write_script<W, I>(&self, writer: &mut W, blocks: I) -> Result<()>
    where
        W: Write,
        I: IntoIterator<Item = Result<String>>,
    {
        for block in blocks {
            let block = block?;
            let Some(kept) = self.filter_block(&block) else {
                continue;
            };
            writeln!(writer, "{kept}\n{BATCH_SEPARATOR}\n").map_err(|e| {
                SchemaScriptError::Io {
                    context: "failed to write script to output stream".to_string(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excluded_lines_never_reach_the_output() {
        let filter = EmissionFilter::default();
        let block = "SET ANSI_NULLS ON\nCREATE TABLE [dbo].[t] (\n    [id] int NOT NULL\n);";
        let kept = filter.filter_block(block).unwrap();

        assert!(!kept.contains("SET ANSI_NULLS ON"));
        assert!(kept.contains("CREATE TABLE"));
    }

    #[test]
    fn blocks_that_filter_to_nothing_are_dropped() {
        let filter = EmissionFilter::default();
        assert_eq!(filter.filter_block("SET ANSI_NULLS ON"), None);
        assert_eq!(filter.filter_block(""), None);
        assert_eq!(filter.filter_block("   \n  "), None);
    }

    #[test]
    fn every_block_ends_with_separator_and_blank_line() {
        let filter = EmissionFilter::default();
        let blocks = vec![
            Ok("CREATE TABLE [dbo].[a] (\n    [id] int NOT NULL\n);".to_string()),
            Ok("CREATE VIEW [dbo].[v] AS SELECT 1 AS x".to_string()),
        ];

        let mut out = Vec::new();
        filter.write_script(&mut out, blocks).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.matches("\nGO\n\n").count(), 2);
        let first_go = text.find("\nGO\n").unwrap();
        assert!(text[..first_go].contains("CREATE TABLE"));
        assert!(text[first_go..].contains("CREATE VIEW"));
    }

    #[test]
    fn custom_exclusion_sets_are_honored() {
        let filter = EmissionFilter::new(["PRINT 'done'".to_string()]);
        let kept = filter
            .filter_block("PRINT 'done'\nSET ANSI_NULLS ON\nSELECT 1")
            .unwrap();

        // Only the custom set applies; the default boilerplate passes through
        assert!(kept.contains("SET ANSI_NULLS ON"));
        assert!(!kept.contains("PRINT"));
    }

    #[test]
    fn generator_errors_propagate_through_emission() {
        let filter = EmissionFilter::default();
        let blocks = vec![
            Ok("SELECT 1".to_string()),
            Err(crate::error::SchemaScriptError::configuration("boom")),
        ];
        let mut out = Vec::new();
        assert!(filter.write_script(&mut out, blocks).is_err());
    }
}
