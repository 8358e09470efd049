// src/pipeline/stream.rs
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::Instant;

use crate::error::ProcessingError;
use crate::pipeline::config::{ErrorStrategy, PipelineConfig};
use crate::pipeline::context::{Event, PipelineContext, ProcessingStats};
use crate::processor::ViaqProcessor;
use crate::record::Record;

/// Main pipeline orchestrator
pub struct StreamPipeline {
    processor: Arc<ViaqProcessor>,
    context: PipelineContext,
    config: PipelineConfig,
    stats: ProcessingStats,
}

fn is_broken_pipe(err: &ProcessingError) -> bool {
    matches!(err, ProcessingError::IoError(e) if e.kind() == ErrorKind::BrokenPipe)
}

impl StreamPipeline {
    pub fn new(config: PipelineConfig, processor: Arc<ViaqProcessor>) -> Self {
        StreamPipeline {
            processor,
            context: PipelineContext::new(),
            config,
            stats: ProcessingStats::default(),
        }
    }

    /// Buffer an unbuffered source with the configured capacity and process it.
    pub fn process_reader<R: Read, W: Write>(
        &mut self,
        input: R,
        output: &mut W,
        filename: Option<&str>,
    ) -> Result<ProcessingStats, ProcessingError> {
        let reader = BufReader::with_capacity(self.config.buffer_size, input);
        self.process_stream(reader, output, filename)
    }

    /// Process a single file/stream
    pub fn process_stream<R: BufRead, W: Write>(
        &mut self,
        input: R,
        output: &mut W,
        filename: Option<&str>,
    ) -> Result<ProcessingStats, ProcessingError> {
        let start_time = Instant::now();

        self.context.file_name = filename.map(|s| s.to_string());
        self.context.line_number = 0;

        let mut file_stats = ProcessingStats::default();

        for line_result in input.lines() {
            let line = match line_result {
                Ok(line) => line,
                Err(e) => {
                    if e.kind() == ErrorKind::UnexpectedEof {
                        break;
                    }
                    return Err(ProcessingError::IoError(e));
                }
            };

            self.context.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            file_stats.records_processed += 1;

            let record = match self.process_line(&line) {
                Ok(record) => record,
                Err(err) => match self.config.error_strategy {
                    ErrorStrategy::FailFast => return Err(err),
                    ErrorStrategy::Skip => {
                        file_stats.errors += 1;
                        tracing::warn!(
                            target: "viaq",
                            "{}line {}: {}, skipping",
                            self.location(),
                            self.context.line_number,
                            err
                        );
                        continue;
                    }
                },
            };

            if record.is_empty() {
                file_stats.empty_records += 1;
            }

            if let Err(e) = self.write_record(output, &record) {
                if is_broken_pipe(&e) {
                    break;
                }
                return Err(e);
            }
            file_stats.records_output += 1;
        }

        file_stats.processing_time = start_time.elapsed();
        self.stats.merge(&file_stats);

        Ok(file_stats)
    }

    fn process_line(&self, line: &str) -> Result<Record, ProcessingError> {
        if line.len() > self.config.max_line_length {
            return Err(ProcessingError::LineTooLong {
                length: line.len(),
                max_length: self.config.max_line_length,
            });
        }

        let event = Event::parse(line, self.context.line_number, self.config.default_tag.as_deref())?;
        let time = event.time.unwrap_or_else(|| self.processor.now());
        if self.config.debug {
            tracing::debug!(target: "viaq", "line {}: tag {}", self.context.line_number, event.tag);
        }
        Ok(self.processor.process(&event.tag, time, event.record))
    }

    fn location(&self) -> String {
        match &self.context.file_name {
            Some(name) => format!("{}: ", name),
            None => String::new(),
        }
    }

    fn write_record<W: Write>(&self, output: &mut W, record: &Record) -> Result<(), ProcessingError> {
        serde_json::to_writer(&mut *output, record).map_err(std::io::Error::from)?;
        writeln!(output)?;
        Ok(())
    }

    /// Get current accumulated stats
    pub fn get_stats(&self) -> &ProcessingStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViaqConfig;
    use crate::metadata::Identity;
    use serde_json::Value;
    use std::io::Cursor;

    fn pipeline(config: PipelineConfig) -> StreamPipeline {
        let processor = ViaqProcessor::new(&ViaqConfig::default(), Identity::default()).unwrap();
        StreamPipeline::new(config, Arc::new(processor))
    }

    #[test]
    fn test_envelopes_become_records() {
        let mut p = pipeline(PipelineConfig::default());
        let input = Cursor::new(
            "{\"tag\":\"a\",\"time\":1501176466,\"record\":{\"x\":\"y\",\"e\":\"\"}}\n\n{\"tag\":\"b\",\"record\":{\"z\":1}}\n",
        );
        let mut output = Vec::new();
        let stats = p.process_stream(input, &mut output, None).unwrap();
        assert_eq!(stats.records_processed, 2);
        assert_eq!(stats.records_output, 2);
        assert_eq!(stats.errors, 0);

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["x"], "y");
        assert!(lines[0].get("e").is_none());
        assert!(lines[1]["pipeline_metadata"]["collector"].is_object());
    }

    #[test]
    fn test_skip_strategy_counts_errors() {
        let mut p = pipeline(PipelineConfig::default());
        let input = Cursor::new("garbage\n{\"tag\":\"a\",\"record\":{}}\n");
        let mut output = Vec::new();
        let stats = p.process_stream(input, &mut output, Some("in.jsonl")).unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.records_output, 1);
        assert_eq!(p.get_stats().errors, 1);
    }

    #[test]
    fn test_fail_fast_stops_on_first_error() {
        let mut p = pipeline(PipelineConfig {
            error_strategy: ErrorStrategy::FailFast,
            ..PipelineConfig::default()
        });
        let input = Cursor::new("{\"tag\":\"a\",\"record\":{}}\ngarbage\n{\"tag\":\"a\",\"record\":{}}\n");
        let mut output = Vec::new();
        let err = p.process_stream(input, &mut output, None).unwrap_err();
        assert!(matches!(err, ProcessingError::InvalidEvent { line: 2, .. }));
        assert_eq!(String::from_utf8(output).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_line_too_long() {
        let mut p = pipeline(PipelineConfig {
            max_line_length: 10,
            error_strategy: ErrorStrategy::FailFast,
            ..PipelineConfig::default()
        });
        let input = Cursor::new("{\"tag\":\"a\",\"record\":{\"k\":\"long value\"}}\n");
        let err = p.process_stream(input, &mut Vec::new(), None).unwrap_err();
        assert!(matches!(err, ProcessingError::LineTooLong { max_length: 10, .. }));
    }

    #[test]
    fn test_default_tag_reads_bare_records() {
        let mut p = pipeline(PipelineConfig {
            default_tag: Some("mux.ops".to_string()),
            ..PipelineConfig::default()
        });
        let input = Cursor::new("{\"message\":\"hi\"}\n");
        let mut output = Vec::new();
        p.process_stream(input, &mut output, None).unwrap();
        let out: Value = serde_json::from_str(String::from_utf8(output).unwrap().trim()).unwrap();
        assert_eq!(out["message"], "hi");
    }

    #[test]
    fn test_reader_smaller_than_a_line() {
        let mut p = pipeline(PipelineConfig {
            buffer_size: 8,
            ..PipelineConfig::default()
        });
        let input = "{\"tag\":\"a\",\"record\":{\"k\":\"first\"}}\n{\"tag\":\"a\",\"record\":{\"k\":\"second\"}}\n";
        let mut output = Vec::new();
        let stats = p.process_reader(input.as_bytes(), &mut output, None).unwrap();
        assert_eq!(stats.records_output, 2);
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("\"first\""));
        assert!(text.contains("\"second\""));
    }
}
