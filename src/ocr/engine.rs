use image::GrayImage;
use std::fs;
use std::io::{ErrorKind, Read, Seek};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

use super::setup::{find_tessdata_dir, find_tesseract_executable};
use super::{OcrToken, RecognizerError, TextRecognizer};
use crate::config::AnalyzerConfig;

/// TSV row level for individual words.
const WORD_LEVEL: i32 = 5;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs the Tesseract CLI and reads its TSV word output.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    executable: Option<PathBuf>,
    tessdata_dir: Option<PathBuf>,
    language: String,
    timeout: Duration,
}

impl TesseractRecognizer {
    pub fn new(language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            executable: None,
            tessdata_dir: None,
            language: language.into(),
            timeout,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            executable: config.tesseract_path.clone(),
            tessdata_dir: config.tessdata_dir.clone(),
            language: config.ocr_language.clone(),
            timeout: config.ocr_timeout(),
        }
    }

    /// Saves the raster to a scratch dir and runs Tesseract with TSV output.
    fn run_tesseract(&self, exe: &Path, img: &GrayImage) -> Result<String, RecognizerError> {
        let engine_err = |what: &str, e: &dyn std::fmt::Display| {
            RecognizerError::EngineError(format!("{what}: {e}"))
        };

        let work_dir = tempdir().map_err(|e| engine_err("failed to create temp dir", &e))?;
        let input_path = work_dir.path().join("input.png");
        img.save(&input_path)
            .map_err(|e| engine_err("failed to write OCR input", &e))?;

        // Tesseract appends .tsv to the output base
        let output_base = work_dir.path().join("output");
        let mut stderr_file =
            tempfile::tempfile().map_err(|e| engine_err("failed to capture stderr", &e))?;
        let stderr_sink = stderr_file
            .try_clone()
            .map_err(|e| engine_err("failed to capture stderr", &e))?;

        let mut cmd = Command::new(exe);
        cmd.arg(&input_path).arg(&output_base);
        if let Some(dir) = find_tessdata_dir(self.tessdata_dir.as_deref(), &self.language) {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.arg("-l")
            .arg(&self.language)
            .arg("tsv")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_sink));

        let child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                RecognizerError::EngineUnavailable(format!("{}: {}", exe.display(), e))
            }
            _ => engine_err("failed to start tesseract", &e),
        })?;

        let status = wait_with_timeout(child, self.timeout)?;

        if !status.success() {
            let mut stderr = String::new();
            let _ = stderr_file.rewind();
            let _ = stderr_file.read_to_string(&mut stderr);
            return Err(RecognizerError::EngineError(format!(
                "tesseract exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        let tsv_path = output_base.with_extension("tsv");
        fs::read_to_string(&tsv_path)
            .map_err(|e| engine_err("failed to read Tesseract output", &e))
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, img: &GrayImage) -> Result<Vec<OcrToken>, RecognizerError> {
        let exe = find_tesseract_executable(self.executable.as_deref()).ok_or_else(|| {
            RecognizerError::EngineUnavailable("no tesseract executable found".to_string())
        })?;
        log::debug!("Running {} (lang={})", exe.display(), self.language);

        let started = Instant::now();
        let tsv = self.run_tesseract(&exe, img)?;
        let tokens = parse_tsv_output(&tsv);

        log::info!(
            "Tesseract returned {} words in {} ms",
            tokens.len(),
            started.elapsed().as_millis()
        );
        Ok(tokens)
    }
}

/// Waits for the child, killing it once `timeout` has elapsed.
pub(super) fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<ExitStatus, RecognizerError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RecognizerError::EngineError(format!(
                    "tesseract timed out after {} ms",
                    timeout.as_millis()
                )));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(RecognizerError::EngineError(format!(
                    "failed to wait for tesseract: {e}"
                )));
            }
        }
    }
}

/// Parses Tesseract TSV output into word tokens, preserving reading order.
///
/// Only word-level rows are kept. Confidence is truncated to an integer;
/// rows with an unparseable confidence get the non-word sentinel (-1).
pub fn parse_tsv_output(tsv: &str) -> Vec<OcrToken> {
    let mut tokens = Vec::new();

    for line in tsv.lines().skip(1) {
        // Skip header
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].trim().parse().unwrap_or(-1);
        if level != WORD_LEVEL {
            continue;
        }

        let conf = fields[10]
            .trim()
            .parse::<f32>()
            .map(|c| c as i32)
            .unwrap_or(-1);
        let text = fields.get(11).copied().unwrap_or("");

        tokens.push(OcrToken::new(text, conf));
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
2\t1\t1\t0\t0\t0\t36\t92\t582\t78\t-1\t
3\t1\t1\t1\t0\t0\t36\t92\t582\t78\t-1\t
4\t1\t1\t1\t1\t0\t36\t92\t582\t78\t-1\t
5\t1\t1\t1\t1\t1\t36\t92\t140\t78\t92.671234\tSALE
5\t1\t1\t1\t1\t2\t200\t92\t120\t78\t88.004\t50%
5\t1\t1\t1\t1\t3\t340\t92\t140\t78\t95\tOFF
5\t1\t1\t1\t1\t4\t500\t92\t10\t78\t31.5\t~
";

    #[test]
    fn test_parse_tsv_words_only() {
        let tokens = parse_tsv_output(SAMPLE_TSV);
        assert_eq!(
            tokens,
            vec![
                OcrToken::new("SALE", 92),
                OcrToken::new("50%", 88),
                OcrToken::new("OFF", 95),
                OcrToken::new("~", 31),
            ]
        );
    }

    #[test]
    fn test_parse_tsv_tolerates_garbage() {
        let tsv = "header\n5\t1\t1\t1\t1\t1\t0\t0\t1\t1\tnan?\tword\nshort\trow\n5\t1\t1\t1\t1\t2\t0\t0\t1\t1\t70\n";
        let tokens = parse_tsv_output(tsv);
        assert_eq!(tokens, vec![OcrToken::new("word", -1), OcrToken::new("", 70)]);
        assert!(!tokens[0].is_word());
    }

    #[test]
    fn test_parse_tsv_empty() {
        assert!(parse_tsv_output("").is_empty());
        assert!(parse_tsv_output("level\tpage_num\n").is_empty());
    }

    #[test]
    fn test_missing_executable_is_unavailable() {
        let recognizer = TesseractRecognizer::new("eng", Duration::from_secs(5));
        let img = GrayImage::new(8, 8);
        let result =
            recognizer.run_tesseract(Path::new("/nonexistent/dir/tesseract-binary"), &img);
        assert!(matches!(result, Err(RecognizerError::EngineUnavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_with_timeout_kills_slow_child() {
        let child = Command::new("sleep").arg("5").spawn().unwrap();
        let started = Instant::now();
        let result = wait_with_timeout(child, Duration::from_millis(100));
        assert!(matches!(result, Err(RecognizerError::EngineError(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_with_timeout_returns_status() {
        let child = Command::new("true").spawn().unwrap();
        let status = wait_with_timeout(child, Duration::from_secs(5)).unwrap();
        assert!(status.success());
    }
}
