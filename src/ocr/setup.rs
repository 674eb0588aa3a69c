use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use super::engine::wait_with_timeout;
use crate::paths::get_local_tesseract_dir;

/// How long `tesseract --version` may take before PATH lookup gives up on it.
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(windows)]
const TESSERACT_EXE: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_EXE: &str = "tesseract";

#[cfg(windows)]
const COMMON_INSTALL_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];
#[cfg(not(windows))]
const COMMON_INSTALL_PATHS: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

#[cfg(windows)]
const SYSTEM_TESSDATA_PATHS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const SYSTEM_TESSDATA_PATHS: &[&str] = &[];

/// Finds the Tesseract executable.
///
/// Checks, in order: the configured path, our local install dir, PATH, and
/// common install locations. Returns `None` if nothing runnable was found.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        log::warn!(
            "Configured tesseract_path {} does not exist, searching elsewhere",
            path.display()
        );
    }

    let local_exe = get_local_tesseract_dir().join(TESSERACT_EXE);
    if local_exe.is_file() {
        return Some(local_exe);
    }

    if responds_to_version(Path::new(TESSERACT_EXE)) {
        return Some(PathBuf::from(TESSERACT_EXE));
    }

    COMMON_INSTALL_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

/// Finds a tessdata directory containing traineddata for `lang`.
///
/// Returns `None` when nothing explicit is found, in which case Tesseract
/// falls back to its compiled-in default.
pub fn find_tessdata_dir(configured: Option<&Path>, lang: &str) -> Option<PathBuf> {
    let has_lang = |dir: &Path| {
        lang.split('+')
            .all(|l| dir.join(format!("{l}.traineddata")).exists())
    };

    if let Some(dir) = configured {
        if has_lang(dir) {
            return Some(dir.to_path_buf());
        }
        log::warn!(
            "Configured tessdata_dir {} has no {} traineddata",
            dir.display(),
            lang
        );
    }

    let local_tessdata = get_local_tesseract_dir().join("tessdata");
    if has_lang(&local_tessdata) {
        return Some(local_tessdata);
    }

    if let Some(found) = SYSTEM_TESSDATA_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| has_lang(p))
    {
        return Some(found);
    }

    // TESSDATA_PREFIX may point at the tessdata dir itself or its parent
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        if has_lang(&p) {
            return Some(p);
        }
        let p = p.join("tessdata");
        if has_lang(&p) {
            return Some(p);
        }
    }

    None
}

fn responds_to_version(exe: &Path) -> bool {
    let mut cmd = Command::new(exe);
    cmd.arg("--version");
    succeeds_within(cmd, VERSION_CHECK_TIMEOUT)
}

/// Runs `cmd` with null stdio; a hung or failing command counts as `false`.
fn succeeds_within(mut cmd: Command, timeout: Duration) -> bool {
    let child = match cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => return false,
    };

    match wait_with_timeout(child, timeout) {
        Ok(status) => status.success(),
        Err(e) => {
            log::warn!("{:?} gave up: {}", cmd.get_program(), e);
            false
        }
    }
}
